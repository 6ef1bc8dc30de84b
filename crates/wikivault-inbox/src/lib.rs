//! # wikivault Inbox
//!
//! Asynchronous sharing of access records through inbox pages.
//!
//! ## Overview
//!
//! Every mailbox is an ordinary page in the revision store. A sender seals
//! an exported [`wikivault_access::AccessFile`] to the mailbox public key
//! and uploads it as a new revision. The owner of the mailbox reads the
//! revisions it has not seen yet, opens them with the mailbox secret, and
//! merges each record into its keyring tree. Merging is idempotent, so
//! delivering the same generation twice is harmless.
//!
//! ## Flow
//!
//! ```text
//! Alice                         store                          Bob
//!   |                             |<-- create_own_contact ------|
//!   |<------------- invitation (write-only inbox) --------------|
//!   |-- share_with_contacts ----->|                             |
//!   |                             |-- update_keyring_with_... ->|
//! ```

pub mod deliver;
pub mod entry;
pub mod error;
pub mod receive;

pub use deliver::{deliver, share_with_contacts, Delivery, ShareReport};
pub use entry::{InboxEntry, ENTRY_VERSION};
pub use error::{InboxError, Result};
pub use receive::{update_keyring_with_new_inbox_page_entries, InboxReport, RejectedEntry};

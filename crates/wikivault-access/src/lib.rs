//! # wikivault Access
//!
//! Per-file access records. An [`AccessFile`] keeps the chronological list
//! of key generations for one encrypted page along with the owner keypair
//! and the contacts the file was shared with.
//!
//! ## Overview
//!
//! - **Generations**: every [`AccessFileKey`] carries its own symmetric key
//!   and write keypair, countersigned by the owner.
//! - **Revocation**: retires the active generation at a revision id and
//!   appends a fresh one. Published history is never re-encrypted.
//! - **Merge**: copies that evolved independently converge by set union on
//!   generation public keys. See [`merge_access_files`].
//! - **Content**: revisions are sealed with the active generation and opened
//!   with whichever generation covers the revision id.

pub mod access_file;
pub mod content;
pub mod error;
pub mod key;
pub mod merge;

pub use access_file::{AccessFile, ContactEntry, RevokeOutcome, ShareLevel};
pub use content::SealedRevision;
pub use error::{AccessError, Result};
pub use key::AccessFileKey;
pub use merge::{check_identity, compare_key_bytes, merge_access_files, merge_key_lists};

//! # wikivault Keyring
//!
//! The reference graph that organizes access records into keyrings.
//!
//! ## Overview
//!
//! A keyring is a named directory of entries. Each entry points at an
//! [`wikivault_access::AccessFile`] for one encrypted page; a record may in
//! turn back a nested keyring. Records can be reachable from several
//! entries, so the structure is a graph rather than a tree and every
//! traversal tracks what it has visited.
//!
//! ## Key Types
//!
//! - [`RootKeyring`]: arena of keyrings and records plus contacts and mounts
//! - [`SymmetricReference`]: a named entry in a keyring
//! - [`InboxReference`]: a sealed mailbox page, write-only or readable
//! - [`ContactManager`]: peers we deliver to and mailboxes we read
//! - [`KeyringDocument`]: the persisted JSON form
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wikivault_keyring::RootKeyring;
//! use wikivault_access::AccessFile;
//!
//! let mut root = RootKeyring::new("alice", "https://wiki.example");
//! let top = root.root_id();
//! root.add_file(top, "plan.txt", AccessFile::new("plan.txt", "https://wiki.example", "Plan"))?;
//! let json = root.to_json()?;
//! let loaded = RootKeyring::from_json(&json)?;
//! ```

pub mod contact;
pub mod document;
pub mod error;
pub mod graph;
pub mod merge;
pub mod reference;
pub mod root;

pub use contact::{Contact, ContactManager, OwnContact};
pub use document::{
    AccessFileReferenceDocument, KeyringDocument, Reference, SymmetricDocument,
};
pub use error::{KeyringError, Result};
pub use graph::{AccessFileId, ChangeSet, FileNode, Keyring, KeyringGraph, KeyringId, Visited};
pub use merge::MergeReport;
pub use reference::{AccessFileReference, AccessLevel, InboxReference, PageTarget, SymmetricReference};
pub use root::{split_path, RootKeyring};

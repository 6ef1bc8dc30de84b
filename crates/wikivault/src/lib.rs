//! # wikivault
//!
//! Transparent, access-controlled encryption for files kept as revision
//! history on a wiki-style page store, with sharing and revocation between
//! independent users.
//!
//! ## Overview
//!
//! - **Access records**: every encrypted file has an AccessFile holding the
//!   chronological list of key generations for its page.
//! - **Keyrings**: records are organized into keyrings, which may nest and
//!   may be shared, so the tree can contain cycles.
//! - **Revocation**: retires the active generation at a revision and mints a
//!   new one. Published history is never re-encrypted.
//! - **Sharing**: records are sealed to a contact's inbox page and merged on
//!   the receiving side.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wikivault::{KeyringManager, ManagerConfig};
//! use wikivault::store::SqliteRevisionStore;
//!
//! let config = ManagerConfig::new("keyring.json").with_owner_name("alice");
//! let store = SqliteRevisionStore::open("revisions.db").unwrap();
//! let mut manager = KeyringManager::open(config, store).unwrap();
//!
//! let file = manager.add_new_file("plan.txt", "/", "https://wiki.example", "Plan").unwrap();
//! let rev = manager.write_content(file, b"first draft").unwrap();
//! assert_eq!(manager.read_content(file, rev).unwrap(), b"first draft");
//! manager.save().unwrap();
//! ```
//!
//! ## Re-exports
//!
//! - `wikivault::core` - Keys, sealed boxes and revision bounds
//! - `wikivault::access` - AccessFile and key generations
//! - `wikivault::store` - Revision store and cache
//! - `wikivault::keyring` - Keyring graph and persisted documents
//! - `wikivault::inbox` - Inbox delivery and processing

pub mod config;
pub mod error;
pub mod manager;

pub use wikivault_access as access;
pub use wikivault_core as core;
pub use wikivault_inbox as inbox;
pub use wikivault_keyring as keyring;
pub use wikivault_store as store;

pub use config::{ManagerConfig, DEFAULT_SAVE_INTERVAL};
pub use error::{Result, WikivaultError};
pub use manager::KeyringManager;

pub use wikivault_access::{AccessFile, AccessFileKey, RevokeOutcome, ShareLevel};
pub use wikivault_core::{RevisionEnd, RevisionId, RevisionStart};
pub use wikivault_inbox::{InboxReport, ShareReport};
pub use wikivault_keyring::{AccessFileId, Contact, KeyringId, MergeReport, RootKeyring};

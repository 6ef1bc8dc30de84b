//! # wikivault Store
//!
//! Interfaces to the revisioned page backend and its local cache, with
//! SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The keyring code never talks to a backend directly. It goes through the
//! [`RevisionStore`] trait, which models an append-only page history where
//! every upload gets a fresh, strictly increasing revision id.
//!
//! ## Key Types
//!
//! - [`RevisionStore`] - The blocking trait for page history
//! - [`SqliteRevisionStore`] - SQLite-based persistent storage
//! - [`MemoryRevisionStore`] - In-memory storage for tests
//! - [`RevisionCache`] / [`CachePolicy`] - Local cache with eviction policy
//! - [`CachedRevisionStore`] - A store fronted by a cache
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wikivault_store::{RevisionStore, SqliteRevisionStore};
//!
//! let store = SqliteRevisionStore::open("revisions.db").unwrap();
//! let id = store.upload("Notes", b"sealed bytes").unwrap();
//! let rev = store.revision("Notes", id).unwrap();
//! ```

pub mod cache;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use cache::{CachePolicy, CachedRevisionStore, EvictionPolicy, MemoryRevisionCache};
pub use error::{Result, StoreError};
pub use memory::MemoryRevisionStore;
pub use sqlite::{SqliteRevisionCache, SqliteRevisionStore};
pub use traits::{Revision, RevisionCache, RevisionStore, RevisionStoreExt};

//! # wikivault Testkit
//!
//! Testing utilities for wikivault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a temporary directory and a shared in-memory revision
//!   store, with managers for one or two parties
//! - **Generators**: proptest strategies for names, revision ids and access
//!   records with revocation histories
//!
//! ## Test Fixtures
//!
//! ```rust
//! use wikivault_testkit::fixtures::SharingPair;
//!
//! let mut pair = SharingPair::new();
//! let file = pair.alice.add_new_file("plan.txt", "/", "S", "Plan").unwrap();
//! pair.alice
//!     .share_with_contacts(&[file], &["bob"], wikivault::ShareLevel::Read)
//!     .unwrap();
//! let report = pair.bob_receive();
//! assert_eq!(report.added.len(), 1);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use wikivault_testkit::generators::access_file_history;
//!
//! proptest! {
//!     #[test]
//!     fn fresh_history_verifies(file in access_file_history()) {
//!         prop_assert!(file.verify_keys());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{SharedStore, SharingPair, TestFixture, TestManager, SERVER};
pub use generators::{access_file_history, access_file_with_history, revocation_points};

//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use wikivault::{InboxReport, KeyringManager, ManagerConfig};
use wikivault_store::MemoryRevisionStore;

/// Server link used by fixtures.
pub const SERVER: &str = "https://wiki.test";

/// A store shared by every party in a test.
pub type SharedStore = Arc<MemoryRevisionStore>;

/// A manager over the shared test store.
pub type TestManager = KeyringManager<SharedStore>;

/// A temporary directory for keyring documents and one shared store.
pub struct TestFixture {
    pub dir: TempDir,
    pub store: SharedStore,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
            store: Arc::new(MemoryRevisionStore::new()),
        }
    }

    /// Where `owner`'s keyring document lives.
    pub fn keyring_path(&self, owner: &str) -> PathBuf {
        self.dir.path().join(format!("{}.json", owner))
    }

    pub fn config(&self, owner: &str) -> ManagerConfig {
        ManagerConfig::new(self.keyring_path(owner))
            .with_owner_name(owner)
            .with_server_link(SERVER)
    }

    /// A fresh manager for `owner`.
    pub fn manager(&self, owner: &str) -> TestManager {
        KeyringManager::create(self.config(owner), Arc::clone(&self.store))
    }

    /// Load `owner`'s saved keyring again.
    pub fn reopen(&self, owner: &str) -> TestManager {
        KeyringManager::load(self.config(owner), Arc::clone(&self.store)).expect("load keyring")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Two parties, `alice` and `bob`, that have exchanged invitations.
///
/// Each holds a contact for the other and an inbox the other delivers to.
pub struct SharingPair {
    pub fixture: TestFixture,
    pub alice: TestManager,
    pub bob: TestManager,
}

impl SharingPair {
    pub fn new() -> Self {
        let fixture = TestFixture::new();
        let mut alice = fixture.manager("alice");
        let mut bob = fixture.manager("bob");

        let for_alice = bob.create_own_contact("alice").expect("bob creates inbox");
        alice.add_contact(for_alice).expect("alice adds bob");
        let for_bob = alice.create_own_contact("bob").expect("alice creates inbox");
        bob.add_contact(for_bob).expect("bob adds alice");

        Self {
            fixture,
            alice,
            bob,
        }
    }

    /// Bob reads what alice delivered, filing new records at his root.
    pub fn bob_receive(&mut self) -> InboxReport {
        let root = self.bob.root().root_id();
        self.bob
            .update_keyring_with_new_inbox_page_entries("alice", root)
            .expect("bob reads inbox")
    }

    /// Alice reads what bob delivered, filing new records at her root.
    pub fn alice_receive(&mut self) -> InboxReport {
        let root = self.alice.root().root_id();
        self.alice
            .update_keyring_with_new_inbox_page_entries("bob", root)
            .expect("alice reads inbox")
    }
}

impl Default for SharingPair {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_has_contacts_both_ways() {
        let pair = SharingPair::new();
        let alice = pair.alice.root().contacts();
        let bob = pair.bob.root().contacts();

        assert!(alice.contact("bob").is_some());
        assert!(alice.own_contact("bob").is_some());
        assert!(bob.contact("alice").is_some());
        assert_eq!(
            bob.contact("alice").unwrap().inbox.public_key,
            alice.own_contact("bob").unwrap().inbox.public_key
        );
    }

    #[test]
    fn test_reopen_after_save() {
        let fixture = TestFixture::new();
        let mut manager = fixture.manager("carol");
        manager.add_new_keyring("docs", "/").unwrap();
        manager.save().unwrap();

        let reopened = fixture.reopen("carol");
        assert!(reopened.keyring("/docs").is_some());
    }
}

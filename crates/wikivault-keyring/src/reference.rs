//! Typed references between keyrings, access records and mailboxes.
//!
//! Every reference points at a page on some server. What it carries
//! depends on its kind:
//!
//! - [`SymmetricReference`]: a named child of a keyring. Points at an
//!   AccessFile, which is either leaf content or the backing record of a
//!   nested keyring.
//! - [`AccessFileReference`]: links an AccessFile to the keyring whose
//!   document it encrypts.
//! - [`InboxReference`]: a mailbox page and its X25519 keys.

use serde::{Deserialize, Serialize};

use wikivault_core::{SymmetricKey, X25519PublicKey, X25519SecretKey};

use crate::graph::{AccessFileId, KeyringId};

/// The page a reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTarget {
    pub page_name: String,
    pub server_link: String,
}

impl PageTarget {
    pub fn new(page_name: impl Into<String>, server_link: impl Into<String>) -> Self {
        Self {
            page_name: page_name.into(),
            server_link: server_link.into(),
        }
    }
}

/// A named child entry of a keyring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetricReference {
    /// Entry name within the parent keyring.
    pub name: String,

    /// Page of the referenced AccessFile.
    pub target: PageTarget,

    /// Key the referenced record is encrypted with on its page.
    pub symm_key: SymmetricKey,

    pub access_file: AccessFileId,

    /// Selected for export. Not persisted.
    pub checked: bool,
}

impl SymmetricReference {
    pub fn new(name: impl Into<String>, target: PageTarget, access_file: AccessFileId) -> Self {
        Self {
            name: name.into(),
            target,
            symm_key: SymmetricKey::generate(),
            access_file,
            checked: false,
        }
    }
}

/// Links an AccessFile to the keyring it backs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessFileReference {
    /// Page holding the encrypted keyring document.
    pub target: PageTarget,
    pub keyring: KeyringId,
}

/// What the holder of an [`InboxReference`] may do with the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    /// Deliver entries only: the public key is known, the secret is not.
    WriteOnly,
    /// Deliver and read entries.
    ReadWrite,
}

/// A mailbox page with its key agreement keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxReference {
    pub target: PageTarget,
    pub public_key: X25519PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<X25519SecretKey>,
    pub access: AccessLevel,
}

impl InboxReference {
    /// A fresh mailbox at `server_link`.
    ///
    /// The page name is derived from `prefix` and the new public key, so two
    /// mailboxes never collide.
    pub fn generate(prefix: &str, server_link: impl Into<String>) -> Self {
        let secret = X25519SecretKey::generate();
        let public_key = secret.public_key();
        let page_name = format!("Inbox:{}:{}", prefix, &hex::encode(public_key.0)[..16]);

        Self {
            target: PageTarget::new(page_name, server_link),
            public_key,
            secret_key: Some(secret),
            access: AccessLevel::ReadWrite,
        }
    }

    /// The copy handed to a peer so they can deliver to this mailbox.
    pub fn to_write_only(&self) -> Self {
        Self {
            target: self.target.clone(),
            public_key: self.public_key,
            secret_key: None,
            access: AccessLevel::WriteOnly,
        }
    }

    pub fn can_read(&self) -> bool {
        self.access == AccessLevel::ReadWrite && self.secret_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_generate() {
        let inbox = InboxReference::generate("alice", "https://wiki.example");
        assert!(inbox.can_read());
        assert!(inbox.target.page_name.starts_with("Inbox:alice:"));
        assert_eq!(inbox.secret_key.as_ref().unwrap().public_key(), inbox.public_key);

        let other = InboxReference::generate("alice", "https://wiki.example");
        assert_ne!(inbox.target.page_name, other.target.page_name);
    }

    #[test]
    fn test_write_only_copy_drops_secret() {
        let inbox = InboxReference::generate("alice", "https://wiki.example");
        let shared = inbox.to_write_only();

        assert!(!shared.can_read());
        assert_eq!(shared.public_key, inbox.public_key);
        assert_eq!(shared.target, inbox.target);
    }

    #[test]
    fn test_inbox_json() {
        let inbox = InboxReference::generate("bob", "S").to_write_only();
        let value = serde_json::to_value(&inbox).unwrap();

        assert_eq!(value["access"], "WriteOnly");
        assert!(value.get("secretKey").is_none());
        assert_eq!(value["target"]["serverLink"], "S");
    }
}

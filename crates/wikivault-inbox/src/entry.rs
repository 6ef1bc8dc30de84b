//! Inbox entry wire format.
//!
//! An entry is the JSON form of an [`InboxEntry`], sealed to the inbox
//! public key with the inbox page name as key-derivation context, and
//! encoded as a CBOR [`SealedBox`]. One entry is one page revision.

use serde::{Deserialize, Serialize};

use wikivault_access::{AccessFile, ShareLevel};
use wikivault_core::SealedBox;
use wikivault_keyring::InboxReference;

use crate::error::{InboxError, Result};

/// Current entry format version.
pub const ENTRY_VERSION: u8 = 1;

/// One delivered access record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxEntry {
    pub version: u8,
    /// Nickname the sender goes by.
    pub sender: String,
    pub level: ShareLevel,
    pub access_file: AccessFile,
}

impl InboxEntry {
    /// An entry carrying `file` exported at `level`.
    pub fn new(sender: impl Into<String>, file: &AccessFile, level: ShareLevel) -> Self {
        Self {
            version: ENTRY_VERSION,
            sender: sender.into(),
            level,
            access_file: file.export_for(level),
        }
    }

    /// Seal for `inbox`. Only the public half is needed.
    pub fn seal(&self, inbox: &InboxReference) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self).map_err(|e| InboxError::MalformedEntry(e.to_string()))?;
        let sealed = SealedBox::seal(
            &json,
            &inbox.public_key,
            inbox.target.page_name.as_bytes(),
        )?;
        Ok(sealed.to_bytes()?)
    }

    /// Open an entry read from `inbox`.
    pub fn open(bytes: &[u8], inbox: &InboxReference) -> Result<Self> {
        let secret = inbox
            .secret_key
            .as_ref()
            .ok_or_else(|| InboxError::NotReadable {
                page_name: inbox.target.page_name.clone(),
            })?;

        let sealed = SealedBox::from_bytes(bytes)
            .map_err(|e| InboxError::MalformedEntry(e.to_string()))?;
        let json = sealed
            .open(secret, inbox.target.page_name.as_bytes())
            .map_err(|e| InboxError::MalformedEntry(e.to_string()))?;
        let entry: InboxEntry =
            serde_json::from_slice(&json).map_err(|e| InboxError::MalformedEntry(e.to_string()))?;

        if entry.version != ENTRY_VERSION {
            return Err(InboxError::MalformedEntry(format!(
                "unsupported entry version {}",
                entry.version
            )));
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikivault_core::RevisionId;

    fn shared_file() -> AccessFile {
        let mut file = AccessFile::new("plan.txt", "S", "Plan");
        file.add_contact("carol", None, ShareLevel::Read);
        file.revoke(RevisionId(50)).unwrap();
        file
    }

    #[test]
    fn test_seal_and_open() {
        let inbox = InboxReference::generate("alice", "S");
        let entry = InboxEntry::new("bob", &shared_file(), ShareLevel::Read);

        let bytes = entry.seal(&inbox.to_write_only()).unwrap();
        let opened = InboxEntry::open(&bytes, &inbox).unwrap();

        assert_eq!(opened, entry);
        assert!(opened.access_file.contact_list.is_empty());
        assert!(opened.access_file.owner_private_key.is_none());
        assert!(opened.access_file.key_list.iter().all(|k| k.private_key.is_none()));
        assert!(opened.access_file.verify_keys());
    }

    #[test]
    fn test_write_share_keeps_owner_key() {
        let inbox = InboxReference::generate("alice", "S");
        let entry = InboxEntry::new("bob", &shared_file(), ShareLevel::Write);

        let opened = InboxEntry::open(&entry.seal(&inbox).unwrap(), &inbox).unwrap();
        assert!(opened.access_file.owner_private_key.is_some());
        assert!(opened.access_file.contact_list.is_empty());
    }

    #[test]
    fn test_write_only_inbox_cannot_open() {
        let inbox = InboxReference::generate("alice", "S");
        let bytes = InboxEntry::new("bob", &shared_file(), ShareLevel::Read)
            .seal(&inbox)
            .unwrap();

        assert!(matches!(
            InboxEntry::open(&bytes, &inbox.to_write_only()),
            Err(InboxError::NotReadable { .. })
        ));
    }

    #[test]
    fn test_other_inbox_cannot_open() {
        let inbox = InboxReference::generate("alice", "S");
        let other = InboxReference::generate("alice", "S");
        let bytes = InboxEntry::new("bob", &shared_file(), ShareLevel::Read)
            .seal(&inbox)
            .unwrap();

        assert!(matches!(
            InboxEntry::open(&bytes, &other),
            Err(InboxError::MalformedEntry(_))
        ));
    }

    #[test]
    fn test_tampered_entry_rejected() {
        let inbox = InboxReference::generate("alice", "S");
        let mut bytes = InboxEntry::new("bob", &shared_file(), ShareLevel::Read)
            .seal(&inbox)
            .unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert!(InboxEntry::open(&bytes, &inbox).is_err());
    }
}

//! The per-file access-control record.
//!
//! An AccessFile holds the owner keypair, the chronological history of key
//! generations, and the list of contacts the file has been shared with.
//! Its identity is `(filename, server_link, page_name, owner_public_key)`
//! and never changes after creation.

use serde::{Deserialize, Serialize};

use wikivault_core::{
    Ed25519PublicKey, Ed25519SecretKey, Keypair, RevisionEnd, RevisionId, RevisionStart,
};

use crate::error::{AccessError, Result};
use crate::key::AccessFileKey;

/// A sharing target recorded on an AccessFile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactEntry {
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_link: Option<String>,
    /// Highest level this contact has been granted. Redeliveries after a
    /// rotation use it.
    #[serde(default)]
    pub level: ShareLevel,
}

/// What a share grants the recipient. `Write` orders above `Read`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ShareLevel {
    /// Decrypt and verify content only.
    #[default]
    Read,
    /// Also produce new revisions and new generations.
    Write,
}

/// Result of a revocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// The active generation was retired at `retired_at` and a new one appended.
    Revoked { retired_at: RevisionId },
    /// The active generation was never used; nothing to retire.
    NoOp,
}

/// Per-file access-control record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessFile {
    pub filename: String,
    pub server_link: String,
    pub page_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_private_key: Option<Ed25519SecretKey>,

    #[serde(default)]
    pub owner_public_key: Option<Ed25519PublicKey>,

    #[serde(default)]
    pub contact_list: Vec<ContactEntry>,

    /// Key generations, sorted by `revision_start`.
    pub key_list: Vec<AccessFileKey>,
}

impl AccessFile {
    /// Register a new encrypted file under a fresh owner keypair.
    pub fn new(
        filename: impl Into<String>,
        server_link: impl Into<String>,
        page_name: impl Into<String>,
    ) -> Self {
        Self::with_owner(&Keypair::generate(), filename, server_link, page_name)
    }

    /// Register a new encrypted file owned by `owner`.
    ///
    /// The first generation starts at revision zero, covering the page's
    /// whole history.
    pub fn with_owner(
        owner: &Keypair,
        filename: impl Into<String>,
        server_link: impl Into<String>,
        page_name: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            server_link: server_link.into(),
            page_name: page_name.into(),
            owner_private_key: Some(owner.secret_key()),
            owner_public_key: Some(owner.public_key()),
            contact_list: Vec::new(),
            key_list: vec![AccessFileKey::generate(
                owner,
                RevisionStart::At(RevisionId::ZERO),
            )],
        }
    }

    /// Whether this copy holds the owner private key.
    pub fn is_owned(&self) -> bool {
        self.owner_private_key.is_some()
    }

    /// Recompute every generation's signatures against the owner public key.
    ///
    /// Returns `false` if the owner key is missing, the key list is empty,
    /// or any signature is absent or wrong.
    pub fn verify_keys(&self) -> bool {
        let Some(owner) = &self.owner_public_key else {
            return false;
        };
        if self.key_list.is_empty() {
            return false;
        }
        if let Some(private) = &self.owner_private_key {
            if private.public_key() != *owner {
                return false;
            }
        }
        self.key_list.iter().all(|key| key.verify(owner))
    }

    /// [`AccessFile::verify_keys`] as a `Result` naming this page.
    pub fn check_keys(&self) -> Result<()> {
        if self.verify_keys() {
            Ok(())
        } else {
            Err(AccessError::SignatureVerification {
                page_name: self.page_name.clone(),
            })
        }
    }

    /// The generation whose range contains `rev`.
    pub fn lookup_by_revision(&self, rev: RevisionId) -> Option<&AccessFileKey> {
        self.key_list.iter().find(|key| key.contains(rev))
    }

    /// The current active generation.
    ///
    /// If concurrent revocations on separate copies left more than one
    /// unbounded generation, the latest one is active.
    pub fn active_key(&self) -> Option<&AccessFileKey> {
        self.key_list.iter().rev().find(|key| key.is_active())
    }

    fn active_key_mut(&mut self) -> Option<&mut AccessFileKey> {
        self.key_list.iter_mut().rev().find(|key| key.is_active())
    }

    /// Retire the active generation at `latest` and append a fresh one.
    ///
    /// No-op when the active generation was never used.
    pub fn revoke(&mut self, latest: RevisionId) -> Result<RevokeOutcome> {
        let page_name = self.page_name.clone();
        let owner = self
            .owner_private_key
            .as_ref()
            .map(Ed25519SecretKey::to_keypair);

        let active = self
            .active_key_mut()
            .ok_or_else(|| AccessError::NoActiveKey {
                page_name: page_name.clone(),
            })?;

        if active.revision_start.is_unset() {
            tracing::debug!(page = %page_name, "revoke skipped: active generation never used");
            return Ok(RevokeOutcome::NoOp);
        }

        let owner = owner.ok_or(AccessError::NotOwner { page_name })?;
        active.revision_end = RevisionEnd::At(latest);

        self.key_list
            .push(AccessFileKey::generate(&owner, RevisionStart::Unset));
        tracing::info!(
            page = %self.page_name,
            generations = self.key_list.len(),
            retired_at = %latest,
            "revoked key generation"
        );

        Ok(RevokeOutcome::Revoked { retired_at: latest })
    }

    /// Retire the active generation even though it was never used, and
    /// append a fresh one.
    ///
    /// Whoever was handed the unused generation cannot open anything written
    /// after this. Its range stays empty and its end is set to `latest`, so
    /// merging with an older copy retires it there too. Returns `false`
    /// without touching the record when the active generation was already
    /// used.
    pub fn retire_unused(&mut self, latest: RevisionId) -> Result<bool> {
        let page_name = self.page_name.clone();
        let owner = self
            .owner_private_key
            .as_ref()
            .map(Ed25519SecretKey::to_keypair)
            .ok_or_else(|| AccessError::NotOwner {
                page_name: page_name.clone(),
            })?;

        let active = self
            .active_key_mut()
            .ok_or(AccessError::NoActiveKey { page_name })?;
        if !active.revision_start.is_unset() {
            return Ok(false);
        }
        active.revision_end = RevisionEnd::At(latest);

        self.key_list
            .push(AccessFileKey::generate(&owner, RevisionStart::Unset));
        tracing::info!(
            page = %self.page_name,
            generations = self.key_list.len(),
            "replaced unused key generation"
        );
        Ok(true)
    }

    /// Record that `rev` was written with the active generation.
    ///
    /// Sets the generation's start if it was unset, keeping the list sorted
    /// ahead of any retired generation that was never used. Returns whether
    /// anything changed.
    pub fn record_use(&mut self, rev: RevisionId) -> bool {
        match self.active_key_mut() {
            Some(active) if active.revision_start.is_unset() => {
                active.revision_start = RevisionStart::At(rev);
                self.key_list.sort_by_key(|key| key.revision_start);
                true
            }
            _ => false,
        }
    }

    /// Copy of this record suitable for sending to a contact.
    ///
    /// The contact list is always cleared. Unless `level` is
    /// [`ShareLevel::Write`], the owner private key and every generation's
    /// write key are stripped.
    pub fn export_for(&self, level: ShareLevel) -> AccessFile {
        let mut copy = self.clone();
        copy.contact_list.clear();

        if level == ShareLevel::Read {
            copy.owner_private_key = None;
            for key in &mut copy.key_list {
                key.strip_write_access();
            }
        }
        copy
    }

    /// Record that the file was shared with a contact at `level`.
    ///
    /// A contact already present keeps its entry and is only ever upgraded.
    /// Returns whether the list changed.
    pub fn add_contact(
        &mut self,
        nickname: impl Into<String>,
        server_link: Option<String>,
        level: ShareLevel,
    ) -> bool {
        let nickname = nickname.into();
        if let Some(existing) = self.contact_list.iter_mut().find(|c| c.nickname == nickname) {
            if level <= existing.level {
                return false;
            }
            existing.level = level;
            return true;
        }
        self.contact_list.push(ContactEntry {
            nickname,
            server_link,
            level,
        });
        true
    }

    /// The level recorded for a contact, if the file was shared with it.
    pub fn contact_level(&self, nickname: &str) -> Option<ShareLevel> {
        self.contact_list
            .iter()
            .find(|c| c.nickname == nickname)
            .map(|c| c.level)
    }

    /// Remove a contact from the sharing list. Returns whether it was present.
    pub fn remove_contact(&mut self, nickname: &str) -> bool {
        let before = self.contact_list.len();
        self.contact_list.retain(|c| c.nickname != nickname);
        self.contact_list.len() != before
    }

    /// Check the key-list invariants of a loaded record.
    ///
    /// The list must be non-empty, sorted by start, and concrete ranges must
    /// not overlap.
    pub fn validate_structure(&self) -> Result<()> {
        let malformed = |reason: String| AccessError::MalformedKeyList {
            page_name: self.page_name.clone(),
            reason,
        };

        if self.key_list.is_empty() {
            return Err(malformed("empty key list".into()));
        }

        for pair in self.key_list.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.revision_start > next.revision_start {
                return Err(malformed("key list not sorted by revision start".into()));
            }
            if let (Some(end), Some(start)) = (prev.revision_end.id(), next.revision_start.id()) {
                if start <= end {
                    return Err(malformed(format!(
                        "ranges overlap at revision {}",
                        start
                    )));
                }
            }
        }

        for key in &self.key_list {
            if let (Some(start), Some(end)) = (key.revision_start.id(), key.revision_end.id()) {
                if end < start {
                    return Err(malformed(format!("range {}..={} is inverted", start, end)));
                }
            }
        }

        Ok(())
    }
}

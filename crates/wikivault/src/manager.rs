//! The KeyringManager: the operations the filesystem bridge and front end
//! call.
//!
//! The manager owns one [`RootKeyring`] and the revision store it shares
//! through. Every call runs to completion on the caller's thread; callers
//! serialize mutations. Mutations mark the tree dirty and trigger a
//! throttled save of the whole document.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use wikivault_access::{AccessFile, RevokeOutcome, ShareLevel};
use wikivault_core::{Keypair, RevisionId};
use wikivault_inbox::{InboxReport, ShareReport};
use wikivault_keyring::{AccessFileId, Contact, KeyringId, MergeReport, RootKeyring};
use wikivault_store::RevisionStore;

use crate::config::ManagerConfig;
use crate::error::{Result, WikivaultError};

/// Orchestrates a keyring tree, its persistence and its sharing.
pub struct KeyringManager<S: RevisionStore> {
    config: ManagerConfig,
    store: S,
    root: RootKeyring,
    last_save: Option<Instant>,
    dirty: bool,
}

fn missing_file(id: AccessFileId) -> WikivaultError {
    WikivaultError::NotFound(format!("access file {:?}", id))
}

impl<S: RevisionStore> KeyringManager<S> {
    /// Start a fresh tree. Nothing is written until the first save.
    pub fn create(config: ManagerConfig, store: S) -> Self {
        let root = RootKeyring::new(config.owner_name.clone(), &config.server_link);
        tracing::info!(owner = %config.owner_name, "created keyring");
        Self {
            config,
            store,
            root,
            last_save: None,
            dirty: true,
        }
    }

    /// Load the tree persisted at `config.keyring_path`.
    pub fn load(config: ManagerConfig, store: S) -> Result<Self> {
        let json = fs::read_to_string(&config.keyring_path)?;
        let root = RootKeyring::from_json(&json)?;
        tracing::info!(
            path = %config.keyring_path.display(),
            files = root.all_access_files().len(),
            "loaded keyring"
        );
        Ok(Self {
            config,
            store,
            root,
            last_save: None,
            dirty: false,
        })
    }

    /// Load the persisted tree if there is one, otherwise start fresh.
    pub fn open(config: ManagerConfig, store: S) -> Result<Self> {
        if config.keyring_path.exists() {
            Self::load(config, store)
        } else {
            Ok(Self::create(config, store))
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn root(&self) -> &RootKeyring {
        &self.root
    }

    /// Whether there are mutations not yet written.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Write the whole tree now, regardless of the throttle.
    pub fn save(&mut self) -> Result<()> {
        let json = self.root.to_json()?;
        let path = &self.config.keyring_path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, json)?;

        self.root.clear_changed();
        self.dirty = false;
        self.last_save = Some(Instant::now());
        tracing::debug!(path = %path.display(), "saved keyring");
        Ok(())
    }

    /// Save if there is something to write and the last save is older than
    /// the configured interval. Returns whether a save happened.
    pub fn save_if_due(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        if let Some(last) = self.last_save {
            if last.elapsed() < self.config.save_interval {
                tracing::debug!("save throttled");
                return Ok(false);
            }
        }
        self.save()?;
        Ok(true)
    }

    fn touch(&mut self) -> Result<()> {
        self.dirty = true;
        self.save_if_due()?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    pub fn keyring(&self, path: &str) -> Option<KeyringId> {
        self.root.resolve_keyring(path)
    }

    /// The record of the entry at `path`.
    pub fn access_file_at(&self, path: &str) -> Option<AccessFileId> {
        let (keyring, name) = self.root.resolve_entry(path)?;
        self.root.file_id(name, keyring)
    }

    pub fn get_access_file(&self, filename: &str, keyring: KeyringId) -> Option<&AccessFile> {
        self.root.get_access_file(filename, keyring)
    }

    pub fn access_file(&self, id: AccessFileId) -> Option<&AccessFile> {
        self.root.access_file(id)
    }

    fn keyring_at(&self, path: &str) -> Result<KeyringId> {
        self.keyring(path)
            .ok_or_else(|| WikivaultError::NotFound(format!("keyring {:?}", path)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Structure
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a new encrypted file `filename` under the keyring at `path`,
    /// stored on page `page_title` of `server_link`.
    pub fn add_new_file(
        &mut self,
        filename: &str,
        path: &str,
        server_link: &str,
        page_title: &str,
    ) -> Result<AccessFileId> {
        let keyring = self.keyring_at(path)?;
        let file = AccessFile::new(filename, server_link, page_title);
        let id = self.root.add_file(keyring, filename, file)?;
        tracing::info!(filename, path, page = page_title, "added file");
        self.touch()?;
        Ok(id)
    }

    /// Create a keyring `name` under the keyring at `path`.
    pub fn add_new_keyring(&mut self, name: &str, path: &str) -> Result<KeyringId> {
        let parent = self.keyring_at(path)?;
        let owner = Keypair::generate();
        let page = format!(
            "Keyring:{}:{}",
            name,
            hex::encode(&owner.public_key().as_bytes()[..8])
        );
        let file = AccessFile::with_owner(&owner, name, self.config.server_link.clone(), page);
        let id = self.root.add_keyring(parent, name, file)?;
        tracing::info!(name, path, "added keyring");
        self.touch()?;
        Ok(id)
    }

    /// Remove entry `filename` from the keyring at `path`.
    pub fn remove_file(&mut self, path: &str, filename: &str) -> Result<()> {
        let keyring = self.keyring_at(path)?;
        self.root.remove(keyring, filename)?;
        tracing::info!(filename, path, "removed entry");
        self.touch()
    }

    pub fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        self.root.rename(old_path, new_path)?;
        tracing::info!(from = old_path, to = new_path, "renamed entry");
        self.touch()
    }

    pub fn mount(&mut self, path: &str, page: &str) -> Result<()> {
        self.root.mount(path, page);
        self.touch()
    }

    pub fn unmount(&mut self, path: &str) -> Result<Option<String>> {
        let page = self.root.unmount(path);
        if page.is_some() {
            self.touch()?;
        }
        Ok(page)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Content
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal `plaintext` with the active generation of `file` and upload it
    /// as a new revision of its page.
    ///
    /// The first write with a new generation fixes its start and re-delivers
    /// the record to the sharing list.
    pub fn write_content(&mut self, file: AccessFileId, plaintext: &[u8]) -> Result<RevisionId> {
        let record = self.root.access_file(file).ok_or_else(|| missing_file(file))?;
        let sealed = record.seal_content(plaintext)?;
        let page = record.page_name.clone();
        let first_use = record
            .active_key()
            .is_some_and(|key| key.revision_start.is_unset());

        let revision = self.store.upload(&page, &sealed)?;
        tracing::debug!(page = %page, revision = %revision, "uploaded revision");

        if first_use {
            if let Some(record) = self.root.access_file_mut(file) {
                record.record_use(revision);
            }
            // Recipients of the generation learn where it starts.
            self.reshare(file)?;
            self.touch()?;
        }
        Ok(revision)
    }

    /// Fetch and open revision `rev` of `file`'s page.
    pub fn read_content(&self, file: AccessFileId, rev: RevisionId) -> Result<Vec<u8>> {
        let record = self.root.access_file(file).ok_or_else(|| missing_file(file))?;
        let revision = self
            .store
            .revision(&record.page_name, rev)?
            .ok_or_else(|| WikivaultError::RevisionNotFound {
                page_name: record.page_name.clone(),
                revision: rev,
            })?;
        Ok(record.open_content(rev, &revision.content)?)
    }

    /// Fetch and open the newest revision of `file`'s page.
    pub fn read_latest(&self, file: AccessFileId) -> Result<Option<(RevisionId, Vec<u8>)>> {
        let record = self.root.access_file(file).ok_or_else(|| missing_file(file))?;
        let Some(revision) = self.store.latest_revision(&record.page_name)? else {
            return Ok(None);
        };
        let plaintext = record.open_content(revision.id, &revision.content)?;
        Ok(Some((revision.id, plaintext)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Revocation
    // ─────────────────────────────────────────────────────────────────────────

    /// Retire the active generation of `file` at `latest`.
    pub fn revoke(&mut self, file: AccessFileId, latest: RevisionId) -> Result<RevokeOutcome> {
        let record = self
            .root
            .access_file_mut(file)
            .ok_or_else(|| missing_file(file))?;
        let outcome = record.revoke(latest)?;
        if let RevokeOutcome::Revoked { .. } = outcome {
            self.touch()?;
        }
        Ok(outcome)
    }

    /// Stop sharing `file` with `nickname`: drop them from the sharing list,
    /// rotate the active generation, and redeliver the record to the contacts
    /// that remain.
    ///
    /// The active generation is retired at `latest` if it was used and
    /// replaced outright if not, since the revoked contact holds it either
    /// way. Nothing changes unless the rotation succeeds.
    pub fn revoke_contact(
        &mut self,
        file: AccessFileId,
        nickname: &str,
        latest: RevisionId,
    ) -> Result<ShareReport> {
        let mut record = self
            .root
            .access_file(file)
            .cloned()
            .ok_or_else(|| missing_file(file))?;
        let page = record.page_name.clone();

        if !record.remove_contact(nickname) {
            tracing::warn!(page = %page, contact = nickname, "contact was not on the sharing list");
        }
        if record.revoke(latest)? == RevokeOutcome::NoOp {
            record.retire_unused(latest)?;
            tracing::debug!(page = %page, contact = nickname, "active generation never used; replaced");
        }
        if let Some(slot) = self.root.access_file_mut(file) {
            *slot = record;
        }

        let report = self.reshare(file)?;
        self.touch()?;
        Ok(report)
    }

    /// Deliver `file` to the contacts on its sharing list that we have an
    /// inbox for, each at the level recorded for them.
    fn reshare(&mut self, file: AccessFileId) -> Result<ShareReport> {
        let record = self.root.access_file(file).ok_or_else(|| missing_file(file))?;
        let contacts = self.root.contacts();
        let mut by_level: BTreeMap<ShareLevel, Vec<String>> = BTreeMap::new();
        for entry in &record.contact_list {
            if contacts.contact(&entry.nickname).is_none() {
                tracing::warn!(
                    page = %record.page_name,
                    contact = %entry.nickname,
                    "no inbox for contact; not re-shared"
                );
                continue;
            }
            by_level
                .entry(entry.level)
                .or_default()
                .push(entry.nickname.clone());
        }

        let mut report = ShareReport::default();
        for (level, nicknames) in by_level {
            let nicknames: Vec<&str> = nicknames.iter().map(String::as_str).collect();
            let delivered = wikivault_inbox::share_with_contacts(
                &self.store,
                &mut self.root,
                &[file],
                &nicknames,
                level,
            )?;
            report.deliveries.extend(delivered.deliveries);
        }
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sharing
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a peer's invitation so we can share with them.
    pub fn add_contact(&mut self, contact: Contact) -> Result<()> {
        self.root.contacts_mut().add_contact(contact);
        self.touch()
    }

    pub fn remove_contact(&mut self, nickname: &str) -> Result<Option<Contact>> {
        let removed = self.root.contacts_mut().remove_contact(nickname);
        if removed.is_some() {
            self.touch()?;
        }
        Ok(removed)
    }

    /// Create an inbox for `peer` and return the invitation to hand them.
    pub fn create_own_contact(&mut self, peer: &str) -> Result<Contact> {
        let invitation = self.root.contacts_mut().create_own_contact(
            peer,
            &self.config.owner_name,
            &self.config.server_link,
        );
        self.touch()?;
        Ok(invitation)
    }

    pub fn share_with_contacts(
        &mut self,
        files: &[AccessFileId],
        contacts: &[&str],
        level: ShareLevel,
    ) -> Result<ShareReport> {
        let report =
            wikivault_inbox::share_with_contacts(&self.store, &mut self.root, files, contacts, level)?;
        self.touch()?;
        Ok(report)
    }

    /// Read new entries from the inbox handed to `peer`, filing new records
    /// under `target`.
    pub fn update_keyring_with_new_inbox_page_entries(
        &mut self,
        peer: &str,
        target: KeyringId,
    ) -> Result<InboxReport> {
        let report = wikivault_inbox::update_keyring_with_new_inbox_page_entries(
            &self.store,
            &mut self.root,
            peer,
            target,
        )?;
        if report.processed() > 0 {
            self.touch()?;
        }
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Export / import
    // ─────────────────────────────────────────────────────────────────────────

    /// Mark the entry at `path` for export.
    pub fn set_checked(&mut self, path: &str, checked: bool) -> Result<()> {
        Ok(self.root.set_checked(path, checked)?)
    }

    pub fn export_checked_subtree(&self) -> RootKeyring {
        self.root.export_checked_subtree()
    }

    /// Write the checked subtree as a keyring document at `path`.
    pub fn export_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.export_checked_subtree().to_json()?;
        fs::write(path.as_ref(), json)?;
        tracing::info!(path = %path.as_ref().display(), "exported keyring subtree");
        Ok(())
    }

    /// Merge the keyring document at `path` into this tree.
    ///
    /// Nothing is applied if any imported record fails verification or
    /// conflicts with a local record.
    pub fn import_keyring(&mut self, path: impl AsRef<Path>) -> Result<MergeReport> {
        let json = fs::read_to_string(path.as_ref())?;
        let incoming = RootKeyring::from_json(&json)?;
        let report = self.root.merge_from(&incoming)?;
        if !report.is_empty() {
            self.touch()?;
        }
        Ok(report)
    }
}

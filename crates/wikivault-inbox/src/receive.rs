//! Processing entries delivered to our inboxes.

use wikivault_access::{merge_access_files, AccessFile};
use wikivault_core::RevisionId;
use wikivault_keyring::{AccessFileId, KeyringError, KeyringId, RootKeyring};
use wikivault_store::{RevisionStore, RevisionStoreExt};

use crate::entry::InboxEntry;
use crate::error::{InboxError, Result};

/// An entry that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub revision: RevisionId,
    pub reason: String,
}

/// Result of reading an inbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxReport {
    /// Records that were new here, filed under the target keyring.
    pub added: Vec<AccessFileId>,
    /// Existing records that gained generations or keys.
    pub merged: Vec<AccessFileId>,
    /// Entries that repeated what we already had.
    pub unchanged: usize,
    pub rejected: Vec<RejectedEntry>,
    /// Read position after this pass.
    pub last_seen: Option<RevisionId>,
}

impl InboxReport {
    pub fn processed(&self) -> usize {
        self.added.len() + self.merged.len() + self.unchanged + self.rejected.len()
    }
}

enum Applied {
    Added(AccessFileId),
    Merged(AccessFileId),
    Unchanged,
}

/// Read new entries from the inbox handed to `peer` and merge them into
/// `root`.
///
/// A record matching an existing one by server link and page name is merged
/// into it wherever it lives. Anything else is filed under `target`. Entries
/// that cannot be opened, verified or merged are reported and skipped. The
/// read position advances past every entry looked at; a store failure
/// returns before anything is applied.
pub fn update_keyring_with_new_inbox_page_entries<S: RevisionStore + ?Sized>(
    store: &S,
    root: &mut RootKeyring,
    peer: &str,
    target: KeyringId,
) -> Result<InboxReport> {
    let own = root
        .contacts()
        .own_contact(peer)
        .cloned()
        .ok_or_else(|| InboxError::UnknownOwnContact(peer.to_string()))?;
    if !own.inbox.can_read() {
        return Err(InboxError::NotReadable {
            page_name: own.inbox.target.page_name.clone(),
        });
    }
    if root.keyring(target).is_none() {
        return Err(KeyringError::MissingReference(format!("keyring {:?}", target)).into());
    }

    let page = &own.inbox.target.page_name;
    let revisions = store.revisions_since(page, own.last_seen)?;

    let mut report = InboxReport {
        last_seen: own.last_seen,
        ..InboxReport::default()
    };

    for revision in revisions {
        let applied = InboxEntry::open(&revision.content, &own.inbox)
            .and_then(|entry| apply_entry(root, target, peer, entry));

        match applied {
            Ok(Applied::Added(id)) => report.added.push(id),
            Ok(Applied::Merged(id)) => report.merged.push(id),
            Ok(Applied::Unchanged) => report.unchanged += 1,
            Err(err) => {
                tracing::warn!(
                    inbox = %page,
                    revision = %revision.id,
                    error = %err,
                    "rejected inbox entry"
                );
                report.rejected.push(RejectedEntry {
                    revision: revision.id,
                    reason: err.to_string(),
                });
            }
        }
        report.last_seen = Some(revision.id);
    }

    if let Some(seen) = report.last_seen {
        if let Some(own) = root.contacts_mut().own_contact_mut(peer) {
            own.advance(seen);
        }
    }

    tracing::info!(
        inbox = %page,
        added = report.added.len(),
        merged = report.merged.len(),
        unchanged = report.unchanged,
        rejected = report.rejected.len(),
        "processed inbox"
    );
    Ok(report)
}

fn apply_entry(
    root: &mut RootKeyring,
    target: KeyringId,
    peer: &str,
    entry: InboxEntry,
) -> Result<Applied> {
    if entry.sender != peer {
        tracing::debug!(peer, sender = %entry.sender, "inbox entry names a different sender");
    }
    let incoming = entry.access_file;
    incoming.validate_structure()?;
    incoming.check_keys()?;

    let Some(id) = root.find_by_page(&incoming.server_link, &incoming.page_name) else {
        let name = free_name(root, target, &incoming, peer);
        let id = root.add_file(target, &name, incoming)?;
        return Ok(Applied::Added(id));
    };

    let mut merged = root
        .access_file(id)
        .cloned()
        .ok_or_else(|| KeyringError::MissingReference(format!("access file {:?}", id)))?;
    if !merge_access_files(&mut merged, &incoming)? {
        return Ok(Applied::Unchanged);
    }
    if let Some(record) = root.access_file_mut(id) {
        *record = merged;
    }
    Ok(Applied::Merged(id))
}

/// An entry name under `target` for a record that arrived from `peer`.
///
/// The suffix is our own nickname for the inbox owner, never the sender
/// string carried inside the entry.
fn free_name(root: &RootKeyring, target: KeyringId, file: &AccessFile, peer: &str) -> String {
    let taken = |name: &str| root.file_id(name, target).is_some();
    if !taken(&file.filename) {
        return file.filename.clone();
    }
    let base = format!("{} ({})", file.filename, peer);
    let mut name = base.clone();
    let mut n = 2;
    while taken(&name) {
        name = format!("{} {}", base, n);
        n += 1;
    }
    name
}

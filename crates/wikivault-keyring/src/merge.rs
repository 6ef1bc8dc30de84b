//! Merging another copy of a keyring tree into this one.
//!
//! Children are matched by entry name level by level. Matched records merge
//! as in [`wikivault_access::merge_access_files`]; unmatched entries are
//! copied over with everything under them. The whole import is verified up
//! front and applied to a scratch copy, so a failure leaves the local tree
//! untouched.

use std::collections::{HashMap, HashSet};

use wikivault_access::{merge_access_files, AccessError};

use crate::error::Result;
use crate::graph::{AccessFileId, KeyringId};
use crate::reference::{AccessFileReference, SymmetricReference};
use crate::root::RootKeyring;

/// What a tree merge did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Entries copied in because nothing local had their name.
    pub added: usize,
    /// Matched records whose content changed.
    pub merged: usize,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.merged == 0
    }
}

struct MergeState {
    /// Incoming record -> local record it was merged into or copied as.
    memo: HashMap<AccessFileId, AccessFileId>,
    /// (local, incoming) keyring pairs already merged.
    pairs: HashSet<(KeyringId, KeyringId)>,
    report: MergeReport,
}

impl RootKeyring {
    /// Check every record reachable in this tree against its owner key.
    pub fn verify_all(&self) -> Result<()> {
        for id in self.all_access_files() {
            if let Some(file) = self.access_file(id) {
                if !file.verify_keys() {
                    return Err(AccessError::SignatureVerification {
                        page_name: file.page_name.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Merge `incoming` into this tree.
    ///
    /// Aborts without changes if any incoming record fails verification or
    /// any matched pair of records has different identities.
    pub fn merge_from(&mut self, incoming: &RootKeyring) -> Result<MergeReport> {
        if let Err(err) = incoming.verify_all() {
            tracing::warn!(error = %err, "rejecting keyring import");
            return Err(err);
        }

        let mut work = self.clone();
        let mut state = MergeState {
            memo: HashMap::new(),
            pairs: HashSet::new(),
            report: MergeReport::default(),
        };
        let (local_root, incoming_root) = (work.root, incoming.root);
        work.merge_keyring(local_root, incoming, incoming_root, &mut state)?;

        if work.contacts.absorb(&incoming.contacts) {
            state.report.merged += 1;
        }
        for (path, page) in &incoming.mounted_dirs {
            work.mounted_dirs
                .entry(path.clone())
                .or_insert_with(|| page.clone());
        }

        work.graph.recompute_parents(work.root);
        *self = work;

        tracing::info!(
            added = state.report.added,
            merged = state.report.merged,
            "merged keyring tree"
        );
        Ok(state.report)
    }

    fn merge_keyring(
        &mut self,
        local: KeyringId,
        incoming: &RootKeyring,
        remote: KeyringId,
        state: &mut MergeState,
    ) -> Result<()> {
        if !state.pairs.insert((local, remote)) {
            tracing::warn!(keyring = ?remote, "keyring pair already merged; skipping");
            return Ok(());
        }
        let Some(remote_keyring) = incoming.graph.keyring(remote) else {
            tracing::warn!(keyring = ?remote, "dangling keyring handle in import; skipping");
            return Ok(());
        };

        for child in &remote_keyring.children {
            let existing = self
                .graph
                .keyring(local)
                .and_then(|k| k.child(&child.name))
                .map(|c| c.access_file);

            match existing {
                None => self.adopt_child(local, incoming, child, state),
                Some(local_file) => {
                    self.merge_child(local_file, incoming, child, state)?;
                }
            }
        }
        Ok(())
    }

    /// Copy an unmatched incoming entry, with everything under it.
    fn adopt_child(
        &mut self,
        local: KeyringId,
        incoming: &RootKeyring,
        child: &SymmetricReference,
        state: &mut MergeState,
    ) {
        let Some(file) = self
            .graph
            .import_file(&incoming.graph, child.access_file, &mut state.memo)
        else {
            tracing::warn!(child = %child.name, "dangling access file handle in import; skipping");
            return;
        };

        if let Some(keyring) = self.graph.keyring_mut(local) {
            keyring.children.push(SymmetricReference {
                access_file: file,
                checked: false,
                ..child.clone()
            });
            keyring.changed = true;
        }
        state.report.added += 1;
    }

    /// Merge an incoming entry into the local entry of the same name.
    fn merge_child(
        &mut self,
        local_file: AccessFileId,
        incoming: &RootKeyring,
        child: &SymmetricReference,
        state: &mut MergeState,
    ) -> Result<()> {
        let Some(remote_node) = incoming.graph.file(child.access_file) else {
            tracing::warn!(child = %child.name, "dangling access file handle in import; skipping");
            return Ok(());
        };

        if state.memo.get(&child.access_file) != Some(&local_file) {
            state.memo.entry(child.access_file).or_insert(local_file);
            if let Some(node) = self.graph.file_mut(local_file) {
                if merge_access_files(&mut node.file, &remote_node.file)? {
                    node.changed = true;
                    state.report.merged += 1;
                }
            }
        }

        let remote_nested = remote_node.backed_keyring();
        let local_nested = self.graph.file(local_file).and_then(|n| n.backed_keyring());
        match (local_nested, remote_nested, remote_node.backing.as_ref()) {
            (Some(local_nested), Some(remote_nested), _) => {
                self.merge_keyring(local_nested, incoming, remote_nested, state)?;
            }
            (None, Some(remote_nested), Some(backing)) => {
                // Remote learned this record backs a keyring; take the keyring over.
                if let Some(copied) =
                    self.graph
                        .import_keyring(&incoming.graph, remote_nested, &mut state.memo)
                {
                    if let Some(node) = self.graph.file_mut(local_file) {
                        node.backing = Some(AccessFileReference {
                            target: backing.target.clone(),
                            keyring: copied,
                        });
                        node.changed = true;
                    }
                    state.report.added += 1;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

//! The root of a keyring tree.
//!
//! A [`RootKeyring`] owns the arena, the contact book, and the mapping from
//! mounted directories to pages. Paths name keyrings by the entry names
//! leading to them from the root, separated by `/`.

use std::collections::{BTreeMap, HashMap, HashSet};

use wikivault_access::AccessFile;

use crate::contact::ContactManager;
use crate::error::{KeyringError, Result};
use crate::graph::{AccessFileId, ChangeSet, Keyring, KeyringGraph, KeyringId, Visited};
use crate::reference::{AccessFileReference, InboxReference, PageTarget, SymmetricReference};

/// Root of a keyring tree.
#[derive(Debug, Clone)]
pub struct RootKeyring {
    pub(crate) graph: KeyringGraph,
    pub(crate) root: KeyringId,
    pub(crate) mounted_dirs: BTreeMap<String, String>,
    pub(crate) contacts: ContactManager,
}

/// Path segments, ignoring empty ones.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Split `path` into its parent path segments and final name.
fn split_last(path: &str) -> Option<(Vec<&str>, &str)> {
    let mut segments = split_path(path);
    let name = segments.pop()?;
    Some((segments, name))
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(KeyringError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl RootKeyring {
    /// An empty tree whose root keyring is called `name`, with a fresh inbox
    /// on `server_link`.
    pub fn new(name: impl Into<String>, server_link: &str) -> Self {
        let name = name.into();
        let inbox = InboxReference::generate(&name, server_link);
        let mut graph = KeyringGraph::new();
        let root = graph.insert_keyring(Keyring::new(name, Some(inbox)));

        Self {
            graph,
            root,
            mounted_dirs: BTreeMap::new(),
            contacts: ContactManager::new(),
        }
    }

    pub(crate) fn from_parts(
        graph: KeyringGraph,
        root: KeyringId,
        mounted_dirs: BTreeMap<String, String>,
        contacts: ContactManager,
    ) -> Self {
        Self {
            graph,
            root,
            mounted_dirs,
            contacts,
        }
    }

    pub fn root_id(&self) -> KeyringId {
        self.root
    }

    pub fn name(&self) -> &str {
        self.graph.keyring(self.root).map_or("", |k| k.name.as_str())
    }

    pub fn graph(&self) -> &KeyringGraph {
        &self.graph
    }

    pub fn contacts(&self) -> &ContactManager {
        &self.contacts
    }

    pub fn contacts_mut(&mut self) -> &mut ContactManager {
        &mut self.contacts
    }

    pub fn keyring(&self, id: KeyringId) -> Option<&Keyring> {
        self.graph.keyring(id)
    }

    fn keyring_mut(&mut self, id: KeyringId) -> Result<&mut Keyring> {
        self.graph
            .keyring_mut(id)
            .ok_or_else(|| KeyringError::MissingReference(format!("keyring {:?}", id)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_segments(&self, segments: &[&str]) -> Option<KeyringId> {
        let mut current = self.root;
        for segment in segments {
            let child = self.graph.keyring(current)?.child(segment)?;
            current = self.graph.child_keyring(child)?;
        }
        Some(current)
    }

    /// The keyring at `path`. The empty path is the root.
    pub fn resolve_keyring(&self, path: &str) -> Option<KeyringId> {
        self.resolve_segments(&split_path(path))
    }

    /// The keyring containing the entry at `path`, and the entry name.
    pub fn resolve_entry<'p>(&self, path: &'p str) -> Option<(KeyringId, &'p str)> {
        let (parent, name) = split_last(path)?;
        let keyring = self.resolve_segments(&parent)?;
        self.graph.keyring(keyring)?.child(name)?;
        Some((keyring, name))
    }

    pub fn file_id(&self, name: &str, keyring: KeyringId) -> Option<AccessFileId> {
        self.graph
            .keyring(keyring)?
            .child(name)
            .map(|c| c.access_file)
    }

    /// The record named `name` in `keyring`.
    pub fn get_access_file(&self, name: &str, keyring: KeyringId) -> Option<&AccessFile> {
        let id = self.file_id(name, keyring)?;
        self.access_file(id)
    }

    pub fn access_file(&self, id: AccessFileId) -> Option<&AccessFile> {
        self.graph.file(id).map(|node| &node.file)
    }

    /// Mutable access to a record. Marks it changed.
    pub fn access_file_mut(&mut self, id: AccessFileId) -> Option<&mut AccessFile> {
        self.graph.file_mut(id).map(|node| {
            node.changed = true;
            &mut node.file
        })
    }

    /// Every record reachable from the root.
    pub fn all_access_files(&self) -> Vec<AccessFileId> {
        let mut out = Vec::new();
        self.graph
            .collect_access_files(self.root, &mut Visited::new(), &mut out);
        out
    }

    /// Every keyring reachable from the root, the root first.
    pub fn all_keyrings(&self) -> Vec<KeyringId> {
        let mut out = Vec::new();
        self.graph
            .collect_keyrings(self.root, &mut Visited::new(), &mut out);
        out
    }

    /// The reachable record with this page identity.
    pub fn find_by_page(&self, server_link: &str, page_name: &str) -> Option<AccessFileId> {
        self.all_access_files().into_iter().find(|id| {
            self.access_file(*id)
                .is_some_and(|f| f.server_link == server_link && f.page_name == page_name)
        })
    }

    /// Path from the root to `keyring`, following parent links.
    pub fn path_of(&self, keyring: KeyringId) -> Option<String> {
        let limit = self.all_keyrings().len();
        let mut names = Vec::new();
        let mut current = keyring;
        while current != self.root {
            if names.len() >= limit {
                return None;
            }
            let node = self.graph.keyring(current)?;
            names.push(node.name.clone());
            current = node.parent?;
        }
        names.reverse();
        Some(format!("/{}", names.join("/")))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Structure
    // ─────────────────────────────────────────────────────────────────────────

    fn push_child(&mut self, keyring: KeyringId, reference: SymmetricReference) -> Result<()> {
        let parent = self.keyring_mut(keyring)?;
        if parent.child(&reference.name).is_some() {
            return Err(KeyringError::NameTaken {
                keyring: parent.name.clone(),
                name: reference.name,
            });
        }
        parent.children.push(reference);
        parent.changed = true;
        Ok(())
    }

    /// Register `file` as entry `name` of `keyring`.
    pub fn add_file(&mut self, keyring: KeyringId, name: &str, file: AccessFile) -> Result<AccessFileId> {
        check_name(name)?;
        let target = PageTarget::new(file.page_name.clone(), file.server_link.clone());
        let id = self.graph.insert_file(file);
        if let Err(err) = self.push_child(keyring, SymmetricReference::new(name, target, id)) {
            self.graph.release_file(id);
            return Err(err);
        }
        Ok(id)
    }

    /// Create keyring `name` under `parent`, backed by `file`.
    pub fn add_keyring(&mut self, parent: KeyringId, name: &str, file: AccessFile) -> Result<KeyringId> {
        let target = PageTarget::new(file.page_name.clone(), file.server_link.clone());
        let inbox = InboxReference::generate(name, &file.server_link);
        let file_id = self.add_file(parent, name, file)?;

        let keyring = self.graph.insert_keyring(Keyring::new(name, Some(inbox)));
        if let Some(node) = self.graph.file_mut(file_id) {
            node.backing = Some(AccessFileReference { target, keyring });
        }
        self.graph.recompute_parents(self.root);
        Ok(keyring)
    }

    /// Add another reference to an existing record.
    pub fn link_file(&mut self, keyring: KeyringId, name: &str, file: AccessFileId) -> Result<()> {
        check_name(name)?;
        let target = {
            let node = self
                .graph
                .file(file)
                .ok_or_else(|| KeyringError::MissingReference(format!("access file {:?}", file)))?;
            PageTarget::new(node.file.page_name.clone(), node.file.server_link.clone())
        };
        self.push_child(keyring, SymmetricReference::new(name, target, file))?;
        self.graph.recompute_parents(self.root);
        Ok(())
    }

    /// Remove entry `name` from `keyring`.
    ///
    /// The record is dropped once nothing references it.
    pub fn remove(&mut self, keyring: KeyringId, name: &str) -> Result<SymmetricReference> {
        let parent = self.keyring_mut(keyring)?;
        let index = parent
            .children
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| KeyringError::MissingReference(format!("entry {:?}", name)))?;
        let removed = parent.children.remove(index);
        parent.changed = true;

        self.release_unreferenced(removed.access_file);
        self.graph.recompute_parents(self.root);
        Ok(removed)
    }

    /// Free `file` and, if it backs a keyring, every record below it that
    /// nothing else references.
    fn release_unreferenced(&mut self, file: AccessFileId) {
        let mut pending = vec![file];
        let mut seen = HashSet::new();
        while let Some(file) = pending.pop() {
            if !seen.insert(file) || self.graph.reference_count(file) > 0 {
                continue;
            }
            let Some(node) = self.graph.release_file(file) else {
                continue;
            };
            let Some(backed) = node.backed_keyring().filter(|&k| k != self.root) else {
                continue;
            };
            if let Some(keyring) = self.graph.release_keyring(backed) {
                pending.extend(keyring.children.iter().map(|c| c.access_file));
            }
        }
    }

    /// Move and/or rename the entry at `old_path` to `new_path`.
    pub fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        let invalid = |reason| KeyringError::InvalidMove {
            from: old_path.to_string(),
            to: new_path.to_string(),
            reason,
        };

        let (from_keyring, from_name) = self
            .resolve_entry(old_path)
            .ok_or_else(|| KeyringError::MissingReference(old_path.to_string()))?;
        let (to_parent, to_name) = split_last(new_path).ok_or_else(|| invalid("empty target path"))?;
        check_name(to_name)?;
        let to_keyring = self
            .resolve_segments(&to_parent)
            .ok_or_else(|| KeyringError::MissingReference(new_path.to_string()))?;

        if from_keyring == to_keyring && from_name == to_name {
            return Ok(());
        }
        if self.keyring(to_keyring).is_some_and(|k| k.child(to_name).is_some()) {
            return Err(invalid("target exists"));
        }

        // A keyring may not be moved underneath itself.
        if let Some(moved) = self
            .keyring(from_keyring)
            .and_then(|k| k.child(from_name))
            .and_then(|c| self.graph.child_keyring(c))
        {
            let mut inside = Vec::new();
            self.graph
                .collect_keyrings(moved, &mut Visited::new(), &mut inside);
            if inside.contains(&to_keyring) {
                return Err(invalid("target is inside the moved keyring"));
            }
        }

        let mut reference = self.remove_reference(from_keyring, from_name)?;
        reference.name = to_name.to_string();
        self.push_child(to_keyring, reference)?;
        self.graph.recompute_parents(self.root);

        tracing::debug!(from = old_path, to = new_path, "renamed entry");
        Ok(())
    }

    fn remove_reference(&mut self, keyring: KeyringId, name: &str) -> Result<SymmetricReference> {
        let parent = self.keyring_mut(keyring)?;
        let index = parent
            .children
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| KeyringError::MissingReference(format!("entry {:?}", name)))?;
        parent.changed = true;
        Ok(parent.children.remove(index))
    }

    pub fn recompute_parents(&mut self) {
        self.graph.recompute_parents(self.root);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Change tracking
    // ─────────────────────────────────────────────────────────────────────────

    pub fn changed(&self) -> ChangeSet {
        let mut out = ChangeSet::default();
        self.graph
            .collect_changed(self.root, &mut Visited::new(), &mut out);
        out
    }

    pub fn clear_changed(&mut self) {
        self.graph.clear_changed();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Export
    // ─────────────────────────────────────────────────────────────────────────

    /// Mark the entry at `path` for export.
    pub fn set_checked(&mut self, path: &str, checked: bool) -> Result<()> {
        let (keyring, name) = self
            .resolve_entry(path)
            .ok_or_else(|| KeyringError::MissingReference(path.to_string()))?;
        let name = name.to_string();
        let entry = self
            .keyring_mut(keyring)?
            .child_mut(&name)
            .ok_or_else(|| KeyringError::MissingReference(path.to_string()))?;
        entry.checked = checked;
        Ok(())
    }

    /// A new tree holding the checked entries and the keyrings leading to
    /// them. Checked keyrings come with everything under them. Contacts and
    /// mounts are not exported.
    pub fn export_checked_subtree(&self) -> RootKeyring {
        let mut graph = KeyringGraph::new();
        let root = graph.insert_keyring(Keyring::new(self.name(), None));
        let mut memo = HashMap::new();
        self.copy_checked(self.root, &mut graph, root, &mut memo, &mut Visited::new());
        graph.recompute_parents(root);

        RootKeyring::from_parts(graph, root, BTreeMap::new(), ContactManager::new())
    }

    fn copy_checked(
        &self,
        src: KeyringId,
        graph: &mut KeyringGraph,
        dst: KeyringId,
        memo: &mut HashMap<AccessFileId, AccessFileId>,
        visited: &mut Visited,
    ) -> bool {
        if !visited.enter_keyring(src) {
            tracing::warn!(keyring = ?src, "keyring already visited during export; skipping");
            return false;
        }
        let Some(keyring) = self.graph.keyring(src) else {
            return false;
        };

        let mut copied = false;
        for child in &keyring.children {
            if child.checked {
                if let Some(file) = graph.import_file(&self.graph, child.access_file, memo) {
                    if let Some(parent) = graph.keyring_mut(dst) {
                        parent.children.push(SymmetricReference {
                            access_file: file,
                            checked: false,
                            ..child.clone()
                        });
                    }
                    copied = true;
                }
                continue;
            }

            let Some(node) = self.graph.file(child.access_file) else {
                continue;
            };
            let (Some(nested), Some(backing)) = (node.backed_keyring(), node.backing.as_ref()) else {
                continue;
            };
            let Some(source) = self.graph.keyring(nested) else {
                continue;
            };

            let skeleton = graph.insert_keyring(Keyring::new(source.name.clone(), source.inbox.clone()));
            if self.copy_checked(nested, graph, skeleton, memo, visited) {
                let file = graph.insert_file(node.file.clone());
                if let Some(copy) = graph.file_mut(file) {
                    copy.backing = Some(AccessFileReference {
                        target: backing.target.clone(),
                        keyring: skeleton,
                    });
                }
                if let Some(parent) = graph.keyring_mut(dst) {
                    parent.children.push(SymmetricReference {
                        access_file: file,
                        checked: false,
                        ..child.clone()
                    });
                }
                copied = true;
            } else {
                graph.release_keyring(skeleton);
            }
        }
        copied
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mounts
    // ─────────────────────────────────────────────────────────────────────────

    /// Map a local mount directory to a page.
    pub fn mount(&mut self, path: impl Into<String>, page: impl Into<String>) {
        self.mounted_dirs.insert(path.into(), page.into());
    }

    pub fn unmount(&mut self, path: &str) -> Option<String> {
        self.mounted_dirs.remove(path)
    }

    pub fn page_for_mount(&self, path: &str) -> Option<&str> {
        self.mounted_dirs.get(path).map(String::as_str)
    }

    pub fn mounts(&self) -> &BTreeMap<String, String> {
        &self.mounted_dirs
    }
}

//! Arena storage for the reference graph.
//!
//! Keyrings and access records live in slot vectors and refer to each other
//! by [`KeyringId`] / [`AccessFileId`] handles. Sharing can make one record
//! reachable from several keyrings, and can close a cycle back into an
//! ancestor, so every traversal carries a [`Visited`] set and treats a revisit
//! as a logged skip.
//!
//! Parent links are derived data. [`KeyringGraph::recompute_parents`]
//! rebuilds them from the child references after structural changes.

use std::collections::{HashMap, HashSet};

use wikivault_access::AccessFile;

use crate::reference::{AccessFileReference, InboxReference, SymmetricReference};

/// Handle to a keyring in a [`KeyringGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyringId(pub(crate) usize);

/// Handle to an access record in a [`KeyringGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccessFileId(pub(crate) usize);

/// An access record and, if its content is a keyring document, the link to
/// that keyring.
#[derive(Debug, Clone)]
pub struct FileNode {
    pub file: AccessFile,
    pub backing: Option<AccessFileReference>,
    pub changed: bool,
}

impl FileNode {
    pub fn backed_keyring(&self) -> Option<KeyringId> {
        self.backing.as_ref().map(|b| b.keyring)
    }
}

/// A named container of child references.
#[derive(Debug, Clone)]
pub struct Keyring {
    pub name: String,
    pub children: Vec<SymmetricReference>,
    pub inbox: Option<InboxReference>,

    /// Derived; see [`KeyringGraph::recompute_parents`].
    pub parent: Option<KeyringId>,

    pub changed: bool,
}

impl Keyring {
    pub fn new(name: impl Into<String>, inbox: Option<InboxReference>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            inbox,
            parent: None,
            changed: true,
        }
    }

    pub fn child(&self, name: &str) -> Option<&SymmetricReference> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut SymmetricReference> {
        self.children.iter_mut().find(|c| c.name == name)
    }
}

/// Tracks what a traversal has already entered.
#[derive(Debug, Default)]
pub struct Visited {
    keyrings: HashSet<KeyringId>,
    files: HashSet<AccessFileId>,
}

impl Visited {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` entered. Returns `false` if it already was.
    pub fn enter_keyring(&mut self, id: KeyringId) -> bool {
        self.keyrings.insert(id)
    }

    /// Mark `id` entered. Returns `false` if it already was.
    pub fn enter_file(&mut self, id: AccessFileId) -> bool {
        self.files.insert(id)
    }

    pub fn has_keyring(&self, id: KeyringId) -> bool {
        self.keyrings.contains(&id)
    }
}

/// Changed entities found by [`KeyringGraph::collect_changed`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub files: Vec<AccessFileId>,
    pub keyrings: Vec<KeyringId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.keyrings.is_empty()
    }
}

/// Slot arena of keyrings and access records.
#[derive(Debug, Clone, Default)]
pub struct KeyringGraph {
    keyrings: Vec<Option<Keyring>>,
    files: Vec<Option<FileNode>>,
}

impl KeyringGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Slots
    // ─────────────────────────────────────────────────────────────────────────

    pub fn insert_keyring(&mut self, keyring: Keyring) -> KeyringId {
        self.keyrings.push(Some(keyring));
        KeyringId(self.keyrings.len() - 1)
    }

    pub fn insert_file(&mut self, file: AccessFile) -> AccessFileId {
        self.files.push(Some(FileNode {
            file,
            backing: None,
            changed: true,
        }));
        AccessFileId(self.files.len() - 1)
    }

    pub fn keyring(&self, id: KeyringId) -> Option<&Keyring> {
        self.keyrings.get(id.0).and_then(Option::as_ref)
    }

    pub fn keyring_mut(&mut self, id: KeyringId) -> Option<&mut Keyring> {
        self.keyrings.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn file(&self, id: AccessFileId) -> Option<&FileNode> {
        self.files.get(id.0).and_then(Option::as_ref)
    }

    pub fn file_mut(&mut self, id: AccessFileId) -> Option<&mut FileNode> {
        self.files.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Free a record slot. The caller must have unlinked every reference to it.
    pub(crate) fn release_file(&mut self, id: AccessFileId) -> Option<FileNode> {
        self.files.get_mut(id.0).and_then(Option::take)
    }

    pub(crate) fn release_keyring(&mut self, id: KeyringId) -> Option<Keyring> {
        self.keyrings.get_mut(id.0).and_then(Option::take)
    }

    /// Number of child references to `file` across every live keyring.
    pub fn reference_count(&self, file: AccessFileId) -> usize {
        self.keyrings
            .iter()
            .flatten()
            .flat_map(|k| k.children.iter())
            .filter(|c| c.access_file == file)
            .count()
    }

    /// The keyring a child reference leads to, if its record backs one.
    pub fn child_keyring(&self, child: &SymmetricReference) -> Option<KeyringId> {
        self.file(child.access_file).and_then(FileNode::backed_keyring)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Traversal
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter `id` for a traversal, logging a revisit or dangling handle.
    fn enter<'a>(&'a self, id: KeyringId, visited: &mut Visited) -> Option<&'a Keyring> {
        if !visited.enter_keyring(id) {
            tracing::warn!(keyring = ?id, "keyring already visited; skipping");
            return None;
        }
        let keyring = self.keyring(id);
        if keyring.is_none() {
            tracing::warn!(keyring = ?id, "dangling keyring handle; skipping");
        }
        keyring
    }

    /// Every access record reachable from `root`, each reported once.
    pub fn collect_access_files(
        &self,
        root: KeyringId,
        visited: &mut Visited,
        out: &mut Vec<AccessFileId>,
    ) {
        let Some(keyring) = self.enter(root, visited) else {
            return;
        };

        for child in &keyring.children {
            let Some(node) = self.file(child.access_file) else {
                tracing::warn!(
                    keyring = %keyring.name,
                    child = %child.name,
                    "dangling access file handle; skipping"
                );
                continue;
            };
            if visited.enter_file(child.access_file) {
                out.push(child.access_file);
            }
            if let Some(nested) = node.backed_keyring() {
                self.collect_access_files(nested, visited, out);
            }
        }
    }

    /// Every keyring reachable from `root`, including `root`.
    pub fn collect_keyrings(&self, root: KeyringId, visited: &mut Visited, out: &mut Vec<KeyringId>) {
        let Some(keyring) = self.enter(root, visited) else {
            return;
        };
        out.push(root);

        for child in &keyring.children {
            match self.file(child.access_file) {
                Some(node) => {
                    if let Some(nested) = node.backed_keyring() {
                        self.collect_keyrings(nested, visited, out);
                    }
                }
                None => tracing::warn!(child = %child.name, "dangling access file handle; skipping"),
            }
        }
    }

    /// Records and keyrings reachable from `root` whose changed flag is set.
    pub fn collect_changed(&self, root: KeyringId, visited: &mut Visited, out: &mut ChangeSet) {
        let Some(keyring) = self.enter(root, visited) else {
            return;
        };
        if keyring.changed {
            out.keyrings.push(root);
        }

        for child in &keyring.children {
            let Some(node) = self.file(child.access_file) else {
                tracing::warn!(child = %child.name, "dangling access file handle; skipping");
                continue;
            };
            if visited.enter_file(child.access_file) && node.changed {
                out.files.push(child.access_file);
            }
            if let Some(nested) = node.backed_keyring() {
                self.collect_changed(nested, visited, out);
            }
        }
    }

    /// Reset the changed flag on everything.
    pub fn clear_changed(&mut self) {
        for keyring in self.keyrings.iter_mut().flatten() {
            keyring.changed = false;
        }
        for node in self.files.iter_mut().flatten() {
            node.changed = false;
        }
    }

    /// Rebuild parent links from child references, starting at `root`.
    ///
    /// A keyring reachable along several paths keeps the first parent found.
    pub fn recompute_parents(&mut self, root: KeyringId) {
        for keyring in self.keyrings.iter_mut().flatten() {
            keyring.parent = None;
        }

        let mut visited = Visited::new();
        let mut links = Vec::new();
        self.parent_links(root, &mut visited, &mut links);

        for (child, parent) in links {
            if let Some(keyring) = self.keyring_mut(child) {
                keyring.parent = Some(parent);
            }
        }
    }

    fn parent_links(
        &self,
        id: KeyringId,
        visited: &mut Visited,
        links: &mut Vec<(KeyringId, KeyringId)>,
    ) {
        let Some(keyring) = self.enter(id, visited) else {
            return;
        };
        for child in &keyring.children {
            if let Some(nested) = self.child_keyring(child) {
                if !visited.has_keyring(nested) {
                    links.push((nested, id));
                    self.parent_links(nested, visited, links);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Copying between graphs
    // ─────────────────────────────────────────────────────────────────────────

    /// Deep-copy the record `file` of `src`, and the keyring it backs, into
    /// this graph.
    ///
    /// `memo` maps already copied `src` records to their copies, so shared
    /// records stay shared and cycles close onto the copy.
    pub fn import_file(
        &mut self,
        src: &KeyringGraph,
        file: AccessFileId,
        memo: &mut HashMap<AccessFileId, AccessFileId>,
    ) -> Option<AccessFileId> {
        if let Some(copied) = memo.get(&file) {
            return Some(*copied);
        }
        let node = src.file(file)?;

        let copy = self.insert_file(node.file.clone());
        memo.insert(file, copy);

        if let Some(backing) = &node.backing {
            match self.import_keyring(src, backing.keyring, memo) {
                Some(keyring) => {
                    if let Some(target) = self.file_mut(copy) {
                        target.backing = Some(AccessFileReference {
                            target: backing.target.clone(),
                            keyring,
                        });
                    }
                }
                None => tracing::warn!(
                    page = %node.file.page_name,
                    "backing keyring missing in source; copied as plain record"
                ),
            }
        }
        Some(copy)
    }

    /// Deep-copy keyring `id` of `src` and everything under it.
    pub fn import_keyring(
        &mut self,
        src: &KeyringGraph,
        id: KeyringId,
        memo: &mut HashMap<AccessFileId, AccessFileId>,
    ) -> Option<KeyringId> {
        let source = src.keyring(id)?;
        let copy = self.insert_keyring(Keyring::new(source.name.clone(), source.inbox.clone()));

        for child in &source.children {
            let Some(file) = self.import_file(src, child.access_file, memo) else {
                tracing::warn!(child = %child.name, "dangling access file handle; not copied");
                continue;
            };
            if let Some(keyring) = self.keyring_mut(copy) {
                keyring.children.push(SymmetricReference {
                    access_file: file,
                    ..child.clone()
                });
            }
        }
        Some(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::PageTarget;

    fn file(page: &str) -> AccessFile {
        AccessFile::new(page, "S", page)
    }

    fn link(graph: &mut KeyringGraph, parent: KeyringId, name: &str, file: AccessFileId) {
        let page = graph.file(file).unwrap().file.page_name.clone();
        graph
            .keyring_mut(parent)
            .unwrap()
            .children
            .push(SymmetricReference::new(name, PageTarget::new(page, "S"), file));
    }

    fn nested(graph: &mut KeyringGraph, parent: KeyringId, name: &str) -> (KeyringId, AccessFileId) {
        let keyring = graph.insert_keyring(Keyring::new(name, None));
        let backing = graph.insert_file(file(name));
        graph.file_mut(backing).unwrap().backing = Some(AccessFileReference {
            target: PageTarget::new(name, "S"),
            keyring,
        });
        link(graph, parent, name, backing);
        (keyring, backing)
    }

    /// root -> a -> b -> (back to a), with one leaf shared by root and b.
    fn cyclic_graph() -> (KeyringGraph, KeyringId, KeyringId, KeyringId) {
        let mut graph = KeyringGraph::new();
        let root = graph.insert_keyring(Keyring::new("root", None));
        let (a, a_file) = nested(&mut graph, root, "a");
        let (b, _) = nested(&mut graph, a, "b");
        link(&mut graph, b, "back-to-a", a_file);

        let leaf = graph.insert_file(file("leaf"));
        link(&mut graph, root, "leaf", leaf);
        link(&mut graph, b, "leaf-again", leaf);
        (graph, root, a, b)
    }

    #[test]
    fn test_collect_access_files_terminates_on_cycle() {
        let (graph, root, _, _) = cyclic_graph();
        let mut out = Vec::new();
        graph.collect_access_files(root, &mut Visited::new(), &mut out);

        // a, b, leaf; each once
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_collect_keyrings_terminates_on_cycle() {
        let (graph, root, a, b) = cyclic_graph();
        let mut out = Vec::new();
        graph.collect_keyrings(root, &mut Visited::new(), &mut out);

        assert_eq!(out, vec![root, a, b]);
    }

    #[test]
    fn test_recompute_parents() {
        let (mut graph, root, a, b) = cyclic_graph();
        graph.keyring_mut(b).unwrap().parent = Some(root);
        graph.recompute_parents(root);

        assert_eq!(graph.keyring(root).unwrap().parent, None);
        assert_eq!(graph.keyring(a).unwrap().parent, Some(root));
        assert_eq!(graph.keyring(b).unwrap().parent, Some(a));
    }

    #[test]
    fn test_collect_changed_and_clear() {
        let (mut graph, root, _, _) = cyclic_graph();
        let mut changes = ChangeSet::default();
        graph.collect_changed(root, &mut Visited::new(), &mut changes);
        assert_eq!(changes.keyrings.len(), 3);
        assert_eq!(changes.files.len(), 3);

        graph.clear_changed();
        let mut changes = ChangeSet::default();
        graph.collect_changed(root, &mut Visited::new(), &mut changes);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_dangling_handle_skipped() {
        let mut graph = KeyringGraph::new();
        let root = graph.insert_keyring(Keyring::new("root", None));
        let leaf = graph.insert_file(file("leaf"));
        let gone = graph.insert_file(file("gone"));
        link(&mut graph, root, "leaf", leaf);
        link(&mut graph, root, "gone", gone);
        graph.release_file(gone);

        let mut out = Vec::new();
        graph.collect_access_files(root, &mut Visited::new(), &mut out);
        assert_eq!(out, vec![leaf]);
    }

    #[test]
    fn test_import_preserves_sharing_and_cycles() {
        let (src, root, _, _) = cyclic_graph();
        let mut dst = KeyringGraph::new();
        let mut memo = HashMap::new();
        let copy = dst.import_keyring(&src, root, &mut memo).unwrap();

        let mut files = Vec::new();
        dst.collect_access_files(copy, &mut Visited::new(), &mut files);
        assert_eq!(files.len(), 3);

        let mut keyrings = Vec::new();
        dst.collect_keyrings(copy, &mut Visited::new(), &mut keyrings);
        assert_eq!(keyrings.len(), 3);
    }

    #[test]
    fn test_reference_count() {
        let (graph, root, _, _) = cyclic_graph();
        let leaf = graph.keyring(root).unwrap().child("leaf").unwrap().access_file;
        assert_eq!(graph.reference_count(leaf), 2);
    }
}

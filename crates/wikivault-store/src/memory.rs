//! In-memory implementation of the RevisionStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use wikivault_core::RevisionId;

use crate::error::{Result, StoreError};
use crate::traits::{Revision, RevisionStore};

/// In-memory revision store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryRevisionStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Last id handed out; shared by every page.
    last_id: u64,

    /// Page name -> revisions, oldest first.
    pages: HashMap<String, Vec<(RevisionId, Vec<u8>)>>,
}

impl MemoryRevisionStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                last_id: 0,
                pages: HashMap::new(),
            }),
        }
    }

    /// Number of revisions across all pages.
    pub fn revision_count(&self) -> Result<usize> {
        let inner = self.inner.read().map_err(StoreError::poisoned)?;
        Ok(inner.pages.values().map(Vec::len).sum())
    }
}

impl Default for MemoryRevisionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn to_revision(page: &str, (id, content): &(RevisionId, Vec<u8>)) -> Revision {
    Revision {
        id: *id,
        page: page.to_string(),
        content: content.clone(),
    }
}

impl RevisionStore for MemoryRevisionStore {
    fn latest_revision(&self, page: &str) -> Result<Option<Revision>> {
        let inner = self.inner.read().map_err(StoreError::poisoned)?;
        Ok(inner
            .pages
            .get(page)
            .and_then(|revs| revs.last())
            .map(|entry| to_revision(page, entry)))
    }

    fn revision(&self, page: &str, id: RevisionId) -> Result<Option<Revision>> {
        let inner = self.inner.read().map_err(StoreError::poisoned)?;
        Ok(inner.pages.get(page).and_then(|revs| {
            revs.iter()
                .find(|(rev, _)| *rev == id)
                .map(|entry| to_revision(page, entry))
        }))
    }

    fn all_revisions(&self, page: &str) -> Result<Vec<Revision>> {
        let inner = self.inner.read().map_err(StoreError::poisoned)?;
        Ok(inner
            .pages
            .get(page)
            .map(|revs| revs.iter().map(|entry| to_revision(page, entry)).collect())
            .unwrap_or_default())
    }

    fn exists(&self, page: &str) -> Result<bool> {
        let inner = self.inner.read().map_err(StoreError::poisoned)?;
        Ok(inner.pages.get(page).is_some_and(|revs| !revs.is_empty()))
    }

    fn upload(&self, page: &str, content: &[u8]) -> Result<RevisionId> {
        let mut inner = self.inner.write().map_err(StoreError::poisoned)?;
        inner.last_id += 1;
        let id = RevisionId(inner.last_id);
        inner
            .pages
            .entry(page.to_string())
            .or_default()
            .push((id, content.to_vec()));
        Ok(id)
    }
}

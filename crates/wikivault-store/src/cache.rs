//! Revision caching.
//!
//! [`CachedRevisionStore`] answers `revision` lookups from a
//! [`RevisionCache`] when it can and fills the cache on uploads and misses.
//! What the cache keeps is governed by a [`CachePolicy`].

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use wikivault_core::RevisionId;

use crate::error::{Result, StoreError};
use crate::traits::{Revision, RevisionCache, RevisionStore};

/// How many revisions of a page the cache keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvictionPolicy {
    /// Keep every revision ever seen.
    #[default]
    KeepAll,
    /// Keep only the newest revision.
    KeepLatest,
    /// Keep nothing.
    KeepNone,
}

/// A global eviction policy with per-page overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePolicy {
    #[serde(default)]
    pub default: EvictionPolicy,
    #[serde(default)]
    pub overrides: HashMap<String, EvictionPolicy>,
}

impl CachePolicy {
    pub fn new(default: EvictionPolicy) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, page: impl Into<String>, policy: EvictionPolicy) -> Self {
        self.overrides.insert(page.into(), policy);
        self
    }

    /// The policy in force for `page`.
    pub fn for_page(&self, page: &str) -> EvictionPolicy {
        self.overrides.get(page).copied().unwrap_or(self.default)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory cache
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory revision cache. Thread-safe via RwLock.
pub struct MemoryRevisionCache {
    policy: CachePolicy,
    pages: RwLock<HashMap<String, BTreeMap<RevisionId, Vec<u8>>>>,
}

impl MemoryRevisionCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            pages: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Number of cached revisions of `page`.
    pub fn cached_count(&self, page: &str) -> Result<usize> {
        let pages = self.pages.read().map_err(StoreError::poisoned)?;
        Ok(pages.get(page).map(BTreeMap::len).unwrap_or(0))
    }
}

impl Default for MemoryRevisionCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl RevisionCache for MemoryRevisionCache {
    fn get(&self, page: &str, id: RevisionId) -> Result<Option<Vec<u8>>> {
        let pages = self.pages.read().map_err(StoreError::poisoned)?;
        Ok(pages.get(page).and_then(|revs| revs.get(&id)).cloned())
    }

    fn put(&self, page: &str, id: RevisionId, content: &[u8]) -> Result<()> {
        let policy = self.policy.for_page(page);
        let mut pages = self.pages.write().map_err(StoreError::poisoned)?;

        match policy {
            EvictionPolicy::KeepNone => {
                pages.remove(page);
            }
            EvictionPolicy::KeepAll => {
                pages
                    .entry(page.to_string())
                    .or_default()
                    .insert(id, content.to_vec());
            }
            EvictionPolicy::KeepLatest => {
                let revs = pages.entry(page.to_string()).or_default();
                let newest = revs.keys().next_back().copied();
                if newest.map_or(true, |newest| id >= newest) {
                    revs.clear();
                    revs.insert(id, content.to_vec());
                }
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache-through store
// ─────────────────────────────────────────────────────────────────────────────

/// A revision store fronted by a cache.
pub struct CachedRevisionStore<S, C> {
    store: S,
    cache: C,
}

impl<S: RevisionStore, C: RevisionCache> CachedRevisionStore<S, C> {
    pub fn new(store: S, cache: C) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}

impl<S: RevisionStore, C: RevisionCache> RevisionStore for CachedRevisionStore<S, C> {
    fn latest_revision(&self, page: &str) -> Result<Option<Revision>> {
        let latest = self.store.latest_revision(page)?;
        if let Some(rev) = &latest {
            self.cache.put(page, rev.id, &rev.content)?;
        }
        Ok(latest)
    }

    fn revision(&self, page: &str, id: RevisionId) -> Result<Option<Revision>> {
        if let Some(content) = self.cache.get(page, id)? {
            tracing::debug!(page, rev = %id, "revision cache hit");
            return Ok(Some(Revision {
                id,
                page: page.to_string(),
                content,
            }));
        }

        let fetched = self.store.revision(page, id)?;
        if let Some(rev) = &fetched {
            self.cache.put(page, rev.id, &rev.content)?;
        }
        Ok(fetched)
    }

    fn all_revisions(&self, page: &str) -> Result<Vec<Revision>> {
        self.store.all_revisions(page)
    }

    fn exists(&self, page: &str) -> Result<bool> {
        self.store.exists(page)
    }

    fn upload(&self, page: &str, content: &[u8]) -> Result<RevisionId> {
        let id = self.store.upload(page, content)?;
        self.cache.put(page, id, content)?;
        Ok(id)
    }
}

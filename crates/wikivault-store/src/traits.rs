//! Store traits: the abstract interface to the revisioned page backend.
//!
//! Pages are append-only: every upload creates a new revision with an id
//! assigned by the store. Ids are strictly increasing across the whole
//! store, so "everything after revision N" is a meaningful query on any page.

use std::sync::Arc;

use wikivault_core::RevisionId;

use crate::error::Result;

/// One stored revision of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub id: RevisionId,
    pub page: String,
    pub content: Vec<u8>,
}

/// The revision store: page history keyed by page name.
///
/// All calls are blocking. Implementations must be safe to share between
/// threads; callers serialize mutations on their own side.
pub trait RevisionStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// The newest revision of `page`, or `None` for a page with no history.
    fn latest_revision(&self, page: &str) -> Result<Option<Revision>>;

    /// A specific revision of `page`.
    fn revision(&self, page: &str, id: RevisionId) -> Result<Option<Revision>>;

    /// Every revision of `page`, oldest first.
    fn all_revisions(&self, page: &str) -> Result<Vec<Revision>>;

    /// Whether `page` has any history.
    fn exists(&self, page: &str) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a new revision to `page` and return its id.
    fn upload(&self, page: &str, content: &[u8]) -> Result<RevisionId>;
}

/// Convenience queries built on [`RevisionStore`].
pub trait RevisionStoreExt: RevisionStore {
    /// Revisions of `page` newer than `after`, oldest first.
    ///
    /// `None` returns the whole history.
    fn revisions_since(&self, page: &str, after: Option<RevisionId>) -> Result<Vec<Revision>> {
        let mut revisions = self.all_revisions(page)?;
        if let Some(after) = after {
            revisions.retain(|r| r.id > after);
        }
        Ok(revisions)
    }

    /// Id of the newest revision of `page`.
    fn latest_revision_id(&self, page: &str) -> Result<Option<RevisionId>> {
        Ok(self.latest_revision(page)?.map(|r| r.id))
    }
}

impl<T: RevisionStore + ?Sized> RevisionStoreExt for T {}

impl<T: RevisionStore + ?Sized> RevisionStore for Arc<T> {
    fn latest_revision(&self, page: &str) -> Result<Option<Revision>> {
        (**self).latest_revision(page)
    }

    fn revision(&self, page: &str, id: RevisionId) -> Result<Option<Revision>> {
        (**self).revision(page, id)
    }

    fn all_revisions(&self, page: &str) -> Result<Vec<Revision>> {
        (**self).all_revisions(page)
    }

    fn exists(&self, page: &str) -> Result<bool> {
        (**self).exists(page)
    }

    fn upload(&self, page: &str, content: &[u8]) -> Result<RevisionId> {
        (**self).upload(page, content)
    }
}

/// A local cache of revision contents.
///
/// Revisions are immutable, so an entry never goes stale; the eviction
/// policy only bounds how much is kept.
pub trait RevisionCache: Send + Sync {
    /// Cached content of `page` at `id`.
    fn get(&self, page: &str, id: RevisionId) -> Result<Option<Vec<u8>>>;

    /// Record the content of `page` at `id`.
    fn put(&self, page: &str, id: RevisionId, content: &[u8]) -> Result<()>;
}

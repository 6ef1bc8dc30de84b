//! SQLite implementations of the store traits.
//!
//! This is the durable backend for local deployments and tests. It uses
//! rusqlite with bundled SQLite behind a mutex.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use wikivault_core::RevisionId;

use crate::cache::{CachePolicy, EvictionPolicy};
use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Revision, RevisionCache, RevisionStore};

/// SQLite-based revision store.
///
/// Thread-safe via internal Mutex.
#[derive(Clone)]
pub struct SqliteRevisionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRevisionStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A revision cache living in the same database.
    pub fn cache(&self, policy: CachePolicy) -> SqliteRevisionCache {
        SqliteRevisionCache {
            conn: Arc::clone(&self.conn),
            policy,
        }
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(StoreError::poisoned)?;
        f(&conn)
    }
}

fn row_to_revision(row: &rusqlite::Row<'_>) -> rusqlite::Result<Revision> {
    let id: i64 = row.get("rev_id")?;
    Ok(Revision {
        id: RevisionId(id as u64),
        page: row.get("page")?,
        content: row.get("content")?,
    })
}

fn rev_param(id: RevisionId) -> Result<i64> {
    i64::try_from(id.get())
        .map_err(|_| StoreError::InvalidData(format!("revision id {} out of range", id)))
}

impl RevisionStore for SqliteRevisionStore {
    fn latest_revision(&self, page: &str) -> Result<Option<Revision>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT rev_id, page, content FROM revisions
                     WHERE page = ?1 ORDER BY rev_id DESC LIMIT 1",
                    params![page],
                    row_to_revision,
                )
                .optional()?)
        })
    }

    fn revision(&self, page: &str, id: RevisionId) -> Result<Option<Revision>> {
        let rev_id = rev_param(id)?;
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT rev_id, page, content FROM revisions
                     WHERE page = ?1 AND rev_id = ?2",
                    params![page, rev_id],
                    row_to_revision,
                )
                .optional()?)
        })
    }

    fn all_revisions(&self, page: &str) -> Result<Vec<Revision>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT rev_id, page, content FROM revisions
                 WHERE page = ?1 ORDER BY rev_id ASC",
            )?;
            let revisions = stmt
                .query_map(params![page], row_to_revision)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(revisions)
        })
    }

    fn exists(&self, page: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM revisions WHERE page = ?1",
                params![page],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    fn upload(&self, page: &str, content: &[u8]) -> Result<RevisionId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO revisions (page, content, uploaded_at) VALUES (?1, ?2, ?3)",
                params![page, content, now_millis()],
            )?;
            let id = conn.last_insert_rowid();
            tracing::debug!(page, rev = id, bytes = content.len(), "uploaded revision");
            Ok(RevisionId(id as u64))
        })
    }
}

/// SQLite-backed revision cache sharing a [`SqliteRevisionStore`] connection.
pub struct SqliteRevisionCache {
    conn: Arc<Mutex<Connection>>,
    policy: CachePolicy,
}

impl RevisionCache for SqliteRevisionCache {
    fn get(&self, page: &str, id: RevisionId) -> Result<Option<Vec<u8>>> {
        let rev_id = rev_param(id)?;
        let conn = self.conn.lock().map_err(StoreError::poisoned)?;
        Ok(conn
            .query_row(
                "SELECT content FROM revision_cache WHERE page = ?1 AND rev_id = ?2",
                params![page, rev_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn put(&self, page: &str, id: RevisionId, content: &[u8]) -> Result<()> {
        let rev_id = rev_param(id)?;
        let mut conn = self.conn.lock().map_err(StoreError::poisoned)?;
        let tx = conn.transaction()?;

        match self.policy.for_page(page) {
            EvictionPolicy::KeepNone => {
                tx.execute("DELETE FROM revision_cache WHERE page = ?1", params![page])?;
            }
            EvictionPolicy::KeepAll => {
                tx.execute(
                    "INSERT OR REPLACE INTO revision_cache (page, rev_id, content) VALUES (?1, ?2, ?3)",
                    params![page, rev_id, content],
                )?;
            }
            EvictionPolicy::KeepLatest => {
                let newest: Option<i64> = tx.query_row(
                    "SELECT MAX(rev_id) FROM revision_cache WHERE page = ?1",
                    params![page],
                    |row| row.get(0),
                )?;
                if newest.map_or(true, |newest| rev_id >= newest) {
                    tx.execute("DELETE FROM revision_cache WHERE page = ?1", params![page])?;
                    tx.execute(
                        "INSERT INTO revision_cache (page, rev_id, content) VALUES (?1, ?2, ?3)",
                        params![page, rev_id, content],
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::RevisionStoreExt;

    #[test]
    fn test_upload_and_get_revision() {
        let store = SqliteRevisionStore::open_memory().unwrap();
        let id = store.upload("Page", b"hello").unwrap();

        let rev = store.revision("Page", id).unwrap().unwrap();
        assert_eq!(rev.content, b"hello");
        assert_eq!(store.latest_revision_id("Page").unwrap(), Some(id));
        assert!(store.exists("Page").unwrap());
        assert!(!store.exists("Missing").unwrap());
    }

    #[test]
    fn test_ids_monotonic_across_pages() {
        let store = SqliteRevisionStore::open_memory().unwrap();
        let ids: Vec<_> = ["A", "B", "A", "C"]
            .iter()
            .map(|page| store.upload(page, b"x").unwrap())
            .collect();

        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        let a = store.all_revisions("A").unwrap();
        assert_eq!(a.len(), 2);
        assert!(a[0].id < a[1].id);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revisions.db");

        let first = {
            let store = SqliteRevisionStore::open(&path).unwrap();
            store.upload("Page", b"one").unwrap()
        };

        let store = SqliteRevisionStore::open(&path).unwrap();
        assert_eq!(store.revision("Page", first).unwrap().unwrap().content, b"one");
        let second = store.upload("Page", b"two").unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_sqlite_cache_keep_latest() {
        let store = SqliteRevisionStore::open_memory().unwrap();
        let cache = store.cache(CachePolicy::new(EvictionPolicy::KeepLatest));

        cache.put("P", RevisionId(4), b"four").unwrap();
        cache.put("P", RevisionId(2), b"two").unwrap();
        assert!(cache.get("P", RevisionId(2)).unwrap().is_none());
        assert_eq!(cache.get("P", RevisionId(4)).unwrap().unwrap(), b"four");

        cache.put("P", RevisionId(9), b"nine").unwrap();
        assert!(cache.get("P", RevisionId(4)).unwrap().is_none());
    }

    #[test]
    fn test_sqlite_cache_keep_none_override() {
        let store = SqliteRevisionStore::open_memory().unwrap();
        let cache = store.cache(
            CachePolicy::new(EvictionPolicy::KeepAll).with_override("Inbox", EvictionPolicy::KeepNone),
        );

        cache.put("Inbox", RevisionId(1), b"sealed").unwrap();
        cache.put("Page", RevisionId(2), b"a").unwrap();
        cache.put("Page", RevisionId(3), b"b").unwrap();

        assert!(cache.get("Inbox", RevisionId(1)).unwrap().is_none());
        assert!(cache.get("Page", RevisionId(2)).unwrap().is_some());
        assert!(cache.get("Page", RevisionId(3)).unwrap().is_some());
    }
}

//! Versioned schema for the SQLite revision store.
//!
//! The schema version lives in SQLite's `user_version` pragma. Each entry of
//! [`STEPS`] moves the schema up one version; all pending steps and the
//! version bump commit together.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// v1: page revision history. AUTOINCREMENT keeps ids strictly increasing
/// even after rows are removed.
const V1_REVISIONS: &str = r#"
    CREATE TABLE revisions (
        rev_id INTEGER PRIMARY KEY AUTOINCREMENT,
        page TEXT NOT NULL,
        content BLOB NOT NULL,
        uploaded_at INTEGER NOT NULL
    );
    CREATE INDEX idx_revisions_page ON revisions(page, rev_id);
"#;

/// v2: local revision cache.
const V2_CACHE: &str = r#"
    CREATE TABLE revision_cache (
        page TEXT NOT NULL,
        rev_id INTEGER NOT NULL,
        content BLOB NOT NULL,
        PRIMARY KEY (page, rev_id)
    );
"#;

const STEPS: &[&str] = &[V1_REVISIONS, V2_CACHE];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = STEPS.len() as u32;

/// The schema version recorded in `conn`. Zero for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring `conn` up to [`CURRENT_VERSION`]. A database already there is left
/// alone; one written by a newer build is refused.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let found = schema_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "schema v{} is newer than supported v{}",
            found, CURRENT_VERSION
        )));
    }
    if found == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (index, step) in STEPS.iter().enumerate().skip(found as usize) {
        tx.execute_batch(step)?;
        tracing::debug!(version = index + 1, "applied revision store migration");
    }
    tx.pragma_update(None, "user_version", CURRENT_VERSION)?;
    tx.commit()?;

    tracing::info!(from = found, to = CURRENT_VERSION, "migrated revision store schema");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_database_gets_every_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);

        migrate(&mut conn).unwrap();
        let tables = tables(&conn);
        assert!(tables.iter().any(|t| t == "revisions"));
        assert!(tables.iter().any(|t| t == "revision_cache"));
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_rerun_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_partial_schema_is_upgraded() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(V1_REVISIONS).unwrap();
        conn.pragma_update(None, "user_version", 1u32).unwrap();

        migrate(&mut conn).unwrap();
        assert!(tables(&conn).iter().any(|t| t == "revision_cache"));
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_VERSION + 1).unwrap();
        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}

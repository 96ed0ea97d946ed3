//! Schema management. Unlike the Go-backed migration pipeline this crate
//! replaces, there's exactly one schema version — migrations are inlined
//! rather than read from external SQL files.

use rusqlite::Connection;

use crate::error::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS attestations (
    id          TEXT PRIMARY KEY,
    subjects    TEXT NOT NULL,
    predicates  TEXT NOT NULL,
    contexts    TEXT NOT NULL,
    actors      TEXT NOT NULL,
    timestamp   INTEGER NOT NULL,
    source      TEXT NOT NULL,
    attributes  TEXT,
    created_at  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_attestations_timestamp ON attestations(timestamp);
CREATE INDEX IF NOT EXISTS idx_attestations_created_at ON attestations(created_at);
";

/// Apply the schema to a fresh or existing connection. Idempotent.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .map_err(crate::error::SqliteError::Database)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
    }

    #[test]
    fn migrate_creates_attestations_table() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='attestations'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}

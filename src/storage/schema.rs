//! Database schema definitions
//!
//! Timestamps on `urls` are unix milliseconds so the reclaimer can compare
//! them numerically. Run timestamps are RFC 3339 text.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    total INTEGER,
    pending INTEGER,
    crawling INTEGER,
    success INTEGER,
    failed INTEGER
);

-- The crawl frontier: one row per normalized URL
CREATE TABLE IF NOT EXISTS urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    source_url TEXT,
    depth INTEGER NOT NULL CHECK (depth >= 0),
    state TEXT NOT NULL DEFAULT 'pending'
        CHECK (state IN ('pending', 'crawling', 'success', 'failed')),
    title TEXT,
    content_ref TEXT,
    error TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_urls_state ON urls(state);
CREATE INDEX IF NOT EXISTS idx_urls_depth ON urls(depth);
CREATE INDEX IF NOT EXISTS idx_urls_crawling_updated
    ON urls(updated_at) WHERE state = 'crawling';
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn count_objects(conn: &Connection, kind: &str, name: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_and_indexes_exist() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["runs", "urls"] {
            assert_eq!(count_objects(&conn, "table", table), 1, "table {}", table);
        }
        for index in [
            "idx_urls_state",
            "idx_urls_depth",
            "idx_urls_crawling_updated",
        ] {
            assert_eq!(count_objects(&conn, "index", index), 1, "index {}", index);
        }
    }

    #[test]
    fn test_unknown_state_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO urls (url, depth, state, created_at, updated_at)
             VALUES ('http://a/', 0, 'queued', 0, 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_url_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let insert = "INSERT INTO urls (url, depth, created_at, updated_at) VALUES ('http://a/', 0, 0, 0)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}

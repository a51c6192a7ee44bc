//! SQLite schema for the relational backend
//!
//! The hierarchy lives in two tables. `key` holds entries by
//! (parent prefix, leaf name). `prefix` holds (parent prefix, child prefix
//! name) rows so listing a prefix finds its sub-prefixes without scanning
//! the entries.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Sub-prefixes by parent prefix
        CREATE TABLE IF NOT EXISTS prefix (
            prefix TEXT NOT NULL,
            key TEXT NOT NULL,
            PRIMARY KEY (prefix, key)
        );

        -- Entries by parent prefix
        CREATE TABLE IF NOT EXISTS key (
            prefix TEXT NOT NULL,
            key TEXT NOT NULL,
            value BLOB,
            updated_at INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (prefix, key)
        );
        "#,
    )?;

    // key tables written before change tracking lack updated_at
    let has_updated_at: bool = conn
        .prepare("SELECT 1 FROM pragma_table_info('key') WHERE name = 'updated_at'")?
        .exists([])?;
    if !has_updated_at {
        conn.execute(
            "ALTER TABLE key ADD COLUMN updated_at INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
    }

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

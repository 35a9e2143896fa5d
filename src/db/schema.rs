use rusqlite::{Connection, OptionalExtension};

/// Current on-disk schema version, tracked in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 3;

const CREATE_TABLE: &str = r#"
CREATE TABLE summaries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    summary TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);
"#;

const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_summaries_url ON summaries(url);
CREATE INDEX IF NOT EXISTS idx_summaries_timestamp ON summaries(timestamp);
"#;

pub fn user_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Bring the database up to `SCHEMA_VERSION`.
///
/// A missing `summaries` table is created fresh. An existing one keeps its
/// rows and only gains whichever indexes it lacks.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;

    let table_exists = tx
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'summaries'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .is_some();

    if !table_exists {
        tracing::debug!("creating summaries table");
        tx.execute_batch(CREATE_TABLE)?;
    }

    tx.execute_batch(CREATE_INDEXES)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()
}

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{NewRecord, SummaryRecord};

use super::schema::{self, SCHEMA_VERSION};

const SELECT_COLUMNS: &str = "SELECT id, url, title, summary, timestamp FROM summaries";

/// Handle to the summary store.
///
/// Construction opens the database and runs the schema migration, so any
/// operation on a `Store` sees an up-to-date schema.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        let found = conn
            .call(|conn| Ok(schema::user_version(conn)?))
            .await?;

        if found > SCHEMA_VERSION {
            return Err(AppError::SchemaTooNew {
                found,
                supported: SCHEMA_VERSION,
            });
        }

        conn.call(|conn| {
            schema::migrate(conn)?;
            Ok(())
        })
        .await?;

        if found < SCHEMA_VERSION {
            tracing::info!("Summary store upgraded from v{} to v{}", found, SCHEMA_VERSION);
        }

        Ok(Self { conn })
    }

    pub async fn add(&self, record: NewRecord) -> Result<i64> {
        let timestamp = Utc::now().timestamp_millis();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO summaries (url, title, summary, timestamp) VALUES (?1, ?2, ?3, ?4)",
                    params![record.url, record.title, record.summary, timestamp],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        tracing::debug!("Stored summary {}", id);
        Ok(id)
    }

    /// All records, newest first.
    pub async fn get_all(&self) -> Result<Vec<SummaryRecord>> {
        let records = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY timestamp DESC, id DESC"))?;
                let records = stmt
                    .query_map([], record_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    pub async fn get_by_url(&self, url: &str) -> Result<Vec<SummaryRecord>> {
        let url = url.to_string();
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_COLUMNS} WHERE url = ?1 ORDER BY timestamp DESC, id DESC"
                ))?;
                let records = stmt
                    .query_map(params![url], record_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    pub async fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM summaries", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    /// Deleting an id that does not exist is not an error.
    pub async fn delete_by_id(&self, id: i64) -> Result<()> {
        let removed = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM summaries WHERE id = ?1", params![id])?))
            .await?;
        if removed == 0 {
            tracing::debug!("No summary with id {} to delete", id);
        }
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute("DELETE FROM summaries", [])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn drop_table_for_tests(&self) {
        self.conn
            .call(|conn| {
                conn.execute_batch("DROP TABLE summaries")?;
                Ok(())
            })
            .await
            .unwrap();
    }
}

fn record_from_row(row: &Row) -> rusqlite::Result<SummaryRecord> {
    Ok(SummaryRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
        timestamp: row.get(4)?,
    })
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One persisted summary. Records are never updated in place; a forced
/// reload produces a new record with its own id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub summary: String,
    /// Epoch milliseconds, stamped by the store at insert time.
    pub timestamp: i64,
}

impl SummaryRecord {
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }

    /// Calendar day (UTC) the record was created on.
    pub fn day(&self) -> NaiveDate {
        self.created_at().date_naive()
    }
}

#[derive(Debug, Clone)]
pub struct NewRecord {
    pub url: String,
    pub title: String,
    pub summary: String,
}

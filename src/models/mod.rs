mod summary;

pub use summary::{NewRecord, SummaryRecord};

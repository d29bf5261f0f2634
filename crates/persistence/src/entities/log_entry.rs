//! Log entry entity (database row mapping).

use sqlx::FromRow;

use domain::models::log_entry::{LogEntry, Severity};

/// Database row mapping for the log_entries table.
#[derive(Debug, Clone, FromRow)]
pub struct LogEntryEntity {
    pub id: i64,
    pub timestamp: i64,
    pub message: String,
    pub severity: i64,
}

impl From<LogEntryEntity> for LogEntry {
    fn from(entity: LogEntryEntity) -> Self {
        Self {
            id: entity.id,
            timestamp: entity.timestamp,
            message: entity.message,
            severity: Severity::from_i64(entity.severity),
        }
    }
}

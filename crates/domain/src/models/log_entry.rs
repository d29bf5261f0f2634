//! Diagnostic log entry domain model.
//!
//! Log entries are the user-visible trail of what the pipeline did. They are
//! append-only and can only be cleared in bulk.

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Converts to database integer representation.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Debug => 0,
            Self::Info => 1,
            Self::Warning => 2,
            Self::Error => 3,
        }
    }

    /// Parses from database integer representation. Unknown levels read as errors.
    pub fn from_i64(value: i64) -> Self {
        match value {
            0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Warning,
            _ => Self::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single diagnostic log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: i64,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub message: String,
    pub severity: Severity,
}

/// Maximum page size when listing log entries.
pub const MAX_LOG_PAGE_SIZE: i64 = 500;

fn default_log_limit() -> i64 {
    100
}

/// Query parameters for listing log entries, newest first.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLogEntriesQuery {
    #[serde(default = "default_log_limit")]
    pub limit: i64,
    /// Only return entries with an id lower than this one.
    pub before_id: Option<i64>,
}

impl ListLogEntriesQuery {
    /// Page size clamped to 1..=MAX_LOG_PAGE_SIZE.
    pub fn effective_limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LOG_PAGE_SIZE)
    }
}

/// Response for listing log entries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLogEntriesResponse {
    pub entries: Vec<LogEntry>,
    pub total: i64,
    /// Pass as `beforeId` to fetch the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_before_id: Option<i64>,
}

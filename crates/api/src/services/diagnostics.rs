//! User-visible diagnostic log.
//!
//! Every entry is persisted as a LogEntry row and mirrored into `tracing` at
//! the matching level. Recording never fails the caller: a write error is
//! reported through `tracing` only.

use domain::models::log_entry::{
    ListLogEntriesQuery, ListLogEntriesResponse, LogEntry, Severity,
};
use persistence::repositories::LogEntryRepository;
use shared::time::now_millis;

use super::ServiceError;

#[derive(Clone)]
pub struct DiagnosticLog {
    repo: LogEntryRepository,
}

impl DiagnosticLog {
    pub fn new(repo: LogEntryRepository) -> Self {
        Self { repo }
    }

    /// Append an entry and mirror it into `tracing`.
    pub async fn record(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();

        match severity {
            Severity::Debug => tracing::debug!(target: "diagnostics", "{}", message),
            Severity::Info => tracing::info!(target: "diagnostics", "{}", message),
            Severity::Warning => tracing::warn!(target: "diagnostics", "{}", message),
            Severity::Error => tracing::error!(target: "diagnostics", "{}", message),
        }

        metrics::counter!("diagnostic_log_entries_total", "severity" => severity.as_str())
            .increment(1);

        if let Err(e) = self
            .repo
            .append(now_millis(), &message, severity.as_i64())
            .await
        {
            tracing::error!(error = %e, "Failed to persist diagnostic log entry");
        }
    }

    pub async fn debug(&self, message: impl Into<String>) {
        self.record(Severity::Debug, message).await
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.record(Severity::Info, message).await
    }

    pub async fn warning(&self, message: impl Into<String>) {
        self.record(Severity::Warning, message).await
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.record(Severity::Error, message).await
    }

    /// One page of entries, newest first.
    pub async fn list(
        &self,
        query: &ListLogEntriesQuery,
    ) -> Result<ListLogEntriesResponse, ServiceError> {
        let limit = query.effective_limit();
        let rows = self.repo.list(limit, query.before_id).await?;
        let total = self.repo.count().await?;

        let entries: Vec<LogEntry> = rows.into_iter().map(Into::into).collect();
        let next_before_id = if entries.len() as i64 == limit {
            entries.last().map(|e| e.id)
        } else {
            None
        };

        Ok(ListLogEntriesResponse {
            entries,
            total,
            next_before_id,
        })
    }

    /// Delete every entry.
    pub async fn clear(&self) -> Result<u64, ServiceError> {
        let removed = self.repo.clear().await?;
        tracing::info!(removed, "Diagnostic log cleared");
        Ok(removed)
    }
}

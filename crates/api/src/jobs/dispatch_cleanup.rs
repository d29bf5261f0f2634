//! Purges finished rows from the deferred-dispatch queue.

use shared::time::now_millis;
use tracing::info;

use crate::services::DispatchService;

use super::scheduler::{Job, JobFrequency};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Deletes delivered, skipped and failed dispatches older than the retention period.
pub struct DispatchCleanupJob {
    dispatch: DispatchService,
    retention_days: i64,
    interval_secs: u64,
}

impl DispatchCleanupJob {
    pub fn new(dispatch: DispatchService, retention_days: i64, interval_secs: u64) -> Self {
        Self {
            dispatch,
            retention_days: retention_days.max(0),
            interval_secs,
        }
    }

    /// Rows last updated before this instant are purged.
    fn cutoff(&self, now: i64) -> i64 {
        now - self.retention_days.saturating_mul(MILLIS_PER_DAY)
    }
}

#[async_trait::async_trait]
impl Job for DispatchCleanupJob {
    fn name(&self) -> &'static str {
        "dispatch_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let deleted = self
            .dispatch
            .purge_finished(self.cutoff(now_millis()))
            .await
            .map_err(|e| format!("Failed to purge finished dispatches: {}", e))?;

        if deleted > 0 {
            info!(
                deleted,
                retention_days = self.retention_days,
                "Purged finished dispatches"
            );
        }
        Ok(())
    }
}

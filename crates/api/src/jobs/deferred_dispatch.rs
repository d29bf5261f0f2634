//! Delivers scheduled reminders once they are due.

use shared::time::now_millis;

use crate::services::DispatchService;

use super::scheduler::{Job, JobFrequency};

pub struct DeferredDispatchJob {
    dispatch: DispatchService,
    poll_interval_secs: u64,
}

impl DeferredDispatchJob {
    pub fn new(dispatch: DispatchService, poll_interval_secs: u64) -> Self {
        Self {
            dispatch,
            poll_interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for DeferredDispatchJob {
    fn name(&self) -> &'static str {
        "deferred_dispatch"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.poll_interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        // Claimed rows leave the due set, so draining full batches terminates.
        loop {
            let report = self.dispatch.deliver_due(now_millis()).await;
            if (report.claimed as i64) < self.dispatch.batch_size() {
                return Ok(());
            }
        }
    }
}

//! Pending dispatch entity definitions.
//!
//! Maps to the pending_dispatches table, the durable queue of delayed
//! notifications.

use sqlx::FromRow;

use domain::models::dispatch::DispatchPayload;
use domain::models::geofication::PostTriggerAction;

/// Database entity for pending_dispatches table.
#[derive(Debug, Clone, FromRow)]
pub struct PendingDispatchEntity {
    pub id: i64,
    pub job_id: String,
    pub geofence_id: i64,
    pub geofication_id: i64,
    pub post_trigger_action: i64,
    /// JSON-encoded [`DispatchPayload`].
    pub payload: String,
    pub due_at: i64,
    pub status: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PendingDispatchEntity {
    /// Decodes the persisted payload snapshot.
    pub fn payload(&self) -> Result<DispatchPayload, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }

    /// Post-trigger action recorded when the rule fired.
    pub fn action(&self) -> PostTriggerAction {
        PostTriggerAction::from_i64(self.post_trigger_action).unwrap_or_default()
    }

    pub fn is_finished(&self) -> bool {
        FINISHED_STATUSES.contains(&self.status.as_str())
    }
}

/// Dispatch status values.
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_DELIVERED: &str = "delivered";
pub const STATUS_SKIPPED: &str = "skipped";
pub const STATUS_FAILED: &str = "failed";

/// Statuses that are never picked up again.
pub const FINISHED_STATUSES: [&str; 3] = [STATUS_DELIVERED, STATUS_SKIPPED, STATUS_FAILED];

/// Default maximum number of delivery attempts.
pub const MAX_DELIVERY_ATTEMPTS: i64 = 4;

/// Backoff intervals in seconds after each failed attempt.
/// Attempt 1: 30s, Attempt 2: 120s, Attempt 3: 600s
pub const RETRY_BACKOFF_SECONDS: [i64; 3] = [30, 120, 600];

/// Backoff before the next attempt, given the attempts made so far.
pub fn retry_backoff_millis(attempts: i64) -> i64 {
    let index = (attempts.max(1) - 1).min(RETRY_BACKOFF_SECONDS.len() as i64 - 1) as usize;
    RETRY_BACKOFF_SECONDS[index] * 1000
}

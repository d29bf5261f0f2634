//! Dispatch service.
//!
//! Delivers fired reminders. A zero delay goes straight to the dispatcher;
//! anything else becomes a durable `pending_dispatches` row that the
//! deferred-dispatch job delivers once it is due. Queued payloads are
//! re-checked against the store at fire time.

use std::sync::Arc;

use domain::models::dispatch::DispatchPayload;
use domain::models::geofication::PostTriggerAction;
use domain::services::{DispatchResult, NotificationDispatcher};
use persistence::entities::pending_dispatch::{retry_backoff_millis, PendingDispatchEntity};
use persistence::repositories::{
    GeofenceRepository, GeoficationRepository, NewPendingDispatch, PendingDispatchRepository,
};
use serde::Serialize;
use shared::time::minutes_to_millis;
use uuid::Uuid;

use super::{DiagnosticLog, ServiceError};
use crate::config::DispatchConfig;

/// Queue tuning used at delivery time.
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub batch_size: i64,
    pub max_attempts: i64,
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_attempts: config.max_attempts,
        }
    }
}

/// What `schedule` did with a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Delivered immediately.
    Dispatched(DispatchResult),
    /// Stored for later delivery.
    Queued { job_id: String, due_at: i64 },
    /// Could not be stored; already logged.
    Dropped,
}

/// Tally of one deferred-delivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub claimed: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub retried: usize,
    pub failed: usize,
}

enum Delivery {
    Delivered,
    Skipped,
    Retried,
    Failed,
}

#[derive(Clone)]
pub struct DispatchService {
    dispatcher: Arc<dyn NotificationDispatcher>,
    queue: PendingDispatchRepository,
    geofences: GeofenceRepository,
    geofications: GeoficationRepository,
    log: DiagnosticLog,
    settings: DispatchSettings,
}

impl DispatchService {
    pub fn new(
        dispatcher: Arc<dyn NotificationDispatcher>,
        queue: PendingDispatchRepository,
        geofences: GeofenceRepository,
        geofications: GeoficationRepository,
        log: DiagnosticLog,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            dispatcher,
            queue,
            geofences,
            geofications,
            log,
            settings,
        }
    }

    /// Maximum rows claimed per delivery pass.
    pub fn batch_size(&self) -> i64 {
        self.settings.batch_size
    }

    /// Dispatch now when `delay_minutes` is zero, otherwise enqueue the
    /// payload due `delay_minutes` after the trigger time.
    pub async fn schedule(
        &self,
        payload: &DispatchPayload,
        delay_minutes: i64,
        action: PostTriggerAction,
    ) -> ScheduleOutcome {
        if delay_minutes <= 0 {
            let result = self.deliver_now(payload).await;
            if let DispatchResult::Failed(_) = result {
                // The failed delivery counts as the first attempt.
                let due_at = payload.triggered_at + retry_backoff_millis(1);
                self.enqueue(payload, action, due_at, 1).await;
            }
            return ScheduleOutcome::Dispatched(result);
        }

        let due_at = payload.triggered_at + minutes_to_millis(delay_minutes);
        match self.enqueue(payload, action, due_at, 0).await {
            Some(job_id) => {
                self.log
                    .info(format!(
                        "Scheduled reminder for geofication {} in {} minute(s)",
                        payload.geofication.id, delay_minutes
                    ))
                    .await;
                ScheduleOutcome::Queued { job_id, due_at }
            }
            None => ScheduleOutcome::Dropped,
        }
    }

    /// Hand a payload to the dispatcher and log the result.
    pub async fn deliver_now(&self, payload: &DispatchPayload) -> DispatchResult {
        let result = self.dispatcher.dispatch(payload).await;
        metrics::counter!("dispatches_total", "result" => result.as_str()).increment(1);

        let geofication_id = payload.geofication.id;
        match &result {
            DispatchResult::Notified => {
                self.log
                    .info(format!("Notified for geofication {}", geofication_id))
                    .await
            }
            DispatchResult::AlarmRaised => {
                self.log
                    .info(format!("Raised alarm for geofication {}", geofication_id))
                    .await
            }
            DispatchResult::PermissionMissing => {
                self.log
                    .warning(format!(
                        "Notification permission missing, reminder for geofication {} not shown",
                        geofication_id
                    ))
                    .await
            }
            DispatchResult::Failed(e) => {
                self.log
                    .error(format!(
                        "Failed to dispatch reminder for geofication {}: {}",
                        geofication_id, e
                    ))
                    .await
            }
        }

        result
    }

    /// Claim every due row and deliver it.
    pub async fn deliver_due(&self, now: i64) -> DeliveryReport {
        let claimed = match self.queue.claim_due(now, self.settings.batch_size).await {
            Ok(rows) => rows,
            Err(e) => {
                self.log
                    .error(format!("Failed to claim scheduled reminders: {}", e))
                    .await;
                return DeliveryReport::default();
            }
        };

        let mut report = DeliveryReport {
            claimed: claimed.len(),
            ..Default::default()
        };

        for row in &claimed {
            match self.deliver_claimed(row, now).await {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Skipped => report.skipped += 1,
                Delivery::Retried => report.retried += 1,
                Delivery::Failed => report.failed += 1,
            }
        }

        if report.claimed > 0 {
            tracing::info!(
                claimed = report.claimed,
                delivered = report.delivered,
                skipped = report.skipped,
                retried = report.retried,
                failed = report.failed,
                "Deferred delivery pass complete"
            );
        }
        report
    }

    /// Return rows left `running` by a previous process to the queue.
    pub async fn recover(&self, now: i64) -> u64 {
        match self.queue.requeue_running(now).await {
            Ok(0) => 0,
            Ok(requeued) => {
                self.log
                    .info(format!(
                        "Requeued {} interrupted scheduled reminder(s)",
                        requeued
                    ))
                    .await;
                requeued
            }
            Err(e) => {
                self.log
                    .error(format!("Failed to requeue interrupted reminders: {}", e))
                    .await;
                0
            }
        }
    }

    /// Delete finished rows last updated before `cutoff`.
    pub async fn purge_finished(&self, cutoff: i64) -> Result<u64, ServiceError> {
        Ok(self.queue.delete_finished_before(cutoff).await?)
    }

    async fn enqueue(
        &self,
        payload: &DispatchPayload,
        action: PostTriggerAction,
        due_at: i64,
        attempts: i64,
    ) -> Option<String> {
        let json = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                self.log
                    .error(format!(
                        "Failed to serialize reminder for geofication {}: {}",
                        payload.geofication.id, e
                    ))
                    .await;
                return None;
            }
        };

        let job_id = Uuid::new_v4().to_string();
        let input = NewPendingDispatch {
            job_id: &job_id,
            geofence_id: payload.geofence.id,
            geofication_id: payload.geofication.id,
            post_trigger_action: action.as_i64(),
            payload: &json,
            due_at,
            attempts,
        };

        match self.queue.enqueue(&input, payload.triggered_at).await {
            Ok(row) => {
                tracing::debug!(job_id = %row.job_id, due_at = row.due_at, "Reminder queued");
                Some(job_id)
            }
            Err(e) => {
                self.log
                    .error(format!(
                        "Failed to queue reminder for geofication {}: {}",
                        payload.geofication.id, e
                    ))
                    .await;
                None
            }
        }
    }

    async fn deliver_claimed(&self, row: &PendingDispatchEntity, now: i64) -> Delivery {
        let payload = match row.payload() {
            Ok(payload) => payload,
            Err(e) => {
                let reason = format!("undecodable payload: {}", e);
                self.finish_failed(row, &reason, now).await;
                return Delivery::Failed;
            }
        };

        match self.recheck(row).await {
            Ok(None) => {}
            Ok(Some(reason)) => {
                if let Err(e) = self.queue.mark_skipped(row.id, &reason, now).await {
                    tracing::error!(job_id = %row.job_id, error = %e, "Failed to mark dispatch skipped");
                }
                metrics::counter!("dispatches_total", "result" => "skipped").increment(1);
                self.log
                    .info(format!(
                        "Skipped scheduled reminder for geofication {}: {}",
                        row.geofication_id, reason
                    ))
                    .await;
                return Delivery::Skipped;
            }
            Err(e) => {
                return self.retry_or_fail(row, &format!("re-check failed: {}", e), now).await;
            }
        }

        match self.deliver_now(&payload).await {
            DispatchResult::Notified | DispatchResult::AlarmRaised => {
                if let Err(e) = self.queue.mark_delivered(row.id, now).await {
                    tracing::error!(job_id = %row.job_id, error = %e, "Failed to mark dispatch delivered");
                }
                Delivery::Delivered
            }
            DispatchResult::PermissionMissing => {
                self.finish_failed(row, "notification permission missing", now)
                    .await;
                Delivery::Failed
            }
            DispatchResult::Failed(e) => self.retry_or_fail(row, &e, now).await,
        }
    }

    /// Returns the reason a queued payload must not be shown, if any.
    async fn recheck(&self, row: &PendingDispatchEntity) -> Result<Option<String>, sqlx::Error> {
        let action = row.action();
        // The trigger itself deleted the targets; the snapshot stands alone.
        if action == PostTriggerAction::DeleteGeofence {
            return Ok(None);
        }

        if self.geofences.find_by_id(row.geofence_id).await?.is_none() {
            return Ok(Some(format!("geofence {} no longer exists", row.geofence_id)));
        }

        let geofication = match self.geofications.find_by_id(row.geofication_id).await? {
            Some(g) => g,
            None => {
                return Ok(Some(format!(
                    "geofication {} no longer exists",
                    row.geofication_id
                )))
            }
        };

        if geofication.geofence_id != row.geofence_id {
            return Ok(Some(format!(
                "geofication {} no longer belongs to geofence {}",
                row.geofication_id, row.geofence_id
            )));
        }

        if action == PostTriggerAction::StayActive && !geofication.active {
            return Ok(Some(format!(
                "geofication {} was disabled",
                row.geofication_id
            )));
        }

        Ok(None)
    }

    async fn retry_or_fail(&self, row: &PendingDispatchEntity, error: &str, now: i64) -> Delivery {
        if row.attempts >= self.settings.max_attempts {
            self.finish_failed(row, error, now).await;
            return Delivery::Failed;
        }

        let next_due_at = now + retry_backoff_millis(row.attempts);
        match self.queue.reschedule(row.id, error, next_due_at, now).await {
            Ok(_) => {
                tracing::warn!(
                    job_id = %row.job_id,
                    attempts = row.attempts,
                    next_due_at,
                    error,
                    "Scheduled reminder will be retried"
                );
                Delivery::Retried
            }
            Err(e) => {
                tracing::error!(job_id = %row.job_id, error = %e, "Failed to reschedule dispatch");
                Delivery::Failed
            }
        }
    }

    async fn finish_failed(&self, row: &PendingDispatchEntity, error: &str, now: i64) {
        if let Err(e) = self.queue.mark_failed(row.id, error, now).await {
            tracing::error!(job_id = %row.job_id, error = %e, "Failed to mark dispatch failed");
        }
        self.log
            .error(format!(
                "Gave up on scheduled reminder for geofication {} after {} attempt(s): {}",
                row.geofication_id, row.attempts, error
            ))
            .await;
    }
}

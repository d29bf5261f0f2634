//! Notification/alarm dispatcher boundary.
//!
//! The pipeline hands a by-value [`DispatchPayload`] to a dispatcher, which
//! turns it into exactly one standard notification or full-screen alarm.

use std::sync::{Arc, Mutex};

use crate::models::dispatch::DispatchPayload;

/// Result of a dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// A standard notification was posted.
    Notified,
    /// A full-screen alarm was raised.
    AlarmRaised,
    /// Notification permission is missing. The permission is requested
    /// opportunistically; this dispatch is not retried.
    PermissionMissing,
    /// Delivery failed (retryable).
    Failed(String),
}

impl DispatchResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notified => "notified",
            Self::AlarmRaised => "alarm_raised",
            Self::PermissionMissing => "permission_missing",
            Self::Failed(_) => "failed",
        }
    }
}

/// Dispatcher trait for user-visible notifications and alarms.
#[async_trait::async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Present the payload to the user.
    async fn dispatch(&self, payload: &DispatchPayload) -> DispatchResult;
}

/// Dispatcher that renders the payload into structured logs.
///
/// Used by the daemon when no presentation bridge is attached.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotificationDispatcher;

impl LoggingNotificationDispatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl NotificationDispatcher for LoggingNotificationDispatcher {
    async fn dispatch(&self, payload: &DispatchPayload) -> DispatchResult {
        let content = payload.render();
        let triggered_at = shared::time::to_datetime(payload.triggered_at)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();

        tracing::info!(
            geofence_id = payload.geofence.id,
            geofication_id = payload.geofication.id,
            transition = %payload.transition,
            triggered_at = %triggered_at,
            title = %content.title,
            body = %content.body,
            alarm = content.alarm,
            actions = content.actions.len(),
            "Dispatching reminder"
        );

        if content.alarm {
            DispatchResult::AlarmRaised
        } else {
            DispatchResult::Notified
        }
    }
}

/// How the mock dispatcher responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockBehavior {
    #[default]
    Deliver,
    Fail,
    NoPermission,
}

/// Mock dispatcher for development and testing.
///
/// Records every payload it receives.
#[derive(Debug, Clone, Default)]
pub struct MockNotificationDispatcher {
    behavior: MockBehavior,
    dispatched: Arc<Mutex<Vec<DispatchPayload>>>,
}

impl MockNotificationDispatcher {
    /// Create a dispatcher that delivers everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher that simulates delivery failures.
    pub fn failing() -> Self {
        Self {
            behavior: MockBehavior::Fail,
            ..Self::default()
        }
    }

    /// Create a dispatcher that simulates missing notification permission.
    pub fn without_permission() -> Self {
        Self {
            behavior: MockBehavior::NoPermission,
            ..Self::default()
        }
    }

    /// Payloads received so far, in arrival order.
    pub fn dispatched(&self) -> Vec<DispatchPayload> {
        self.dispatched
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Number of payloads received so far.
    pub fn count(&self) -> usize {
        self.dispatched.lock().map(|d| d.len()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl NotificationDispatcher for MockNotificationDispatcher {
    async fn dispatch(&self, payload: &DispatchPayload) -> DispatchResult {
        if let Ok(mut dispatched) = self.dispatched.lock() {
            dispatched.push(payload.clone());
        }

        match self.behavior {
            MockBehavior::Fail => {
                tracing::warn!(
                    geofication_id = payload.geofication.id,
                    "Mock dispatcher simulating failure"
                );
                DispatchResult::Failed("Simulated failure".to_string())
            }
            MockBehavior::NoPermission => DispatchResult::PermissionMissing,
            MockBehavior::Deliver if payload.geofication.is_alarm => DispatchResult::AlarmRaised,
            MockBehavior::Deliver => DispatchResult::Notified,
        }
    }
}

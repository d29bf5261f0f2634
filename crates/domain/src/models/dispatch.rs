//! Dispatch payloads.
//!
//! A dispatch payload is a by-value snapshot of the geofence and rule at the
//! moment a rule fired. It is self-contained so it can be persisted in the
//! deferred-dispatch queue and rendered after a process restart.

use serde::{Deserialize, Serialize};

use super::geofence::{FenceColor, Geofence};
use super::geofication::{DirectionFlags, Geofication, PostTriggerAction};
use super::transition::TransitionType;

/// Current payload layout version.
pub const DISPATCH_PAYLOAD_VERSION: u32 = 1;

/// Geofence fields captured at trigger time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceSnapshot {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub color: FenceColor,
}

impl From<&Geofence> for GeofenceSnapshot {
    fn from(g: &Geofence) -> Self {
        Self {
            id: g.id,
            name: g.name.clone(),
            latitude: g.latitude,
            longitude: g.longitude,
            radius_meters: g.radius_meters,
            color: g.color,
        }
    }
}

/// Geofication fields captured at trigger time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoficationSnapshot {
    pub id: i64,
    pub geofence_id: i64,
    pub message: String,
    pub flags: DirectionFlags,
    pub delay_minutes: i64,
    pub on_trigger: PostTriggerAction,
    pub link: Option<String>,
    pub is_alarm: bool,
}

impl From<&Geofication> for GeoficationSnapshot {
    fn from(g: &Geofication) -> Self {
        Self {
            id: g.id,
            geofence_id: g.geofence_id,
            message: g.message.clone(),
            flags: g.flags,
            delay_minutes: g.delay_minutes,
            on_trigger: g.on_trigger,
            link: g.link.clone(),
            is_alarm: g.is_alarm,
        }
    }
}

/// Everything the dispatcher needs to notify about one fired rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPayload {
    pub version: u32,
    pub geofence: GeofenceSnapshot,
    pub geofication: GeoficationSnapshot,
    pub transition: TransitionType,
    /// Epoch milliseconds of the transition that fired the rule.
    pub triggered_at: i64,
}

impl DispatchPayload {
    /// Captures snapshots of a geofence and one of its rules.
    pub fn capture(
        geofence: &Geofence,
        geofication: &Geofication,
        transition: TransitionType,
        triggered_at: i64,
    ) -> Self {
        Self {
            version: DISPATCH_PAYLOAD_VERSION,
            geofence: geofence.into(),
            geofication: geofication.into(),
            transition,
            triggered_at,
        }
    }

    /// Builds the user-visible content for this payload.
    pub fn render(&self) -> NotificationContent {
        let verb = match self.transition {
            TransitionType::Enter => "Entered",
            TransitionType::Exit => "Left",
        };
        let title = format!("{} {}", verb, self.geofence.name);
        let link = self.geofication.link.clone().filter(|l| !l.trim().is_empty());

        let mut actions = if self.geofication.is_alarm {
            vec![NotificationAction::Dismiss]
        } else {
            vec![
                NotificationAction::DisableGeofication {
                    geofication_id: self.geofication.id,
                },
                NotificationAction::DeleteGeofence {
                    geofence_id: self.geofence.id,
                },
            ]
        };
        if let Some(url) = link {
            actions.push(NotificationAction::OpenLink { url });
        }

        NotificationContent {
            title,
            body: self.geofication.message.clone(),
            alarm: self.geofication.is_alarm,
            actions,
        }
    }
}

/// Rendered notification or alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    /// Full-screen alarm (ringtone, vibration, screen wake) instead of a notification.
    pub alarm: bool,
    pub actions: Vec<NotificationAction>,
}

/// Buttons offered with a notification; the first two route back into the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationAction {
    DisableGeofication { geofication_id: i64 },
    DeleteGeofence { geofence_id: i64 },
    OpenLink { url: String },
    Dismiss,
}

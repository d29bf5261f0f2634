//! Geofication domain model.
//!
//! A geofication is a notification rule bound to exactly one geofence. It
//! fires when the device crosses the region in one of its configured
//! directions and then applies its post-trigger action.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::transition::TransitionType;

/// Represents a notification rule attached to a geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofication {
    pub id: i64,
    pub geofence_id: i64,
    pub message: String,
    pub flags: DirectionFlags,
    pub delay_minutes: i64,
    pub repeat: bool,
    pub active: bool,
    pub on_trigger: PostTriggerAction,
    pub link: Option<String>,
    pub is_alarm: bool,
    pub trigger_count: i64,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub last_edit: i64,
}

/// Transition directions a rule listens to. Encoded as the bitmask 1, 2 or 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum DirectionFlags {
    Enter,
    Exit,
    Both,
}

impl DirectionFlags {
    /// Bitmask value as persisted.
    pub fn bits(&self) -> i64 {
        match self {
            Self::Enter => 1,
            Self::Exit => 2,
            Self::Both => 3,
        }
    }

    /// Parses a persisted bitmask. Only 1, 2 and 3 are valid.
    pub fn from_bits(bits: i64) -> Option<Self> {
        match bits {
            1 => Some(Self::Enter),
            2 => Some(Self::Exit),
            3 => Some(Self::Both),
            _ => None,
        }
    }

    /// Whether a rule with these flags listens to `transition`.
    pub fn matches(&self, transition: TransitionType) -> bool {
        let bits = self.bits();
        bits == transition.bit() || bits == Self::Both.bits()
    }
}

impl TryFrom<i64> for DirectionFlags {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_bits(value).ok_or_else(|| format!("invalid direction flags {}", value))
    }
}

impl From<DirectionFlags> for i64 {
    fn from(flags: DirectionFlags) -> Self {
        flags.bits()
    }
}

/// What happens to a rule after it fires. Encoded as 0, 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum PostTriggerAction {
    /// The rule stays active and fires again on the next qualifying crossing.
    #[default]
    StayActive,
    /// The rule deactivates itself; the geofence is left untouched.
    Deactivate,
    /// The owning geofence is deleted together with all of its rules.
    DeleteGeofence,
}

impl PostTriggerAction {
    /// Converts to database integer representation.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::StayActive => 0,
            Self::Deactivate => 1,
            Self::DeleteGeofence => 2,
        }
    }

    /// Parses from database integer representation.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::StayActive),
            1 => Some(Self::Deactivate),
            2 => Some(Self::DeleteGeofence),
            _ => None,
        }
    }

    /// Converts to string representation for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StayActive => "stay_active",
            Self::Deactivate => "deactivate",
            Self::DeleteGeofence => "delete_geofence",
        }
    }
}

impl std::fmt::Display for PostTriggerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i64> for PostTriggerAction {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_i64(value).ok_or_else(|| format!("invalid post-trigger action {}", value))
    }
}

impl From<PostTriggerAction> for i64 {
    fn from(action: PostTriggerAction) -> Self {
        action.as_i64()
    }
}

/// Default active status for new rules.
fn default_active() -> bool {
    true
}

/// Request payload for creating a geofication.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGeoficationRequest {
    #[validate(length(min = 1, max = 500, message = "Message must be 1-500 characters"))]
    pub message: String,

    pub flags: DirectionFlags,

    #[serde(default)]
    #[validate(range(min = 0, max = 60, message = "Delay must be between 0 and 60 minutes"))]
    pub delay_minutes: i64,

    #[serde(default)]
    pub repeat: bool,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    pub on_trigger: PostTriggerAction,

    #[validate(length(max = 2048, message = "Link must be at most 2048 characters"))]
    pub link: Option<String>,

    #[serde(default)]
    pub is_alarm: bool,
}

/// Request payload for updating a geofication (partial update).
///
/// An empty `link` clears the stored link.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGeoficationRequest {
    #[validate(length(min = 1, max = 500, message = "Message must be 1-500 characters"))]
    pub message: Option<String>,

    pub flags: Option<DirectionFlags>,

    #[validate(range(min = 0, max = 60, message = "Delay must be between 0 and 60 minutes"))]
    pub delay_minutes: Option<i64>,

    pub repeat: Option<bool>,

    pub on_trigger: Option<PostTriggerAction>,

    #[validate(length(max = 2048, message = "Link must be at most 2048 characters"))]
    pub link: Option<String>,

    pub is_alarm: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_flags_bits() {
        assert_eq!(DirectionFlags::Enter.bits(), 1);
        assert_eq!(DirectionFlags::Exit.bits(), 2);
        assert_eq!(DirectionFlags::Both.bits(), 3);
        assert_eq!(DirectionFlags::from_bits(0), None);
        assert_eq!(DirectionFlags::from_bits(4), None);
    }

    #[test]
    fn test_direction_flags_matches() {
        assert!(DirectionFlags::Enter.matches(TransitionType::Enter));
        assert!(!DirectionFlags::Enter.matches(TransitionType::Exit));
        assert!(DirectionFlags::Exit.matches(TransitionType::Exit));
        assert!(!DirectionFlags::Exit.matches(TransitionType::Enter));
        assert!(DirectionFlags::Both.matches(TransitionType::Enter));
        assert!(DirectionFlags::Both.matches(TransitionType::Exit));
    }

    #[test]
    fn test_direction_flags_serde_as_integer() {
        assert_eq!(serde_json::to_string(&DirectionFlags::Both).unwrap(), "3");
        let flags: DirectionFlags = serde_json::from_str("2").unwrap();
        assert_eq!(flags, DirectionFlags::Exit);
        assert!(serde_json::from_str::<DirectionFlags>("5").is_err());
    }

    #[test]
    fn test_post_trigger_action_codes() {
        assert_eq!(PostTriggerAction::from_i64(0), Some(PostTriggerAction::StayActive));
        assert_eq!(PostTriggerAction::from_i64(1), Some(PostTriggerAction::Deactivate));
        assert_eq!(
            PostTriggerAction::from_i64(2),
            Some(PostTriggerAction::DeleteGeofence)
        );
        assert_eq!(PostTriggerAction::from_i64(3), None);
        assert_eq!(PostTriggerAction::DeleteGeofence.to_string(), "delete_geofence");
    }

    #[test]
    fn test_create_geofication_request_defaults() {
        let json = r#"{"message": "Buy milk", "flags": 1}"#;
        let request: CreateGeoficationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.flags, DirectionFlags::Enter);
        assert_eq!(request.delay_minutes, 0);
        assert!(request.active);
        assert!(!request.repeat);
        assert!(!request.is_alarm);
        assert_eq!(request.on_trigger, PostTriggerAction::StayActive);
        assert!(request.link.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_geofication_request_rejects_invalid_flags() {
        let json = r#"{"message": "Buy milk", "flags": 0}"#;
        assert!(serde_json::from_str::<CreateGeoficationRequest>(json).is_err());

        let json = r#"{"message": "Buy milk", "flags": 1, "onTrigger": 7}"#;
        assert!(serde_json::from_str::<CreateGeoficationRequest>(json).is_err());
    }

    #[test]
    fn test_create_geofication_request_delay_bounds() {
        let json = r#"{"message": "Later", "flags": 3, "delayMinutes": 61}"#;
        let request: CreateGeoficationRequest = serde_json::from_str(json).unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("delay_minutes"));
    }

    #[test]
    fn test_update_geofication_request_partial() {
        let json = r#"{"delayMinutes": 15, "onTrigger": 1}"#;
        let request: UpdateGeoficationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.delay_minutes, Some(15));
        assert_eq!(request.on_trigger, Some(PostTriggerAction::Deactivate));
        assert!(request.message.is_none());
        assert!(request.validate().is_ok());
    }
}

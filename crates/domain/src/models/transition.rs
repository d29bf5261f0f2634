//! Region transition models.
//!
//! A transition is what the platform geofencing engine reports when the
//! device crosses the boundary of a monitored region.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Platform code for an enter transition.
pub const PLATFORM_TRANSITION_ENTER: i64 = 1;
/// Platform code for an exit transition.
pub const PLATFORM_TRANSITION_EXIT: i64 = 2;

/// Direction of a region crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    Enter,
    Exit,
}

impl TransitionType {
    /// Bit this transition occupies in a direction bitmask.
    pub fn bit(&self) -> i64 {
        match self {
            Self::Enter => 1,
            Self::Exit => 2,
        }
    }

    /// Converts to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Exit => "exit",
        }
    }

    /// Parses from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "enter" => Some(Self::Enter),
            "exit" => Some(Self::Exit),
            _ => None,
        }
    }

    /// Maps a platform transition code. Dwell (4) and unknown codes are rejected.
    pub fn from_platform_code(code: i64) -> Option<Self> {
        match code {
            PLATFORM_TRANSITION_ENTER => Some(Self::Enter),
            PLATFORM_TRANSITION_EXIT => Some(Self::Exit),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Accepts either `"enter"`/`"exit"` or the platform codes 1/2.
impl<'de> Deserialize<'de> for TransitionType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(i64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Self::from_platform_code(code).ok_or_else(|| {
                serde::de::Error::custom(format!("unsupported transition code {}", code))
            }),
            Raw::Name(name) => Self::parse(&name).ok_or_else(|| {
                serde::de::Error::custom(format!("unsupported transition '{}'", name))
            }),
        }
    }
}

/// Error parsing a platform request id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestIdError {
    #[error("Request id is empty")]
    Empty,

    #[error("Request id '{0}' is not a number")]
    NotNumeric(String),

    #[error("Request id '{0}' is not a positive geofence id")]
    NotPositive(String),
}

/// Parses a platform request id into a geofence primary key.
pub fn parse_request_id(request_id: &str) -> Result<i64, RequestIdError> {
    let trimmed = request_id.trim();
    if trimmed.is_empty() {
        return Err(RequestIdError::Empty);
    }

    let id: i64 = trimmed
        .parse()
        .map_err(|_| RequestIdError::NotNumeric(trimmed.to_string()))?;

    if id <= 0 {
        return Err(RequestIdError::NotPositive(trimmed.to_string()));
    }

    Ok(id)
}

/// Inbound transition event as delivered by the platform bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub request_id: String,
    pub transition: TransitionType,
    #[serde(default)]
    pub triggered_request_ids: Vec<String>,
}

impl TransitionEvent {
    /// Creates an event for a single region.
    pub fn single(request_id: impl Into<String>, transition: TransitionType) -> Self {
        Self {
            request_id: request_id.into(),
            transition,
            triggered_request_ids: Vec::new(),
        }
    }

    /// Request ids carried by the event, in first-occurrence order.
    ///
    /// Ids naming the same geofence (`"5"`, `"05"`, `" 5"`) appear once.
    /// Ids that do not parse are kept, so the handler logs each of them.
    pub fn request_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::with_capacity(1 + self.triggered_request_ids.len());
        let mut seen_geofences = HashSet::new();
        let mut seen_malformed = HashSet::new();

        for id in std::iter::once(self.request_id.as_str())
            .chain(self.triggered_request_ids.iter().map(String::as_str))
        {
            let first = match parse_request_id(id) {
                Ok(geofence_id) => seen_geofences.insert(geofence_id),
                Err(_) => seen_malformed.insert(id.trim()),
            };
            if first {
                ids.push(id);
            }
        }
        ids
    }
}

/// Inbound event before its transition value has been interpreted.
///
/// The platform may report codes the pipeline does not handle (dwell = 4);
/// those events are dropped after logging rather than rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransitionEvent {
    pub request_id: String,
    pub transition: serde_json::Value,
    #[serde(default)]
    pub triggered_request_ids: Vec<String>,
}

impl RawTransitionEvent {
    /// Interprets the transition value. The error names the unsupported value.
    pub fn into_event(self) -> Result<TransitionEvent, String> {
        let transition = TransitionType::deserialize(&self.transition)
            .map_err(|e| e.to_string())?;
        Ok(TransitionEvent {
            request_id: self.request_id,
            transition,
            triggered_request_ids: self.triggered_request_ids,
        })
    }
}

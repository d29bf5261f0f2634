//! Geofence domain model.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::geofication::{CreateGeoficationRequest, Geofication};

/// Represents a circular region drawn by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub color: FenceColor,
    pub active: bool,
    pub trigger_count: i64,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub last_edit: i64,
}

/// Cosmetic color tag of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FenceColor {
    Red,
    Orange,
    Yellow,
    Green,
    Teal,
    #[default]
    Blue,
    Purple,
    Gray,
}

impl FenceColor {
    /// Converts to database integer representation.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Red => 0,
            Self::Orange => 1,
            Self::Yellow => 2,
            Self::Green => 3,
            Self::Teal => 4,
            Self::Blue => 5,
            Self::Purple => 6,
            Self::Gray => 7,
        }
    }

    /// Parses from database integer representation. Unknown values fall back to the default.
    pub fn from_i64(value: i64) -> Self {
        match value {
            0 => Self::Red,
            1 => Self::Orange,
            2 => Self::Yellow,
            3 => Self::Green,
            4 => Self::Teal,
            5 => Self::Blue,
            6 => Self::Purple,
            7 => Self::Gray,
            _ => Self::default(),
        }
    }
}

/// Default active status for new geofences.
fn default_active() -> bool {
    true
}

/// Request payload for creating a geofence, optionally with its first rule.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGeofenceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,

    #[validate(range(min = 30.0, max = 1000000.0, message = "Radius must be between 30 and 1000000 meters"))]
    pub radius_meters: f64,

    #[serde(default)]
    pub color: FenceColor,

    #[serde(default = "default_active")]
    pub active: bool,

    #[validate(nested)]
    pub geofication: Option<CreateGeoficationRequest>,
}

/// Request payload for updating a geofence (partial update).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGeofenceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: Option<f64>,

    #[validate(range(min = 30.0, max = 1000000.0, message = "Radius must be between 30 and 1000000 meters"))]
    pub radius_meters: Option<f64>,

    pub color: Option<FenceColor>,
}

impl UpdateGeofenceRequest {
    /// Whether the update moves or resizes the region.
    pub fn changes_region(&self) -> bool {
        self.latitude.is_some() || self.longitude.is_some() || self.radius_meters.is_some()
    }
}

/// Request payload for toggling the active flag.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// A geofence together with the rules bound to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceDetail {
    #[serde(flatten)]
    pub geofence: Geofence,
    pub geofications: Vec<Geofication>,
}

/// Response for listing geofences.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGeofencesResponse {
    pub geofences: Vec<Geofence>,
    pub total: usize,
}

/// Query parameters for listing geofences.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGeofencesQuery {
    #[serde(default = "default_active")]
    pub include_inactive: bool,
}

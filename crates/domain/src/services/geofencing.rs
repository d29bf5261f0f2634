//! Platform geofencing boundary.
//!
//! The platform engine monitors regions and reports transitions. The core
//! only registers and unregisters regions through [`GeofencingClient`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

use crate::models::geofence::Geofence;
use crate::models::transition::TransitionType;

/// Region cap enforced by the common mobile platforms.
pub const DEFAULT_MAX_REGIONS: usize = 100;

/// Errors reported by the platform geofencing engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeofencingError {
    #[error("Location permission has not been granted")]
    PermissionDenied,

    #[error("Too many regions registered (limit {limit})")]
    TooManyRegions { limit: usize },

    #[error("Precise location is disabled")]
    PrecisionDisabled,

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Registration rejected: {0}")]
    Rejected(String),
}

impl GeofencingError {
    /// Hint shown next to the error in the diagnostic log.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "grant background location access to enable monitoring",
            Self::TooManyRegions { .. } => "deactivate or delete unused regions",
            Self::PrecisionDisabled => "enable precise location in the system settings",
            Self::InvalidRegion(_) => "edit the region and save it again",
            Self::Rejected(_) => "check that location services are enabled",
        }
    }

    /// Whether the failure is a missing precondition rather than a service fault.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

/// Registration request for one circular region.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRequest {
    /// String form of the geofence primary key.
    pub region_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub transitions: Vec<TransitionType>,
    /// Expiration in milliseconds; `None` never expires.
    pub expires_in_millis: Option<i64>,
}

impl RegionRequest {
    /// Builds the request monitoring enter and exit without expiration.
    pub fn from_geofence(geofence: &Geofence) -> Result<Self, GeofencingError> {
        shared::validation::validate_region(
            geofence.latitude,
            geofence.longitude,
            geofence.radius_meters,
        )
        .map_err(|e| {
            GeofencingError::InvalidRegion(
                e.message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            )
        })?;

        Ok(Self {
            region_id: geofence.id.to_string(),
            latitude: geofence.latitude,
            longitude: geofence.longitude,
            radius_meters: geofence.radius_meters,
            transitions: vec![TransitionType::Enter, TransitionType::Exit],
            expires_in_millis: None,
        })
    }
}

/// Client for the platform region-monitoring engine.
#[async_trait::async_trait]
pub trait GeofencingClient: Send + Sync {
    /// Start monitoring a region. Re-registering an id replaces it.
    async fn register_region(&self, request: &RegionRequest) -> Result<(), GeofencingError>;

    /// Stop monitoring a region. Unknown ids are not an error.
    async fn unregister_region(&self, region_id: &str) -> Result<(), GeofencingError>;
}

/// In-process region registry.
///
/// Stands in for the platform engine when no bridge is attached and in
/// tests. Enforces the permission precondition and the region cap.
#[derive(Debug)]
pub struct InMemoryGeofencingClient {
    regions: Mutex<BTreeMap<String, RegionRequest>>,
    max_regions: usize,
    permission_granted: AtomicBool,
    precision_enabled: AtomicBool,
}

impl InMemoryGeofencingClient {
    pub fn new(max_regions: usize) -> Self {
        Self {
            regions: Mutex::new(BTreeMap::new()),
            max_regions,
            permission_granted: AtomicBool::new(true),
            precision_enabled: AtomicBool::new(true),
        }
    }

    pub fn set_permission_granted(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }

    pub fn set_precision_enabled(&self, enabled: bool) {
        self.precision_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Ids of monitored regions, sorted.
    pub fn region_ids(&self) -> Vec<String> {
        self.regions
            .lock()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn region(&self, region_id: &str) -> Option<RegionRequest> {
        self.regions
            .lock()
            .ok()
            .and_then(|r| r.get(region_id).cloned())
    }

    pub fn len(&self) -> usize {
        self.regions.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryGeofencingClient {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REGIONS)
    }
}

#[async_trait::async_trait]
impl GeofencingClient for InMemoryGeofencingClient {
    async fn register_region(&self, request: &RegionRequest) -> Result<(), GeofencingError> {
        if !self.permission_granted.load(Ordering::SeqCst) {
            return Err(GeofencingError::PermissionDenied);
        }
        if !self.precision_enabled.load(Ordering::SeqCst) {
            return Err(GeofencingError::PrecisionDisabled);
        }

        let mut regions = self
            .regions
            .lock()
            .map_err(|_| GeofencingError::Rejected("region registry poisoned".to_string()))?;

        if !regions.contains_key(&request.region_id) && regions.len() >= self.max_regions {
            return Err(GeofencingError::TooManyRegions {
                limit: self.max_regions,
            });
        }

        regions.insert(request.region_id.clone(), request.clone());
        Ok(())
    }

    async fn unregister_region(&self, region_id: &str) -> Result<(), GeofencingError> {
        let mut regions = self
            .regions
            .lock()
            .map_err(|_| GeofencingError::Rejected("region registry poisoned".to_string()))?;
        regions.remove(region_id);
        Ok(())
    }
}

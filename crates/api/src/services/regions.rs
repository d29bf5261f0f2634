//! Region registration with the platform geofencing engine.
//!
//! Registration failures never propagate. Each one becomes a diagnostic log
//! entry naming the region and a hint the user can act on.

use std::sync::Arc;

use domain::models::geofence::Geofence;
use domain::services::{GeofencingClient, GeofencingError, RegionRequest};
use persistence::repositories::GeofenceRepository;
use serde::Serialize;

use super::DiagnosticLog;

/// Outcome of re-registering every active region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationReport {
    pub registered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct RegionRegistrar {
    client: Arc<dyn GeofencingClient>,
    geofences: GeofenceRepository,
    log: DiagnosticLog,
}

impl RegionRegistrar {
    pub fn new(
        client: Arc<dyn GeofencingClient>,
        geofences: GeofenceRepository,
        log: DiagnosticLog,
    ) -> Self {
        Self {
            client,
            geofences,
            log,
        }
    }

    /// Start monitoring a geofence. Returns true on success.
    pub async fn register(&self, geofence: &Geofence) -> bool {
        let result = match RegionRequest::from_geofence(geofence) {
            Ok(request) => self.client.register_region(&request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                metrics::counter!("region_registrations_total", "outcome" => "registered")
                    .increment(1);
                self.log
                    .info(format!(
                        "Registered region {} ({})",
                        geofence.id, geofence.name
                    ))
                    .await;
                true
            }
            Err(e) => {
                self.report_failure("register", geofence.id, &e).await;
                false
            }
        }
    }

    /// Stop monitoring a region. Returns true on success.
    pub async fn unregister(&self, geofence_id: i64) -> bool {
        match self
            .client
            .unregister_region(&geofence_id.to_string())
            .await
        {
            Ok(()) => {
                self.log
                    .debug(format!("Unregistered region {}", geofence_id))
                    .await;
                true
            }
            Err(e) => {
                self.report_failure("unregister", geofence_id, &e).await;
                false
            }
        }
    }

    /// Register every active geofence again, e.g. after a device reboot
    /// cleared the platform's region table.
    pub async fn reregister_all(&self) -> RegistrationReport {
        let geofences = match self.geofences.find_active().await {
            Ok(rows) => rows,
            Err(e) => {
                self.log
                    .error(format!("Failed to load regions for re-registration: {}", e))
                    .await;
                return RegistrationReport::default();
            }
        };

        let mut report = RegistrationReport::default();
        for entity in geofences {
            let geofence: Geofence = entity.into();
            if self.register(&geofence).await {
                report.registered += 1;
            } else {
                report.failed += 1;
            }
        }

        self.log
            .info(format!(
                "Re-registered {} region(s), {} failed",
                report.registered, report.failed
            ))
            .await;
        report
    }

    async fn report_failure(&self, operation: &str, geofence_id: i64, error: &GeofencingError) {
        metrics::counter!("region_registrations_total", "outcome" => "failed").increment(1);

        let message = format!(
            "Failed to {} region {}: {} ({})",
            operation,
            geofence_id,
            error,
            error.hint()
        );
        if error.is_precondition() {
            self.log.warning(message).await;
        } else {
            self.log.error(message).await;
        }
    }
}

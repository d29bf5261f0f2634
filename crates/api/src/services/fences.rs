//! User operations on geofences and their geofications.

use domain::models::geofence::{
    CreateGeofenceRequest, Geofence, GeofenceDetail, ListGeofencesQuery, ListGeofencesResponse,
    UpdateGeofenceRequest,
};
use domain::models::geofication::{
    CreateGeoficationRequest, Geofication, UpdateGeoficationRequest,
};
use persistence::repositories::{
    GeofenceChanges, GeofenceInput, GeofenceRepository, GeoficationChanges, GeoficationInput,
    GeoficationRepository,
};
use shared::time::now_millis;
use validator::Validate;

use super::{DiagnosticLog, RegionRegistrar, ServiceError};

#[derive(Clone)]
pub struct FenceService {
    geofences: GeofenceRepository,
    geofications: GeoficationRepository,
    regions: RegionRegistrar,
    log: DiagnosticLog,
}

/// Rejects links that are present, non-blank and not http(s).
fn check_link(link: Option<&str>) -> Result<(), ServiceError> {
    match link.filter(|l| !l.trim().is_empty()) {
        Some(l) => shared::validation::validate_link(l).map_err(|e| {
            ServiceError::Validation(
                e.message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid link".to_string()),
            )
        }),
        None => Ok(()),
    }
}

fn geofication_input(request: &CreateGeoficationRequest) -> GeoficationInput<'_> {
    GeoficationInput {
        message: &request.message,
        flags: request.flags.bits(),
        delay_minutes: request.delay_minutes,
        repeat: request.repeat,
        active: request.active,
        on_trigger: request.on_trigger.as_i64(),
        link: request
            .link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty()),
        is_alarm: request.is_alarm,
    }
}

fn geofence_not_found(id: i64) -> ServiceError {
    ServiceError::NotFound(format!("Geofence {}", id))
}

fn geofication_not_found(id: i64) -> ServiceError {
    ServiceError::NotFound(format!("Geofication {}", id))
}

impl FenceService {
    pub fn new(
        geofences: GeofenceRepository,
        geofications: GeoficationRepository,
        regions: RegionRegistrar,
        log: DiagnosticLog,
    ) -> Self {
        Self {
            geofences,
            geofications,
            regions,
            log,
        }
    }

    /// Create a geofence, optionally with its first geofication, and start
    /// monitoring it when active.
    pub async fn create_geofence(
        &self,
        request: CreateGeofenceRequest,
    ) -> Result<GeofenceDetail, ServiceError> {
        request.validate()?;
        if let Some(rule) = &request.geofication {
            check_link(rule.link.as_deref())?;
        }

        let input = GeofenceInput {
            name: &request.name,
            latitude: request.latitude,
            longitude: request.longitude,
            radius_meters: request.radius_meters,
            color: request.color.as_i64(),
            active: request.active,
        };
        let now = now_millis();

        let (geofence, geofications): (Geofence, Vec<Geofication>) = match &request.geofication {
            Some(rule) => {
                let (fence, rule) = self
                    .geofences
                    .create_with_geofication(&input, &geofication_input(rule), now)
                    .await?;
                (fence.into(), vec![rule.into()])
            }
            None => (self.geofences.create(&input, now).await?.into(), Vec::new()),
        };

        self.log
            .info(format!(
                "Created geofence {} ({})",
                geofence.id, geofence.name
            ))
            .await;
        if geofence.active {
            self.regions.register(&geofence).await;
        }

        Ok(GeofenceDetail {
            geofence,
            geofications,
        })
    }

    pub async fn get_geofence_detail(&self, id: i64) -> Result<GeofenceDetail, ServiceError> {
        let geofence: Geofence = self
            .geofences
            .find_by_id(id)
            .await?
            .ok_or_else(|| geofence_not_found(id))?
            .into();
        let geofications = self
            .geofications
            .find_by_geofence_id(id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(GeofenceDetail {
            geofence,
            geofications,
        })
    }

    pub async fn list_geofences(
        &self,
        query: &ListGeofencesQuery,
    ) -> Result<ListGeofencesResponse, ServiceError> {
        let geofences: Vec<Geofence> = self
            .geofences
            .find_all(query.include_inactive)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        let total = geofences.len();
        Ok(ListGeofencesResponse { geofences, total })
    }

    /// Partial update. Moving or resizing an active region re-registers it.
    pub async fn update_geofence(
        &self,
        id: i64,
        request: UpdateGeofenceRequest,
    ) -> Result<Geofence, ServiceError> {
        request.validate()?;

        let changes = GeofenceChanges {
            name: request.name.as_deref(),
            latitude: request.latitude,
            longitude: request.longitude,
            radius_meters: request.radius_meters,
            color: request.color.map(|c| c.as_i64()),
        };
        let geofence: Geofence = self
            .geofences
            .update(id, &changes, now_millis())
            .await?
            .ok_or_else(|| geofence_not_found(id))?
            .into();

        self.log
            .info(format!("Updated geofence {} ({})", geofence.id, geofence.name))
            .await;
        if geofence.active && request.changes_region() {
            self.regions.register(&geofence).await;
        }
        Ok(geofence)
    }

    /// Toggle monitoring of a geofence.
    pub async fn set_geofence_active(&self, id: i64, active: bool) -> Result<Geofence, ServiceError> {
        let geofence: Geofence = self
            .geofences
            .set_active(id, active, now_millis())
            .await?
            .ok_or_else(|| geofence_not_found(id))?
            .into();

        if active {
            self.log.info(format!("Activated geofence {}", id)).await;
            self.regions.register(&geofence).await;
        } else {
            self.log.info(format!("Deactivated geofence {}", id)).await;
            self.regions.unregister(id).await;
        }
        Ok(geofence)
    }

    /// Delete a geofence and every geofication bound to it.
    pub async fn delete_geofence(&self, id: i64) -> Result<(), ServiceError> {
        if self.geofences.delete(id).await? == 0 {
            return Err(geofence_not_found(id));
        }
        self.regions.unregister(id).await;
        self.log.info(format!("Deleted geofence {}", id)).await;
        Ok(())
    }

    /// "Delete" notification action. The region may already be gone when the
    /// user taps the button; that is not an error.
    pub async fn delete_geofence_from_notification(&self, id: i64) -> Result<bool, ServiceError> {
        match self.delete_geofence(id).await {
            Ok(()) => Ok(true),
            Err(ServiceError::NotFound(_)) => {
                self.log
                    .info(format!(
                        "Geofence {} was already deleted when the notification action ran",
                        id
                    ))
                    .await;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn add_geofication(
        &self,
        geofence_id: i64,
        request: CreateGeoficationRequest,
    ) -> Result<Geofication, ServiceError> {
        request.validate()?;
        check_link(request.link.as_deref())?;

        if self.geofences.find_by_id(geofence_id).await?.is_none() {
            return Err(geofence_not_found(geofence_id));
        }

        let geofication: Geofication = self
            .geofications
            .create(geofence_id, &geofication_input(&request), now_millis())
            .await?
            .into();

        self.log
            .info(format!(
                "Added geofication {} to geofence {}",
                geofication.id, geofence_id
            ))
            .await;
        Ok(geofication)
    }

    pub async fn get_geofication(&self, id: i64) -> Result<Geofication, ServiceError> {
        Ok(self
            .geofications
            .find_by_id(id)
            .await?
            .ok_or_else(|| geofication_not_found(id))?
            .into())
    }

    /// Partial update. An empty link clears the stored one.
    pub async fn update_geofication(
        &self,
        id: i64,
        request: UpdateGeoficationRequest,
    ) -> Result<Geofication, ServiceError> {
        request.validate()?;
        check_link(request.link.as_deref())?;

        let link = request.link.as_deref().map(str::trim);
        let changes = GeoficationChanges {
            message: request.message.as_deref(),
            flags: request.flags.map(|f| f.bits()),
            delay_minutes: request.delay_minutes,
            repeat: request.repeat,
            on_trigger: request.on_trigger.map(|a| a.as_i64()),
            link: link.filter(|l| !l.is_empty()),
            clear_link: link.is_some_and(str::is_empty),
            is_alarm: request.is_alarm,
        };

        let geofication: Geofication = self
            .geofications
            .update(id, &changes, now_millis())
            .await?
            .ok_or_else(|| geofication_not_found(id))?
            .into();

        self.log
            .info(format!("Updated geofication {}", id))
            .await;
        Ok(geofication)
    }

    /// Toggle a geofication. Re-enabling a rule of an inactive geofence
    /// re-activates and registers the geofence too.
    pub async fn set_geofication_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<Geofication, ServiceError> {
        let now = now_millis();
        let geofication: Geofication = self
            .geofications
            .set_active(id, active, now)
            .await?
            .ok_or_else(|| geofication_not_found(id))?
            .into();

        if !active {
            self.log
                .info(format!("Deactivated geofication {}", id))
                .await;
            return Ok(geofication);
        }

        self.log.info(format!("Activated geofication {}", id)).await;

        let geofence_id = geofication.geofence_id;
        if let Some(fence) = self.geofences.find_by_id(geofence_id).await? {
            if !fence.active {
                if let Some(fence) = self.geofences.set_active(geofence_id, true, now).await? {
                    let fence: Geofence = fence.into();
                    self.log
                        .info(format!(
                            "Re-activated geofence {} with its geofication {}",
                            geofence_id, id
                        ))
                        .await;
                    self.regions.register(&fence).await;
                }
            }
        }

        Ok(geofication)
    }

    /// "Disable" notification action.
    pub async fn disable_geofication(&self, id: i64) -> Result<Geofication, ServiceError> {
        self.set_geofication_active(id, false).await
    }

    pub async fn delete_geofication(&self, id: i64) -> Result<(), ServiceError> {
        if self.geofications.delete(id).await? == 0 {
            return Err(geofication_not_found(id));
        }
        self.log.info(format!("Deleted geofication {}", id)).await;
        Ok(())
    }
}

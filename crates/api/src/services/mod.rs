//! Application services.
//!
//! Every service holds cloneable repository handles and boundary trait
//! objects. [`Services::new`] wires them once; the router and the background
//! jobs receive the same instance.

pub mod diagnostics;
pub mod dispatch;
pub mod fences;
pub mod regions;
pub mod settings;
pub mod transition;

use std::sync::Arc;

use domain::services::{GeofencingClient, NotificationDispatcher};
use persistence::repositories::{
    GeofenceRepository, GeoficationRepository, LogEntryRepository, PendingDispatchRepository,
    SettingRepository,
};
use sqlx::SqlitePool;
use thiserror::Error;

pub use diagnostics::DiagnosticLog;
pub use dispatch::{DeliveryReport, DispatchService, DispatchSettings, ScheduleOutcome};
pub use fences::FenceService;
pub use regions::{RegionRegistrar, RegistrationReport};
pub use settings::SettingsService;
pub use transition::TransitionHandler;

/// Errors returned by application services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Too large: {0}")]
    TooLarge(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(describe_validation_errors(&errors))
    }
}

/// Flattens validation errors into one message, nested fields included.
pub fn describe_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut messages = Vec::new();
    collect_validation_messages("", errors, &mut messages);

    match messages.len() {
        0 => "Invalid request".to_string(),
        1 => messages.remove(0),
        n => format!("{} validation errors: {}", n, messages.join("; ")),
    }
}

fn collect_validation_messages(
    prefix: &str,
    errors: &validator::ValidationErrors,
    out: &mut Vec<String>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for e in field_errors {
                    out.push(
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("{} is invalid", path)),
                    );
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                collect_validation_messages(&path, nested, out);
            }
            ValidationErrorsKind::List(items) => {
                for nested in items.values() {
                    collect_validation_messages(&path, nested, out);
                }
            }
        }
    }
}

/// All application services, wired once.
#[derive(Clone)]
pub struct Services {
    pub diagnostics: DiagnosticLog,
    pub regions: RegionRegistrar,
    pub dispatch: DispatchService,
    pub transitions: TransitionHandler,
    pub fences: FenceService,
    pub settings: SettingsService,
}

impl Services {
    pub fn new(
        pool: SqlitePool,
        dispatcher: Arc<dyn NotificationDispatcher>,
        geofencing: Arc<dyn GeofencingClient>,
        dispatch_settings: DispatchSettings,
    ) -> Self {
        let geofences = GeofenceRepository::new(pool.clone());
        let geofications = GeoficationRepository::new(pool.clone());
        let queue = PendingDispatchRepository::new(pool.clone());

        let diagnostics = DiagnosticLog::new(LogEntryRepository::new(pool.clone()));
        let regions = RegionRegistrar::new(geofencing, geofences.clone(), diagnostics.clone());
        let dispatch = DispatchService::new(
            dispatcher,
            queue,
            geofences.clone(),
            geofications.clone(),
            diagnostics.clone(),
            dispatch_settings,
        );
        let transitions = TransitionHandler::new(
            geofences.clone(),
            geofications.clone(),
            dispatch.clone(),
            regions.clone(),
            diagnostics.clone(),
        );
        let fences = FenceService::new(geofences, geofications, regions.clone(), diagnostics.clone());
        let settings = SettingsService::new(SettingRepository::new(pool), diagnostics.clone());

        Self {
            diagnostics,
            regions,
            dispatch,
            transitions,
            fences,
            settings,
        }
    }
}

//! Platform bridge endpoints: transition delivery and boot re-registration.

use axum::{
    extract::State,
    http::{Extensions, StatusCode},
    Json,
};
use domain::models::transition::RawTransitionEvent;
use tracing::info;

use crate::app::AppState;
use crate::middleware::get_request_id;
use crate::services::RegistrationReport;

/// Accept a geofence transition reported by the platform.
///
/// The event is fully processed before responding; failures inside the
/// pipeline are recorded in the diagnostic log rather than returned.
///
/// POST /api/v1/transitions
pub async fn report_transition(
    State(state): State<AppState>,
    extensions: Extensions,
    Json(event): Json<RawTransitionEvent>,
) -> StatusCode {
    info!(
        request_id = %get_request_id(&extensions),
        region = %event.request_id,
        "Transition received"
    );
    state.services.transitions.on_platform_event(event).await;
    StatusCode::ACCEPTED
}

/// Re-register every active geofence after the device restarted.
///
/// POST /api/v1/boot
pub async fn boot_completed(State(state): State<AppState>) -> Json<RegistrationReport> {
    Json(state.services.regions.reregister_all().await)
}

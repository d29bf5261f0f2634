//! Geofication (rule) endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::geofence::SetActiveRequest;
use domain::models::geofication::{Geofication, UpdateGeoficationRequest};

use crate::app::AppState;
use crate::error::ApiError;

/// GET /api/v1/geofications/:id
pub async fn get_geofication(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Geofication>, ApiError> {
    Ok(Json(state.services.fences.get_geofication(id).await?))
}

/// PATCH /api/v1/geofications/:id
pub async fn update_geofication(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateGeoficationRequest>,
) -> Result<Json<Geofication>, ApiError> {
    Ok(Json(
        state.services.fences.update_geofication(id, request).await?,
    ))
}

/// PUT /api/v1/geofications/:id/active
pub async fn set_geofication_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<Geofication>, ApiError> {
    Ok(Json(
        state
            .services
            .fences
            .set_geofication_active(id, request.active)
            .await?,
    ))
}

/// The "disable" notification action.
///
/// POST /api/v1/geofications/:id/disable
pub async fn disable_geofication(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Geofication>, ApiError> {
    Ok(Json(state.services.fences.disable_geofication(id).await?))
}

/// DELETE /api/v1/geofications/:id
pub async fn delete_geofication(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.fences.delete_geofication(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Geofence endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::geofence::{
    CreateGeofenceRequest, Geofence, GeofenceDetail, ListGeofencesQuery, ListGeofencesResponse,
    SetActiveRequest, UpdateGeofenceRequest,
};
use domain::models::geofication::{CreateGeoficationRequest, Geofication};
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;

/// Response of the notification "delete geofence" action.
#[derive(Debug, Serialize)]
pub struct NotificationDeleteResponse {
    pub deleted: bool,
}

/// POST /api/v1/geofences
pub async fn create_geofence(
    State(state): State<AppState>,
    Json(request): Json<CreateGeofenceRequest>,
) -> Result<(StatusCode, Json<GeofenceDetail>), ApiError> {
    let detail = state.services.fences.create_geofence(request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/v1/geofences?includeInactive=false
pub async fn list_geofences(
    State(state): State<AppState>,
    Query(query): Query<ListGeofencesQuery>,
) -> Result<Json<ListGeofencesResponse>, ApiError> {
    Ok(Json(state.services.fences.list_geofences(&query).await?))
}

/// GET /api/v1/geofences/:id
pub async fn get_geofence(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<GeofenceDetail>, ApiError> {
    Ok(Json(state.services.fences.get_geofence_detail(id).await?))
}

/// PATCH /api/v1/geofences/:id
pub async fn update_geofence(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateGeofenceRequest>,
) -> Result<Json<Geofence>, ApiError> {
    Ok(Json(state.services.fences.update_geofence(id, request).await?))
}

/// PUT /api/v1/geofences/:id/active
pub async fn set_geofence_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<Geofence>, ApiError> {
    Ok(Json(
        state
            .services
            .fences
            .set_geofence_active(id, request.active)
            .await?,
    ))
}

/// DELETE /api/v1/geofences/:id
pub async fn delete_geofence(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.fences.delete_geofence(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Deletion requested from a delivered notification. A fence that is
/// already gone is not an error.
///
/// POST /api/v1/geofences/:id/notification-delete
pub async fn delete_geofence_from_notification(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NotificationDeleteResponse>, ApiError> {
    let deleted = state
        .services
        .fences
        .delete_geofence_from_notification(id)
        .await?;
    Ok(Json(NotificationDeleteResponse { deleted }))
}

/// POST /api/v1/geofences/:id/geofications
pub async fn add_geofication(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<CreateGeoficationRequest>,
) -> Result<(StatusCode, Json<Geofication>), ApiError> {
    let geofication = state.services.fences.add_geofication(id, request).await?;
    Ok((StatusCode::CREATED, Json(geofication)))
}

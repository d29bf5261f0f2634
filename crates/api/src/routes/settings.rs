//! Settings endpoints. Values are opaque bytes.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use domain::models::setting::ListSettingKeysResponse;

use crate::app::AppState;
use crate::error::ApiError;

/// GET /api/v1/settings
pub async fn list_settings(
    State(state): State<AppState>,
) -> Result<Json<ListSettingKeysResponse>, ApiError> {
    Ok(Json(state.services.settings.list_keys().await?))
}

/// GET /api/v1/settings/:key
pub async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let setting = state.services.settings.get(&key).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        setting.value,
    ))
}

/// PUT /api/v1/settings/:key
pub async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state.services.settings.put(&key, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/settings/:key
pub async fn delete_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.services.settings.delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

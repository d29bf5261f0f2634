//! Diagnostic log endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use domain::models::log_entry::{ListLogEntriesQuery, ListLogEntriesResponse};
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ClearLogResponse {
    pub deleted: u64,
}

/// Newest entries first.
///
/// GET /api/v1/logs?limit=100&beforeId=<id>
pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<ListLogEntriesQuery>,
) -> Result<Json<ListLogEntriesResponse>, ApiError> {
    Ok(Json(state.services.diagnostics.list(&query).await?))
}

/// DELETE /api/v1/logs
pub async fn clear_logs(State(state): State<AppState>) -> Result<Json<ClearLogResponse>, ApiError> {
    let deleted = state.services.diagnostics.clear().await?;
    Ok(Json(ClearLogResponse { deleted }))
}

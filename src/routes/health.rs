use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::errors::AppError;
use crate::services::AppState;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Readiness requires a live database connection.
pub async fn readiness_check(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state
        .repo
        .ping()
        .await
        .map_err(|e| AppError::DatabaseConnectionError(e.to_string()))?;
    Ok(Json(json!({ "status": "ready" })))
}

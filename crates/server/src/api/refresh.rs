//! Refresher API handlers.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use seedkeeper_core::{CycleReport, RefreshError, RefresherStatus};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

/// Run one refresh cycle now and return its report
pub async fn trigger_refresh(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CycleReport>, ApiError> {
    match state.refresher().run_once().await {
        Ok(report) => Ok(Json(report)),
        Err(RefreshError::AlreadyRunning) => Err(api_error(
            StatusCode::CONFLICT,
            RefreshError::AlreadyRunning.to_string(),
        )),
        Err(e) => Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
    }
}

/// Scheduler flag and the outcome of the last cycle
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<RefresherStatus> {
    Json(state.scheduler().status().await)
}

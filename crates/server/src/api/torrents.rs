//! Torrent record API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use seedkeeper_core::{RecordFilter, TorrentRecord, TorrentStatus};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for record queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for record queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing records
#[derive(Debug, Deserialize)]
pub struct ListTorrentsParams {
    /// Filter by status
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// One tracked torrent
#[derive(Debug, Serialize)]
pub struct TorrentResponse {
    pub torrent_id: i64,
    pub content_hash: Option<String>,
    pub content_key: String,
    pub resolution: u32,
    pub status: TorrentStatus,
    pub requested_by: Vec<String>,
    pub title: Option<String>,
    pub seeding_since: Option<String>,
    pub completion_notified: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<TorrentRecord> for TorrentResponse {
    fn from(record: TorrentRecord) -> Self {
        Self {
            torrent_id: record.torrent_id,
            content_hash: record.content_hash,
            content_key: record.content_key,
            resolution: record.resolution,
            status: record.status,
            requested_by: record.requested_by.into_iter().collect(),
            title: record.title,
            seeding_since: record.seeding_since.map(|t| t.to_rfc3339()),
            completion_notified: record.completion_notified,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListTorrentsResponse {
    pub torrents: Vec<TorrentResponse>,
    pub limit: i64,
    pub offset: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// List records, newest first
pub async fn list_torrents(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTorrentsParams>,
) -> Result<Json<ListTorrentsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = RecordFilter::new().with_limit(limit).with_offset(offset);
    if let Some(ref status) = params.status {
        let status: TorrentStatus = status
            .parse()
            .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e))?;
        filter = filter.with_status(status);
    }

    let records = state
        .store()
        .list(&filter)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ListTorrentsResponse {
        torrents: records.into_iter().map(TorrentResponse::from).collect(),
        limit,
        offset,
    }))
}

/// Get one record by tracker id
pub async fn get_torrent(
    State(state): State<Arc<AppState>>,
    Path(torrent_id): Path<i64>,
) -> Result<Json<TorrentResponse>, ApiError> {
    match state.store().get(torrent_id) {
        Ok(Some(record)) => Ok(Json(TorrentResponse::from(record))),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Torrent not found: {}", torrent_id),
        )),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

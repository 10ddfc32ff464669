//! Download request and completion callback handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use seedkeeper_core::{DownloadRequest, FinishedTorrent, RequestError, RequestOutcome};

use super::handlers::{api_error, ApiError};
use super::torrents::TorrentResponse;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a new download
#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    pub torrent_id: i64,
    /// Magnet URI or .torrent URL
    pub download_url: String,
    /// Title id shared by every release of the same media
    pub content_key: String,
    /// Vertical resolution; parsed from `title` when absent
    pub resolution: Option<u32>,
    pub title: Option<String>,
    /// Channel-qualified recipient, e.g. `telegram:123456`
    pub requester_id: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    /// False when the torrent was already tracked and the requester joined it.
    pub created: bool,
    pub torrent: TorrentResponse,
}

/// Completion callback from the torrent client
#[derive(Debug, Deserialize)]
pub struct FinishedBody {
    pub content_hash: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FinishedResponse {
    pub notified: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Track a torrent for a requester
pub async fn request_download(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DownloadBody>,
) -> Result<(StatusCode, Json<DownloadResponse>), ApiError> {
    let request = DownloadRequest {
        torrent_id: body.torrent_id,
        download_url: body.download_url,
        content_key: body.content_key,
        resolution: body.resolution,
        title: body.title,
        requester_id: body.requester_id,
    };

    match state.intake().request_download(request).await {
        Ok(RequestOutcome::Created(record)) => Ok((
            StatusCode::CREATED,
            Json(DownloadResponse {
                created: true,
                torrent: record.into(),
            }),
        )),
        Ok(RequestOutcome::AlreadyTracked(record)) => Ok((
            StatusCode::OK,
            Json(DownloadResponse {
                created: false,
                torrent: record.into(),
            }),
        )),
        Err(e) => Err(request_error(e)),
    }
}

/// Notify requesters that a torrent finished
pub async fn torrent_finished(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FinishedBody>,
) -> Result<Json<FinishedResponse>, ApiError> {
    let finished = FinishedTorrent {
        content_hash: body.content_hash,
        display_name: body.display_name,
    };

    state
        .intake()
        .handle_finished(finished)
        .await
        .map(|notified| Json(FinishedResponse { notified }))
        .map_err(request_error)
}

fn request_error(error: RequestError) -> ApiError {
    let status = match &error {
        RequestError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        RequestError::Retired(_) => StatusCode::CONFLICT,
        RequestError::TorrentClient(_) => StatusCode::BAD_GATEWAY,
        RequestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %error, "Download request failed");
    }
    api_error(status, error.to_string())
}

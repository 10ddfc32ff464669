//! Types for the download request flow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{StoreError, TorrentRecord};
use crate::torrent_client::TorrentClientError;

/// Errors from the request flow.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The id was tracked before and has been retired for good.
    #[error("torrent {0} was already downloaded and removed")]
    Retired(i64),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("torrent client error: {0}")]
    TorrentClient(#[from] TorrentClientError),
}

/// A user asking for a torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Tracker-assigned id.
    pub torrent_id: i64,
    /// Magnet URI or .torrent URL.
    pub download_url: String,
    /// Canonical title id (e.g. an IMDB id).
    pub content_key: String,
    /// Vertical resolution; parsed from the title when missing.
    #[serde(default)]
    pub resolution: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    /// Channel-qualified address, e.g. `telegram:12345`.
    pub requester_id: String,
}

/// Result of a successful request.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    /// New record created and handed to the client.
    Created(TorrentRecord),
    /// The torrent was already tracked; the requester was added to it.
    AlreadyTracked(TorrentRecord),
}

impl RequestOutcome {
    pub fn record(&self) -> &TorrentRecord {
        match self {
            RequestOutcome::Created(r) | RequestOutcome::AlreadyTracked(r) => r,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, RequestOutcome::Created(_))
    }
}

/// Completion callback sent by the torrent client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedTorrent {
    pub content_hash: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

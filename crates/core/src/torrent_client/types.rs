//! Types for torrent client operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid torrent: {0}")]
    InvalidTorrent(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

impl TorrentClientError {
    /// Build an error from a failed HTTP round trip.
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TorrentClientError::Timeout
        } else if e.is_connect() {
            TorrentClientError::ConnectionFailed(e.to_string())
        } else {
            TorrentClientError::ApiError(e.to_string())
        }
    }
}

/// State of a torrent as the client reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Stopped/paused by the user or after reaching a seed limit.
    Stopped,
    /// Verifying local data.
    Checking,
    /// Waiting for a download or seed slot.
    Queued,
    /// Downloading from peers.
    Downloading,
    /// Seeding to peers.
    Seeding,
    /// Local data error (files missing, disk full). Tracker trouble is not an error here.
    Error,
    /// Unknown state.
    Unknown,
}

impl TorrentState {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Stopped => "stopped",
            TorrentState::Checking => "checking",
            TorrentState::Queued => "queued",
            TorrentState::Downloading => "downloading",
            TorrentState::Seeding => "seeding",
            TorrentState::Error => "error",
            TorrentState::Unknown => "unknown",
        }
    }
}

/// Live information about a torrent in the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info hash (lowercase hex).
    pub hash: String,
    /// Torrent name.
    pub name: String,
    /// Current state.
    pub state: TorrentState,
    /// Bytes still missing before the payload is complete.
    pub bytes_remaining: u64,
    /// Total payload size in bytes.
    pub total_bytes: u64,
    /// When the torrent completed downloading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TorrentInfo {
    /// The payload is fully on disk.
    ///
    /// A torrent that stopped after hitting its seed ratio still counts: the
    /// client keeps it, and only the retention window decides its removal.
    pub fn is_finished(&self) -> bool {
        self.state == TorrentState::Seeding
            || (self.total_bytes > 0 && self.bytes_remaining == 0 && self.state != TorrentState::Error)
    }

    /// The payload is still being fetched (or waiting for a slot to be).
    pub fn is_downloading(&self) -> bool {
        !self.is_finished()
            && matches!(
                self.state,
                TorrentState::Downloading | TorrentState::Queued | TorrentState::Checking
            )
    }
}

/// Result of adding a torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTorrentResult {
    /// Info hash of the added torrent.
    pub hash: String,
    /// Name of the torrent (may be unknown for magnets initially).
    pub name: Option<String>,
    /// The client already had this payload; nothing new was added.
    pub duplicate: bool,
}

/// Trait for torrent client backends.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// List every torrent the client currently tracks.
    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError>;

    /// Submit a download reference (magnet URI or .torrent URL).
    ///
    /// Adds are not idempotent in general; callers must not retry on error.
    async fn add_torrent(&self, download_url: &str) -> Result<AddTorrentResult, TorrentClientError>;

    /// Remove a torrent, optionally erasing its downloaded data.
    /// Removing a hash the client does not know is a no-op.
    async fn remove_torrent(&self, hash: &str, delete_files: bool)
        -> Result<(), TorrentClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(state: TorrentState, remaining: u64, total: u64) -> TorrentInfo {
        TorrentInfo {
            hash: "abc".to_string(),
            name: "Pulp Fiction 1994 1080p".to_string(),
            state,
            bytes_remaining: remaining,
            total_bytes: total,
            completed_at: None,
        }
    }

    #[test]
    fn test_torrent_state_as_str() {
        assert_eq!(TorrentState::Stopped.as_str(), "stopped");
        assert_eq!(TorrentState::Checking.as_str(), "checking");
        assert_eq!(TorrentState::Queued.as_str(), "queued");
        assert_eq!(TorrentState::Downloading.as_str(), "downloading");
        assert_eq!(TorrentState::Seeding.as_str(), "seeding");
        assert_eq!(TorrentState::Error.as_str(), "error");
        assert_eq!(TorrentState::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_torrent_state_serialization() {
        assert_eq!(
            serde_json::to_string(&TorrentState::Downloading).unwrap(),
            "\"downloading\""
        );
        assert_eq!(
            serde_json::to_string(&TorrentState::Seeding).unwrap(),
            "\"seeding\""
        );
    }

    #[test]
    fn test_seeding_is_finished() {
        let t = info(TorrentState::Seeding, 0, 100);
        assert!(t.is_finished());
        assert!(!t.is_downloading());
    }

    #[test]
    fn test_stopped_complete_is_finished() {
        assert!(info(TorrentState::Stopped, 0, 100).is_finished());
    }

    #[test]
    fn test_stopped_incomplete_is_neither() {
        let t = info(TorrentState::Stopped, 50, 100);
        assert!(!t.is_finished());
        assert!(!t.is_downloading());
    }

    #[test]
    fn test_queued_and_checking_count_as_downloading() {
        assert!(info(TorrentState::Queued, 50, 100).is_downloading());
        assert!(info(TorrentState::Checking, 50, 100).is_downloading());
        assert!(info(TorrentState::Downloading, 50, 100).is_downloading());
    }

    #[test]
    fn test_magnet_without_metadata_is_not_finished() {
        // Size is unknown until metadata arrives.
        let t = info(TorrentState::Downloading, 0, 0);
        assert!(!t.is_finished());
        assert!(t.is_downloading());
    }

    #[test]
    fn test_errored_torrent_is_neither() {
        let t = info(TorrentState::Error, 0, 100);
        assert!(!t.is_finished());
        assert!(!t.is_downloading());
    }
}

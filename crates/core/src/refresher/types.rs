//! Types for the refresher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{StoreError, TorrentStatus};
use crate::torrent_client::TorrentClientError;

/// Errors that end a refresh cycle early.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Another cycle holds the run lock.
    #[error("a refresh cycle is already running")]
    AlreadyRunning,

    /// Reading the store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The torrent client could not be reached or refused a call.
    #[error("torrent client error: {0}")]
    TorrentClient(#[from] TorrentClientError),

    /// The cycle overran its timeout and was abandoned.
    #[error("refresh cycle timed out after {0}s")]
    TimedOut(u64),
}

impl RefreshError {
    /// Label for the cycle metric.
    pub fn result_label(&self) -> &'static str {
        match self {
            RefreshError::AlreadyRunning => "skipped",
            RefreshError::TimedOut(_) => "timed_out",
            RefreshError::Store(_) | RefreshError::TorrentClient(_) => "aborted",
        }
    }
}

/// A persisted status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub torrent_id: i64,
    pub from: TorrentStatus,
    pub to: TorrentStatus,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    /// Active records in the first snapshot.
    pub records_seen: usize,
    /// Torrents the client reported in the first snapshot.
    pub client_torrents: usize,
    pub duplicates_removed: usize,
    /// Records removed after their retention window.
    pub expired: usize,
    /// Records whose torrent disappeared from the client.
    pub vanished: usize,
    pub transitions: Vec<Transition>,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    /// Rows actually changed in the store.
    pub records_written: usize,
    /// Batches that still failed after their retry.
    pub failed_batches: usize,
}

/// Refresher state exposed to the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefresherStatus {
    /// The periodic scheduler is running.
    pub scheduled: bool,
    pub interval_secs: u64,
    /// A cycle holds the run lock right now.
    pub cycle_in_progress: bool,
    pub last_report: Option<CycleReport>,
    pub last_error: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
}

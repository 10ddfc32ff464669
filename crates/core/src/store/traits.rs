//! Torrent storage trait and error type.

use std::collections::HashMap;
use std::fmt;

use super::{CreateTorrentRequest, RecordFilter, TorrentRecord, TorrentStatus};

/// Error type for store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Record not found.
    NotFound(i64),
    /// A record with this torrent id already exists.
    AlreadyExists(i64),
    /// Database error.
    Database(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "Torrent record not found: {}", id),
            StoreError::AlreadyExists(id) => write!(f, "Torrent record already exists: {}", id),
            StoreError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Trait for torrent record storage backends.
pub trait TorrentStore: Send + Sync {
    /// Start tracking a torrent in `requested` status.
    fn create(&self, request: CreateTorrentRequest) -> Result<TorrentRecord, StoreError>;

    /// Get a record by tracker id.
    fn get(&self, torrent_id: i64) -> Result<Option<TorrentRecord>, StoreError>;

    /// All records that are not `removed`.
    fn list_active(&self) -> Result<Vec<TorrentRecord>, StoreError>;

    /// Records matching the filter, newest first.
    fn list(&self, filter: &RecordFilter) -> Result<Vec<TorrentRecord>, StoreError>;

    /// Number of records in each status. Statuses with no records are absent.
    fn count_by_status(&self) -> Result<HashMap<TorrentStatus, i64>, StoreError>;

    /// Non-`removed` records for one media title.
    fn find_active_by_content_key(&self, content_key: &str)
        -> Result<Vec<TorrentRecord>, StoreError>;

    /// The record the client knows under this hash, if any.
    fn find_by_content_hash(&self, hash: &str) -> Result<Option<TorrentRecord>, StoreError>;

    /// Add a requester to an existing record.
    fn add_requester(&self, torrent_id: i64, requester: &str) -> Result<TorrentRecord, StoreError>;

    /// Record the hash the client assigned.
    fn set_content_hash(&self, torrent_id: i64, hash: &str) -> Result<(), StoreError>;

    /// Atomically set `completion_notified`.
    ///
    /// Returns `true` only for the caller that flipped the flag, so the
    /// completion message goes out once even when two paths race for it.
    fn claim_notification(&self, torrent_id: i64) -> Result<bool, StoreError>;

    /// Insert or update a batch of records keyed by `torrent_id`, atomically.
    ///
    /// Updates never move `status` backward, never drop requesters and never
    /// clear `completion_notified`. Returns the number of rows written.
    fn upsert(&self, records: &[TorrentRecord]) -> Result<usize, StoreError>;
}

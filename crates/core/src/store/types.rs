//! Torrent record types.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a tracked torrent.
///
/// Variants are declared in lifecycle order; the derived `Ord` is the
/// forward direction of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentStatus {
    /// Requested by a user, not yet seen downloading.
    Requested,
    /// The client is fetching the payload.
    Downloading,
    /// Payload complete, kept in the client for the retention window.
    Seeding,
    /// Terminal. The client no longer holds this torrent.
    Removed,
}

impl TorrentStatus {
    /// Returns the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentStatus::Requested => "requested",
            TorrentStatus::Downloading => "downloading",
            TorrentStatus::Seeding => "seeding",
            TorrentStatus::Removed => "removed",
        }
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    ///
    /// Staying put is always legal except that nothing leaves `removed`.
    pub fn can_transition_to(&self, next: TorrentStatus) -> bool {
        match (self, next) {
            (TorrentStatus::Removed, TorrentStatus::Removed) => true,
            (TorrentStatus::Removed, _) => false,
            (current, next) => next >= *current,
        }
    }

    pub fn is_active(&self) -> bool {
        *self != TorrentStatus::Removed
    }
}

impl fmt::Display for TorrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TorrentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(TorrentStatus::Requested),
            "downloading" => Ok(TorrentStatus::Downloading),
            "seeding" => Ok(TorrentStatus::Seeding),
            "removed" => Ok(TorrentStatus::Removed),
            other => Err(format!("unknown torrent status: {}", other)),
        }
    }
}

/// One torrent ever requested through the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentRecord {
    /// Tracker-assigned id.
    pub torrent_id: i64,
    /// Client-assigned info hash, known once the client acknowledged the add.
    pub content_hash: Option<String>,
    /// Canonical media title id (e.g. an IMDB id), used to group duplicates.
    pub content_key: String,
    /// Vertical resolution (720, 1080, 2160...).
    pub resolution: u32,
    pub status: TorrentStatus,
    /// Everyone who asked for this torrent.
    pub requested_by: BTreeSet<String>,
    /// Display name.
    pub title: Option<String>,
    /// Magnet URI or .torrent URL handed to the client.
    pub download_url: String,
    /// When the record first entered `seeding`.
    pub seeding_since: Option<DateTime<Utc>>,
    /// Requesters were already told the download finished.
    pub completion_notified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TorrentRecord {
    /// Name to show in messages and logs.
    pub fn display_name(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("{} ({}p)", self.content_key, self.resolution))
    }
}

/// Request to start tracking a new torrent.
#[derive(Debug, Clone)]
pub struct CreateTorrentRequest {
    pub torrent_id: i64,
    pub content_key: String,
    pub resolution: u32,
    pub download_url: String,
    pub title: Option<String>,
    pub requested_by: String,
}

/// Filter for listing records.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    /// Only records in this status.
    pub status: Option<TorrentStatus>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: TorrentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

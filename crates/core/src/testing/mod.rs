//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service traits,
//! allowing refresh cycles and the request flow to be exercised without a
//! running torrent client or chat front end.
//!
//! # Example
//!
//! ```rust,ignore
//! use seedkeeper_core::testing::{fixtures, MockNotifier, MockTorrentClient};
//!
//! let client = MockTorrentClient::new();
//! client.add_mock_torrent(fixtures::torrent("abc", TorrentState::Downloading).build()).await;
//!
//! let notifier = MockNotifier::new();
//! // ... run a cycle ...
//! assert_eq!(notifier.sent().await.len(), 1);
//! ```

mod faulty_store;
mod mock_notifier;
mod mock_torrent_client;

pub use faulty_store::FaultyStore;
pub use mock_notifier::MockNotifier;
pub use mock_torrent_client::{MockTorrentClient, RecordedAdd, RecordedRemove};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeSet;

    use chrono::{DateTime, Utc};

    use crate::store::{CreateTorrentRequest, TorrentRecord, TorrentStatus};
    use crate::torrent_client::{TorrentInfo, TorrentState};

    /// Default payload size for fixture torrents.
    const TOTAL_BYTES: u64 = 2 * 1024 * 1024 * 1024;

    /// Start building a `requested` record asked for by `telegram:1`.
    pub fn record(torrent_id: i64, content_key: &str, resolution: u32) -> RecordBuilder {
        let now = Utc::now();
        RecordBuilder {
            record: TorrentRecord {
                torrent_id,
                content_hash: None,
                content_key: content_key.to_string(),
                resolution,
                status: TorrentStatus::Requested,
                requested_by: BTreeSet::from(["telegram:1".to_string()]),
                title: Some(format!("{} {}p", content_key, resolution)),
                download_url: format!("https://tracker.example/download/{}", torrent_id),
                seeding_since: None,
                completion_notified: false,
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Builder for [`TorrentRecord`] fixtures.
    #[derive(Debug, Clone)]
    pub struct RecordBuilder {
        record: TorrentRecord,
    }

    impl RecordBuilder {
        pub fn with_hash(mut self, hash: &str) -> Self {
            self.record.content_hash = Some(hash.to_lowercase());
            self
        }

        pub fn with_status(mut self, status: TorrentStatus) -> Self {
            self.record.status = status;
            self
        }

        /// Replace the requester set.
        pub fn requested_by(mut self, requesters: &[&str]) -> Self {
            self.record.requested_by = requesters.iter().map(|r| r.to_string()).collect();
            self
        }

        pub fn seeding_since(mut self, at: DateTime<Utc>) -> Self {
            self.record.seeding_since = Some(at);
            self
        }

        pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
            self.record.created_at = at;
            self.record.updated_at = at;
            self
        }

        pub fn notified(mut self) -> Self {
            self.record.completion_notified = true;
            self
        }

        pub fn build(self) -> TorrentRecord {
            self.record
        }
    }

    /// Start building a half-downloaded client torrent.
    pub fn torrent(hash: &str, state: TorrentState) -> TorrentBuilder {
        TorrentBuilder {
            info: TorrentInfo {
                hash: hash.to_lowercase(),
                name: format!("Torrent {}", hash),
                state,
                bytes_remaining: TOTAL_BYTES / 2,
                total_bytes: TOTAL_BYTES,
                completed_at: None,
            },
        }
    }

    /// Builder for [`TorrentInfo`] fixtures.
    #[derive(Debug, Clone)]
    pub struct TorrentBuilder {
        info: TorrentInfo,
    }

    impl TorrentBuilder {
        /// Payload fully on disk.
        pub fn finished(mut self) -> Self {
            self.info.bytes_remaining = 0;
            self
        }

        pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
            self.info.completed_at = Some(at);
            self
        }

        pub fn name(mut self, name: &str) -> Self {
            self.info.name = name.to_string();
            self
        }

        pub fn build(self) -> TorrentInfo {
            self.info
        }
    }

    /// A create request for a magnet carrying `hash`.
    pub fn create_request(
        torrent_id: i64,
        content_key: &str,
        resolution: u32,
        hash: &str,
        requester: &str,
    ) -> CreateTorrentRequest {
        CreateTorrentRequest {
            torrent_id,
            content_key: content_key.to_string(),
            resolution,
            download_url: format!("magnet:?xt=urn:btih:{}", hash),
            title: Some(format!("{} {}p", content_key, resolution)),
            requested_by: requester.to_string(),
        }
    }
}

//! Mock torrent client for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::torrent_client::{
    AddTorrentResult, TorrentClient, TorrentClientError, TorrentInfo, TorrentState,
};

/// Default payload size for torrents added through the mock.
const MOCK_TOTAL_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// A recorded torrent addition for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAdd {
    pub download_url: String,
    pub timestamp: DateTime<Utc>,
}

/// A recorded torrent removal for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRemove {
    pub hash: String,
    pub delete_files: bool,
}

/// Mock implementation of the TorrentClient trait.
///
/// Provides controllable behavior for testing:
/// - Track added and removed torrents for assertions
/// - Control torrent state and completion
/// - Simulate failures on any call, a specific list call, or one hash
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
/// client.add_mock_torrent(fixtures::torrent("abc", TorrentState::Downloading).build()).await;
///
/// client.complete("abc", Utc::now()).await;
/// assert!(client.list_torrents().await?[0].is_finished());
/// ```
#[derive(Debug, Default)]
pub struct MockTorrentClient {
    /// Current torrents by hash.
    torrents: Arc<RwLock<HashMap<String, TorrentInfo>>>,
    added: Arc<RwLock<Vec<RecordedAdd>>>,
    removed: Arc<RwLock<Vec<RecordedRemove>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<TorrentClientError>>>,
    /// `list_torrents` call numbers (1-based) that must fail.
    failing_list_calls: Arc<RwLock<HashSet<usize>>>,
    list_calls: Arc<RwLock<usize>>,
    /// Hashes whose removal fails.
    failing_removes: Arc<RwLock<HashSet<String>>>,
    hash_counter: Arc<RwLock<u32>>,
}

impl MockTorrentClient {
    /// Create a new mock torrent client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a torrent.
    pub async fn add_mock_torrent(&self, info: TorrentInfo) {
        self.torrents
            .write()
            .await
            .insert(info.hash.to_lowercase(), info);
    }

    /// Get all recorded add_torrent calls.
    pub async fn added_torrents(&self) -> Vec<RecordedAdd> {
        self.added.read().await.clone()
    }

    /// Get all recorded remove_torrent calls.
    pub async fn removed_torrents(&self) -> Vec<RecordedRemove> {
        self.removed.read().await.clone()
    }

    /// Forget recorded calls.
    pub async fn clear_recorded(&self) {
        self.added.write().await.clear();
        self.removed.write().await.clear();
    }

    /// Set the state for a torrent directly.
    pub async fn set_state(&self, hash: &str, state: TorrentState) {
        if let Some(torrent) = self.torrents.write().await.get_mut(hash) {
            torrent.state = state;
        }
    }

    /// Mark a torrent's payload complete and seeding.
    pub async fn complete(&self, hash: &str, completed_at: DateTime<Utc>) {
        if let Some(torrent) = self.torrents.write().await.get_mut(hash) {
            torrent.state = TorrentState::Seeding;
            torrent.bytes_remaining = 0;
            torrent.completed_at = Some(completed_at);
        }
    }

    /// Drop a torrent as if the user removed it in the client's own UI.
    pub async fn forget(&self, hash: &str) {
        self.torrents.write().await.remove(hash);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make the `n`-th `list_torrents` call from now fail (1-based).
    pub async fn fail_list_call(&self, n: usize) {
        let calls = *self.list_calls.read().await;
        self.failing_list_calls.write().await.insert(calls + n);
    }

    /// Make every removal of `hash` fail.
    pub async fn fail_remove(&self, hash: &str) {
        self.failing_removes.write().await.insert(hash.to_lowercase());
    }

    /// Check if a torrent exists.
    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.read().await.contains_key(hash)
    }

    /// Get the number of torrents.
    pub async fn torrent_count(&self) -> usize {
        self.torrents.read().await.len()
    }

    async fn take_error(&self) -> Option<TorrentClientError> {
        self.next_error.write().await.take()
    }

    async fn generate_hash(&self) -> String {
        let mut counter = self.hash_counter.write().await;
        *counter += 1;
        format!("mockhash{:08x}", *counter)
    }

    /// Extract info hash from magnet URI if present.
    fn extract_hash_from_magnet(uri: &str) -> Option<String> {
        uri.split(['?', '&'])
            .find_map(|part| part.strip_prefix("xt=urn:btih:"))
            .map(|h| h.to_lowercase())
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let call = {
            let mut calls = self.list_calls.write().await;
            *calls += 1;
            *calls
        };

        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        if self.failing_list_calls.write().await.remove(&call) {
            return Err(TorrentClientError::ConnectionFailed(
                "mock client unreachable".to_string(),
            ));
        }

        let mut result: Vec<TorrentInfo> = self.torrents.read().await.values().cloned().collect();
        result.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(result)
    }

    async fn add_torrent(&self, download_url: &str) -> Result<AddTorrentResult, TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.added.write().await.push(RecordedAdd {
            download_url: download_url.to_string(),
            timestamp: Utc::now(),
        });

        let hash = match Self::extract_hash_from_magnet(download_url) {
            Some(hash) => hash,
            None => self.generate_hash().await,
        };

        let mut torrents = self.torrents.write().await;
        if let Some(existing) = torrents.get(&hash) {
            return Ok(AddTorrentResult {
                hash,
                name: Some(existing.name.clone()),
                duplicate: true,
            });
        }

        let name = format!("Mock Torrent {}", &hash[..hash.len().min(8)]);
        torrents.insert(
            hash.clone(),
            TorrentInfo {
                hash: hash.clone(),
                name: name.clone(),
                state: TorrentState::Queued,
                bytes_remaining: MOCK_TOTAL_BYTES,
                total_bytes: MOCK_TOTAL_BYTES,
                completed_at: None,
            },
        );

        Ok(AddTorrentResult {
            hash,
            name: Some(name),
            duplicate: false,
        })
    }

    async fn remove_torrent(&self, hash: &str, delete_files: bool) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let hash = hash.to_lowercase();
        if self.failing_removes.read().await.contains(&hash) {
            return Err(TorrentClientError::ApiError(format!(
                "mock refused to remove {}",
                hash
            )));
        }

        self.removed.write().await.push(RecordedRemove {
            hash: hash.clone(),
            delete_files,
        });
        // Unknown hashes are a no-op, like the real client.
        self.torrents.write().await.remove(&hash);
        Ok(())
    }
}

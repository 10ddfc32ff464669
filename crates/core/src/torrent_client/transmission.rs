//! Transmission torrent client implementation (JSON-RPC over HTTP).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::TransmissionConfig;
use crate::metrics;

use super::{AddTorrentResult, TorrentClient, TorrentClientError, TorrentInfo, TorrentState};

/// Header carrying Transmission's CSRF token.
const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// Fields requested from `torrent-get`.
const TORRENT_FIELDS: &[&str] = &[
    "hashString",
    "name",
    "status",
    "error",
    "leftUntilDone",
    "sizeWhenDone",
    "doneDate",
];

/// Transmission client implementation.
pub struct TransmissionClient {
    client: Client,
    config: TransmissionConfig,
    /// Session id handed out by the daemon (refreshed on HTTP 409).
    session_id: RwLock<Option<String>>,
}

impl TransmissionClient {
    /// Create a new Transmission client.
    pub fn new(config: TransmissionConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| TorrentClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            session_id: RwLock::new(None),
        })
    }

    /// Send one RPC call, performing the session-id handshake when asked to.
    async fn rpc(&self, method: &str, arguments: Value) -> Result<Value, TorrentClientError> {
        let body = RpcRequest { method, arguments };
        let timer = metrics::CLIENT_REQUEST_DURATION
            .with_label_values(&[method])
            .start_timer();

        let mut response = self.send(&body).await?;

        if response.status() == StatusCode::CONFLICT {
            let session = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
                .ok_or_else(|| {
                    TorrentClientError::ApiError("409 without session id header".to_string())
                })?;
            debug!("Transmission session id refreshed");
            *self.session_id.write().await = Some(session);
            response = self.send(&body).await?;
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TorrentClientError::AuthenticationFailed(format!(
                "HTTP {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| TorrentClientError::ApiError(format!("Failed to parse response: {}", e)))?;
        timer.observe_duration();

        if parsed.result != "success" {
            return Err(TorrentClientError::ApiError(parsed.result));
        }

        Ok(parsed.arguments)
    }

    async fn send(&self, body: &RpcRequest<'_>) -> Result<reqwest::Response, TorrentClientError> {
        let mut request = self.client.post(&self.config.url).json(body);

        if let Some(ref username) = self.config.username {
            request = request.basic_auth(username, self.config.password.as_ref());
        }
        if let Some(ref session) = *self.session_id.read().await {
            request = request.header(SESSION_HEADER, session);
        }

        request
            .send()
            .await
            .map_err(TorrentClientError::from_reqwest)
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

/// Transmission torrent info response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrTorrentInfo {
    hash_string: String,
    name: String,
    status: i64,
    #[serde(default)]
    error: i64,
    #[serde(default)]
    left_until_done: i64,
    #[serde(default)]
    size_when_done: i64,
    #[serde(default)]
    done_date: i64,
}

impl TrTorrentInfo {
    fn into_torrent_info(self) -> TorrentInfo {
        // Tracker warnings and errors (1, 2) leave the payload usable.
        let state = if self.error == TR_LOCAL_ERROR {
            TorrentState::Error
        } else {
            parse_tr_status(self.status)
        };

        TorrentInfo {
            hash: self.hash_string.to_lowercase(),
            name: self.name,
            state,
            bytes_remaining: self.left_until_done.max(0) as u64,
            total_bytes: self.size_when_done.max(0) as u64,
            completed_at: timestamp_to_datetime(self.done_date),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrTorrentList {
    torrents: Vec<TrTorrentInfo>,
}

#[derive(Debug, Deserialize)]
struct TrAddedTorrent {
    #[serde(rename = "hashString")]
    hash_string: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrAddResult {
    #[serde(rename = "torrent-added")]
    added: Option<TrAddedTorrent>,
    #[serde(rename = "torrent-duplicate")]
    duplicate: Option<TrAddedTorrent>,
}

/// `error` value for a local failure (disk full, files missing).
const TR_LOCAL_ERROR: i64 = 3;

/// Map Transmission's numeric status to TorrentState.
fn parse_tr_status(status: i64) -> TorrentState {
    match status {
        0 => TorrentState::Stopped,
        1 | 2 => TorrentState::Checking,
        3 | 5 => TorrentState::Queued,
        4 => TorrentState::Downloading,
        6 => TorrentState::Seeding,
        _ => TorrentState::Unknown,
    }
}

/// Convert Unix timestamp to DateTime<Utc>.
fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

/// Transmission answers a failed add with a plain-text reason in `result`.
fn classify_add_error(e: TorrentClientError) -> TorrentClientError {
    match e {
        TorrentClientError::ApiError(msg)
            if msg.contains("invalid or corrupt") || msg.contains("unrecognized info") =>
        {
            TorrentClientError::InvalidTorrent(msg)
        }
        other => other,
    }
}

#[async_trait]
impl TorrentClient for TransmissionClient {
    fn name(&self) -> &str {
        "transmission"
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let arguments = self
            .rpc("torrent-get", json!({ "fields": TORRENT_FIELDS }))
            .await?;

        let list: TrTorrentList = serde_json::from_value(arguments).map_err(|e| {
            TorrentClientError::ApiError(format!("Failed to parse torrent list: {}", e))
        })?;

        Ok(list
            .torrents
            .into_iter()
            .map(TrTorrentInfo::into_torrent_info)
            .collect())
    }

    async fn add_torrent(&self, download_url: &str) -> Result<AddTorrentResult, TorrentClientError> {
        let mut arguments = json!({ "filename": download_url });
        if let Some(ref dir) = self.config.download_dir {
            arguments["download-dir"] = json!(dir);
        }

        let arguments = self
            .rpc("torrent-add", arguments)
            .await
            .map_err(classify_add_error)?;

        let result: TrAddResult = serde_json::from_value(arguments).map_err(|e| {
            TorrentClientError::ApiError(format!("Failed to parse add response: {}", e))
        })?;

        match (result.added, result.duplicate) {
            (Some(t), _) => Ok(AddTorrentResult {
                hash: t.hash_string.to_lowercase(),
                name: t.name,
                duplicate: false,
            }),
            (None, Some(t)) => {
                warn!(hash = %t.hash_string, "Transmission already had this torrent");
                Ok(AddTorrentResult {
                    hash: t.hash_string.to_lowercase(),
                    name: t.name,
                    duplicate: true,
                })
            }
            (None, None) => Err(TorrentClientError::ApiError(
                "torrent-add returned neither torrent-added nor torrent-duplicate".to_string(),
            )),
        }
    }

    async fn remove_torrent(&self, hash: &str, delete_files: bool) -> Result<(), TorrentClientError> {
        // Unknown hashes are silently ignored by the daemon.
        self.rpc(
            "torrent-remove",
            json!({
                "ids": [hash.to_lowercase()],
                "delete-local-data": delete_files,
            }),
        )
        .await?;

        Ok(())
    }
}

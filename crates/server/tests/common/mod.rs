//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling E2E testing without a running
//! Transmission daemon or chat front end.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use seedkeeper_core::{
    load_config_from_str, testing::{MockNotifier, MockTorrentClient}, IntakeService,
    RefreshScheduler, Refresher, SqliteTorrentStore,
};

/// Re-export fixtures for test convenience
pub use seedkeeper_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_download_request() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/downloads", json!({
///         "torrent_id": 1,
///         "download_url": "magnet:?xt=urn:btih:abc",
///         "content_key": "tt0110912",
///         "title": "Pulp Fiction 1080p",
///         "requester_id": "telegram:1"
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Store behind the router, for seeding and assertions
    pub store: Arc<SqliteTorrentStore>,
    /// Mock torrent client - control downloads
    pub torrent_client: Arc<MockTorrentClient>,
    /// Mock notifier - inspect delivered messages
    pub notifier: Arc<MockNotifier>,
    /// Scheduler wired into the app state (not started)
    pub scheduler: Arc<RefreshScheduler>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    /// Raw body, for non-JSON endpoints
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = load_config_from_str(&format!(
            r#"
[database]
path = "{}"

[transmission]
url = "http://127.0.0.1:9091/transmission/rpc"
password = "hunter2"

[refresher]
enabled = false
retention_days = 7

[notifier.telegram]
bot_token = "123:secret"
"#,
            db_path.display()
        ))
        .expect("Failed to parse test config");

        let store = Arc::new(SqliteTorrentStore::new(&db_path).expect("Failed to create store"));
        let torrent_client = Arc::new(MockTorrentClient::new());
        let notifier = Arc::new(MockNotifier::new());

        let intake = IntakeService::new(
            store.clone(),
            torrent_client.clone(),
            notifier.clone(),
        );
        let refresher = Arc::new(Refresher::new(
            config.refresher.clone(),
            store.clone(),
            torrent_client.clone(),
            notifier.clone(),
        ));
        let scheduler = Arc::new(RefreshScheduler::new(refresher));

        let state = Arc::new(seedkeeper_server::state::AppState::new(
            config,
            store.clone(),
            intake,
            Arc::clone(&scheduler),
        ));

        let router = seedkeeper_server::api::create_router(state);

        Self {
            router,
            store,
            torrent_client,
            notifier,
            scheduler,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

//! End-to-end tests with mocked external dependencies.
//!
//! These tests run the full router in-process with a mock torrent client
//! and a recording notifier in place of Transmission and Telegram.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use seedkeeper_core::{Notification, TorrentState, TorrentStatus, TorrentStore};

use common::{fixtures, TestFixture};

fn download_body(torrent_id: i64, title: &str, requester: &str) -> Value {
    json!({
        "torrent_id": torrent_id,
        "download_url": format!("magnet:?xt=urn:btih:{:040x}", torrent_id),
        "content_key": "tt0110912",
        "title": title,
        "requester_id": requester,
    })
}

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_hides_secrets() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["transmission"]["password_configured"], true);
    assert_eq!(response.body["notifier"]["telegram_configured"], true);
    assert_eq!(response.body["refresher"]["retention_days"], 7);
    assert!(!response.text.contains("hunter2"));
    assert!(!response.text.contains("123:secret"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture
        .store
        .upsert(&[
            fixtures::record(1, "tt1", 720).build(),
            fixtures::record(2, "tt2", 1080).build(),
            fixtures::record(3, "tt3", 1080)
                .with_status(TorrentStatus::Removed)
                .build(),
        ])
        .unwrap();
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.contains("seedkeeper_http_requests_total"));
    assert!(response
        .text
        .contains("seedkeeper_torrents_by_status{status=\"requested\"} 2"));
    assert!(response
        .text
        .contains("seedkeeper_torrents_by_status{status=\"removed\"} 1"));
}

// =============================================================================
// Download Requests
// =============================================================================

#[tokio::test]
async fn test_download_request_created() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/downloads",
            download_body(1, "Pulp.Fiction.1994.1080p.BluRay", "telegram:1"),
        )
        .await;

    assert_status!(response, StatusCode::CREATED);
    assert_eq!(response.body["created"], true);
    assert_eq!(response.body["torrent"]["torrent_id"], 1);
    assert_eq!(response.body["torrent"]["resolution"], 1080);
    assert_eq!(response.body["torrent"]["status"], "requested");
    assert_eq!(fixture.torrent_client.added_torrents().await.len(), 1);

    let sent = fixture.notifier.sent_to("telegram:1").await;
    assert!(matches!(sent.as_slice(), [Notification::DownloadQueued { .. }]));
}

#[tokio::test]
async fn test_download_request_already_tracked() {
    let fixture = TestFixture::new().await;
    fixture
        .post(
            "/api/v1/downloads",
            download_body(1, "Pulp.Fiction.1994.1080p", "telegram:1"),
        )
        .await;

    let response = fixture
        .post(
            "/api/v1/downloads",
            download_body(1, "Pulp.Fiction.1994.1080p", "telegram:2"),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["created"], false);
    assert_eq!(
        response.body["torrent"]["requested_by"],
        json!(["telegram:1", "telegram:2"])
    );
    assert_eq!(fixture.torrent_client.added_torrents().await.len(), 1);
}

#[tokio::test]
async fn test_download_request_without_resolution_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/downloads",
            download_body(1, "Pulp Fiction DVDRip", "telegram:1"),
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("resolution"));
}

#[tokio::test]
async fn test_download_request_client_failure() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .set_next_error(seedkeeper_core::TorrentClientError::ConnectionFailed(
            "refused".to_string(),
        ))
        .await;

    let response = fixture
        .post(
            "/api/v1/downloads",
            download_body(1, "Pulp.Fiction.1994.1080p", "telegram:1"),
        )
        .await;
    assert_status!(response, StatusCode::BAD_GATEWAY);

    let again = fixture
        .post(
            "/api/v1/downloads",
            download_body(1, "Pulp.Fiction.1994.1080p", "telegram:1"),
        )
        .await;
    assert_status!(again, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let fixture = TestFixture::new().await;
    let response = fixture.post_raw("/api/v1/downloads", "{not json").await;
    assert!(response.status.is_client_error());
}

// =============================================================================
// Completion Callback
// =============================================================================

#[tokio::test]
async fn test_finished_callback_notifies_once() {
    let fixture = TestFixture::new().await;
    fixture
        .post(
            "/api/v1/downloads",
            download_body(1, "Pulp.Fiction.1994.1080p", "telegram:1"),
        )
        .await;
    fixture.notifier.clear().await;

    let body = json!({
        "content_hash": format!("{:040x}", 1),
        "display_name": "Pulp Fiction (1994)",
    });
    let response = fixture.post("/api/v1/callbacks/finished", body.clone()).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["notified"], 1);

    let again = fixture.post("/api/v1/callbacks/finished", body).await;
    assert_eq!(again.body["notified"], 0);
}

#[tokio::test]
async fn test_finished_callback_unknown_hash() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post(
            "/api/v1/callbacks/finished",
            json!({ "content_hash": "deadbeef" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["notified"], 0);
}

// =============================================================================
// Records
// =============================================================================

#[tokio::test]
async fn test_get_torrent() {
    let fixture = TestFixture::new().await;
    fixture
        .store
        .upsert(&[fixtures::record(42, "tt1", 720).with_hash("abcd").build()])
        .unwrap();

    let response = fixture.get("/api/v1/torrents/42").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["content_hash"], "abcd");

    let missing = fixture.get("/api/v1/torrents/43").await;
    assert_status!(missing, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_torrents_by_status() {
    let fixture = TestFixture::new().await;
    fixture
        .store
        .upsert(&[
            fixtures::record(1, "tt1", 720).build(),
            fixtures::record(2, "tt2", 1080)
                .with_status(TorrentStatus::Seeding)
                .build(),
            fixtures::record(3, "tt3", 1080)
                .with_status(TorrentStatus::Seeding)
                .build(),
        ])
        .unwrap();

    let all = fixture.get("/api/v1/torrents").await;
    assert_eq!(all.body["torrents"].as_array().unwrap().len(), 3);

    let seeding = fixture.get("/api/v1/torrents?status=seeding").await;
    assert_status!(seeding, StatusCode::OK);
    assert_eq!(seeding.body["torrents"].as_array().unwrap().len(), 2);

    let page = fixture.get("/api/v1/torrents?limit=1&offset=1").await;
    assert_eq!(page.body["torrents"].as_array().unwrap().len(), 1);
    assert_eq!(page.body["limit"], 1);

    let bogus = fixture.get("/api/v1/torrents?status=paused").await;
    assert_status!(bogus, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Refresher
// =============================================================================

#[tokio::test]
async fn test_refresh_runs_cycle() {
    let fixture = TestFixture::new().await;
    fixture
        .store
        .upsert(&[
            fixtures::record(1, "tt1", 720)
                .with_hash("aaaa")
                .with_status(TorrentStatus::Downloading)
                .build(),
            fixtures::record(2, "tt1", 1080)
                .with_hash("bbbb")
                .with_status(TorrentStatus::Downloading)
                .build(),
        ])
        .unwrap();
    for hash in ["aaaa", "bbbb"] {
        fixture
            .torrent_client
            .add_mock_torrent(fixtures::torrent(hash, TorrentState::Downloading).build())
            .await;
    }

    let response = fixture.post_empty("/api/v1/refresh").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["duplicates_removed"], 1);
    assert_eq!(
        fixture.store.get(1).unwrap().unwrap().status,
        TorrentStatus::Removed
    );

    let status = fixture.get("/api/v1/refresh/status").await;
    assert_status!(status, StatusCode::OK);
    assert_eq!(status.body["scheduled"], false);
    assert_eq!(
        status.body["last_report"]["cycle_id"],
        response.body["cycle_id"]
    );
}

#[tokio::test]
async fn test_refresh_abort_is_unavailable() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .set_next_error(seedkeeper_core::TorrentClientError::Timeout)
        .await;

    let response = fixture.post_empty("/api/v1/refresh").await;
    assert_status!(response, StatusCode::SERVICE_UNAVAILABLE);

    let status = fixture.get("/api/v1/refresh/status").await;
    assert!(status.body["last_error"].is_string());
}

#[tokio::test]
async fn test_full_flow_through_api() {
    let fixture = TestFixture::new().await;
    fixture
        .post(
            "/api/v1/downloads",
            download_body(7, "Pulp.Fiction.1994.2160p", "telegram:1"),
        )
        .await;
    let hash = format!("{:040x}", 7);

    fixture.post_empty("/api/v1/refresh").await;
    let record = fixture.get("/api/v1/torrents/7").await;
    assert_eq!(record.body["status"], "downloading");

    fixture
        .torrent_client
        .complete(&hash, Utc::now() - Duration::days(8))
        .await;
    let report = fixture.post_empty("/api/v1/refresh").await;
    assert_eq!(report.body["expired"], 1);

    let record = fixture.get("/api/v1/torrents/7").await;
    assert_eq!(record.body["status"], "removed");
    assert!(!fixture.torrent_client.has_torrent(&hash).await);
}

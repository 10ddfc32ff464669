//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Refresh cycles (outcomes, duration, duplicates, transitions)
//! - Download intake and notifications
//! - The torrent client RPC

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Refresher
// =============================================================================

/// Refresh cycles total by result.
pub static REFRESH_CYCLES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("seedkeeper_refresh_cycles_total", "Total refresh cycles"),
        &["result"], // "completed", "aborted", "timed_out", "skipped"
    )
    .unwrap()
});

/// Refresh cycle duration in seconds.
pub static REFRESH_CYCLE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "seedkeeper_refresh_cycle_duration_seconds",
            "Duration of refresh cycles",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["result"],
    )
    .unwrap()
});

/// Lower-resolution duplicates removed from the client.
pub static DUPLICATES_REMOVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "seedkeeper_duplicates_removed_total",
        "Total duplicate torrents removed",
    )
    .unwrap()
});

/// Persisted status transitions by target status.
pub static STATUS_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "seedkeeper_status_transitions_total",
            "Torrent status transitions persisted by the refresher",
        ),
        &["to_status"],
    )
    .unwrap()
});

/// Batch upserts that failed after their retry.
pub static UPSERT_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "seedkeeper_upsert_failures_total",
        "Batch upserts that failed after retry",
    )
    .unwrap()
});

// =============================================================================
// Intake & notifications
// =============================================================================

/// Download requests by outcome.
pub static DOWNLOAD_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "seedkeeper_download_requests_total",
            "Total download requests",
        ),
        &["outcome"], // "created", "already_tracked", "rejected", "failed"
    )
    .unwrap()
});

/// Notifications by kind and result.
pub static NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("seedkeeper_notifications_total", "Total notifications"),
        &["kind", "result"], // result: "sent", "failed"
    )
    .unwrap()
});

// =============================================================================
// Torrent client
// =============================================================================

/// Torrent client RPC duration by method.
pub static CLIENT_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "seedkeeper_client_request_duration_seconds",
            "Duration of torrent client RPC calls",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Refresher
        Box::new(REFRESH_CYCLES.clone()),
        Box::new(REFRESH_CYCLE_DURATION.clone()),
        Box::new(DUPLICATES_REMOVED.clone()),
        Box::new(STATUS_TRANSITIONS.clone()),
        Box::new(UPSERT_FAILURES.clone()),
        // Intake & notifications
        Box::new(DOWNLOAD_REQUESTS.clone()),
        Box::new(NOTIFICATIONS.clone()),
        // Torrent client
        Box::new(CLIENT_REQUEST_DURATION.clone()),
    ]
}

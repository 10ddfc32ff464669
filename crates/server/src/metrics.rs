//! Prometheus metrics for the HTTP relay.
//!
//! Request metrics are recorded by the middleware; record and scheduler
//! gauges are refreshed from application state each time `/metrics` is
//! scraped. Refresher and notifier counters live in the core crate and are
//! registered here.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use seedkeeper_core::TorrentStatus;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "seedkeeper_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("seedkeeper_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "seedkeeper_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// State Metrics (collected dynamically)
// =============================================================================

/// Records by current status.
pub static TORRENTS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "seedkeeper_torrents_by_status",
            "Current torrent record count by status",
        ),
        &["status"],
    )
    .unwrap()
});

/// Scheduler running state (1 = running, 0 = stopped).
pub static REFRESHER_SCHEDULED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "seedkeeper_refresher_scheduled",
        "Whether the periodic refresher is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Unix time of the last finished cycle, successful or not.
pub static REFRESHER_LAST_RUN: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "seedkeeper_refresher_last_run_timestamp_seconds",
        "Unix time the last refresh cycle finished",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // State
    registry
        .register(Box::new(TORRENTS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(REFRESHER_SCHEDULED.clone()))
        .unwrap();
    registry
        .register(Box::new(REFRESHER_LAST_RUN.clone()))
        .unwrap();

    // Core metrics (refresher, intake, notifier, torrent client)
    for metric in seedkeeper_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.scheduler().status().await;
    REFRESHER_SCHEDULED.set(if status.scheduled { 1 } else { 0 });
    if let Some(last_run) = status.last_run_at {
        REFRESHER_LAST_RUN.set(last_run.timestamp());
    }

    if let Ok(counts) = state.store().count_by_status() {
        for torrent_status in [
            TorrentStatus::Requested,
            TorrentStatus::Downloading,
            TorrentStatus::Seeding,
            TorrentStatus::Removed,
        ] {
            TORRENTS_BY_STATUS
                .with_label_values(&[torrent_status.as_str()])
                .set(counts.get(&torrent_status).copied().unwrap_or(0));
        }
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let hash_regex = regex_lite::Regex::new(r"[0-9a-fA-F]{40}").unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = hash_regex.replace_all(path, "{hash}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

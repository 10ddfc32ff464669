use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{downloads, handlers, middleware::metrics_middleware, refresh, torrents};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Intake
        .route("/downloads", post(downloads::request_download))
        .route("/callbacks/finished", post(downloads::torrent_finished))
        // Records
        .route("/torrents", get(torrents::list_torrents))
        .route("/torrents/{torrent_id}", get(torrents::get_torrent))
        // Refresher
        .route("/refresh", post(refresh::trigger_refresh))
        .route("/refresh/status", get(refresh::get_status))
        .layer(middleware::from_fn(metrics_middleware));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

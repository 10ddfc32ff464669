use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seedkeeper_core::{
    load_config, validate_config, IntakeService, Notifier, RefreshScheduler, Refresher,
    RoutingNotifier, SqliteTorrentStore, TorrentClient, TorrentStore, TransmissionClient,
};
use seedkeeper_server::api::create_router;
use seedkeeper_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("SEEDKEEPER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    let store: Arc<dyn TorrentStore> = Arc::new(
        SqliteTorrentStore::open(&config.database).context("Failed to open torrent store")?,
    );
    info!("Torrent store initialized");

    info!("Initializing Transmission client at {}", config.transmission.url);
    let client: Arc<dyn TorrentClient> = Arc::new(
        TransmissionClient::new(config.transmission.clone())
            .context("Failed to create Transmission client")?,
    );

    let routing = RoutingNotifier::from_config(&config.notifier)
        .context("Failed to create notifier")?;
    info!(
        default_channel = config.notifier.default_channel.as_str(),
        channels = ?routing.configured_channels(),
        "Notifier initialized"
    );
    let notifier: Arc<dyn Notifier> = Arc::new(routing);

    let intake = IntakeService::new(
        Arc::clone(&store),
        Arc::clone(&client),
        Arc::clone(&notifier),
    );

    let refresher = Arc::new(Refresher::new(
        config.refresher.clone(),
        Arc::clone(&store),
        Arc::clone(&client),
        Arc::clone(&notifier),
    ));
    let scheduler = Arc::new(RefreshScheduler::new(refresher));

    if config.refresher.enabled {
        scheduler.start();
    } else {
        info!("Periodic refresher disabled in config");
    }

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        intake,
        Arc::clone(&scheduler),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if scheduler.is_running() {
        scheduler.stop();
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub mod config;
pub mod intake;
pub mod metrics;
pub mod notifier;
pub mod refresher;
pub mod store;
pub mod testing;
pub mod torrent_client;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    SanitizedConfig, ServerConfig, TransmissionConfig,
};
pub use intake::{DownloadRequest, FinishedTorrent, IntakeService, RequestError, RequestOutcome};
pub use notifier::{
    deliver, ChannelKind, Notification, Notifier, NotifierConfig, NotifyError, RoutingNotifier,
};
pub use refresher::{
    CycleReport, RefreshError, RefreshScheduler, Refresher, RefresherConfig, RefresherStatus,
    Transition,
};
pub use store::{
    CreateTorrentRequest, RecordFilter, SqliteTorrentStore, StoreError, TorrentRecord,
    TorrentStatus, TorrentStore,
};
pub use torrent_client::{
    AddTorrentResult, TorrentClient, TorrentClientError, TorrentInfo, TorrentState,
    TransmissionClient,
};

use std::sync::Arc;

use seedkeeper_core::{
    Config, IntakeService, RefreshScheduler, Refresher, SanitizedConfig, TorrentStore,
};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn TorrentStore>,
    intake: IntakeService,
    scheduler: Arc<RefreshScheduler>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn TorrentStore>,
        intake: IntakeService,
        scheduler: Arc<RefreshScheduler>,
    ) -> Self {
        Self {
            config,
            store,
            intake,
            scheduler,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &dyn TorrentStore {
        self.store.as_ref()
    }

    pub fn intake(&self) -> &IntakeService {
        &self.intake
    }

    pub fn refresher(&self) -> &Arc<Refresher> {
        self.scheduler.refresher()
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        self.scheduler.as_ref()
    }
}

//! Refresher configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the periodic refresh cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefresherConfig {
    /// Run cycles on a timer. When disabled, cycles only run via the API.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between two scheduled cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// How long a finished torrent keeps seeding before it is removed.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// A cycle running longer than this is abandoned. Must not exceed the interval.
    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout_secs: u64,

    /// A `requested` record without a content hash younger than this is left
    /// alone: the request flow may still be waiting on the client.
    #[serde(default = "default_request_grace")]
    pub request_grace_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    3600 // 1 hour
}

fn default_retention_days() -> u32 {
    7
}

fn default_cycle_timeout() -> u64 {
    600 // 10 minutes
}

fn default_request_grace() -> u64 {
    300 // 5 minutes
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            retention_days: default_retention_days(),
            cycle_timeout_secs: default_cycle_timeout(),
            request_grace_secs: default_request_grace(),
        }
    }
}

impl RefresherConfig {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days as i64)
    }

    pub fn request_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.request_grace_secs as i64)
    }
}

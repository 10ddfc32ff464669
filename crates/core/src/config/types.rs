use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::notifier::NotifierConfig;
use crate::refresher::RefresherConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub transmission: TransmissionConfig,
    #[serde(default)]
    pub refresher: RefresherConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// How long a write waits on a locked database before failing.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("seedkeeper.db")
}

fn default_busy_timeout() -> u64 {
    5000
}

/// Transmission RPC configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransmissionConfig {
    /// RPC endpoint (e.g., "http://localhost:9091/transmission/rpc")
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Download directory passed with every add (client default when unset)
    #[serde(default)]
    pub download_dir: Option<String>,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    10
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub transmission: SanitizedTransmissionConfig,
    pub refresher: RefresherConfig,
    pub notifier: SanitizedNotifierConfig,
}

/// Sanitized Transmission config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTransmissionConfig {
    pub url: String,
    pub username: Option<String>,
    pub password_configured: bool,
    pub download_dir: Option<String>,
    pub timeout_secs: u32,
}

/// Sanitized notifier config (tokens hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedNotifierConfig {
    pub default_channel: String,
    pub telegram_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            transmission: SanitizedTransmissionConfig {
                url: config.transmission.url.clone(),
                username: config.transmission.username.clone(),
                password_configured: config
                    .transmission
                    .password
                    .as_ref()
                    .is_some_and(|p| !p.is_empty()),
                download_dir: config.transmission.download_dir.clone(),
                timeout_secs: config.transmission.timeout_secs,
            },
            refresher: config.refresher.clone(),
            notifier: SanitizedNotifierConfig {
                default_channel: config.notifier.default_channel.as_str().to_string(),
                telegram_configured: config
                    .notifier
                    .telegram
                    .as_ref()
                    .is_some_and(|t| !t.bot_token.is_empty()),
                webhook_url: config.notifier.webhook.as_ref().map(|w| w.url.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{ChannelKind, TelegramConfig};

    const MINIMAL: &str = r#"
[transmission]
url = "http://localhost:9091/transmission/rpc"
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "seedkeeper.db");
        assert_eq!(config.transmission.timeout_secs, 10);
        assert!(config.transmission.username.is_none());
        assert!(config.refresher.enabled);
        assert_eq!(config.notifier.default_channel, ChannelKind::Log);
    }

    #[test]
    fn test_deserialize_missing_transmission_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/data/seedkeeper.sqlite"

[transmission]
url = "http://nas:9091/transmission/rpc"
username = "admin"
password = "hunter2"
download_dir = "/downloads/movies"
timeout_secs = 5

[refresher]
interval_secs = 1800
retention_days = 7

[notifier]
default_channel = "telegram"

[notifier.telegram]
bot_token = "123:abc"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.database.path.to_str().unwrap(),
            "/data/seedkeeper.sqlite"
        );
        assert_eq!(config.transmission.username.as_deref(), Some("admin"));
        assert_eq!(config.transmission.timeout_secs, 5);
        assert_eq!(config.refresher.interval_secs, 1800);
        assert_eq!(config.refresher.retention_days, 7);
        assert_eq!(config.notifier.default_channel, ChannelKind::Telegram);
        assert_eq!(config.notifier.telegram.unwrap().bot_token, "123:abc");
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.transmission.password = Some("secret".to_string());
        config.notifier.telegram = Some(TelegramConfig {
            bot_token: "123:secret".to_string(),
            api_url: "https://api.telegram.org".to_string(),
            timeout_secs: 10,
        });

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.transmission.password_configured);
        assert!(sanitized.notifier.telegram_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }
}

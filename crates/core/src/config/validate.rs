use super::{types::Config, ConfigError};
use crate::notifier::ChannelKind;

/// Validate configuration.
///
/// Checks the things serde cannot: non-zero port and intervals, a usable
/// Transmission URL, and that the default notification channel is configured.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let url = config.transmission.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "transmission.url must be an http(s) URL, got {:?}",
            config.transmission.url
        )));
    }

    if config.transmission.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transmission.timeout_secs cannot be 0".to_string(),
        ));
    }

    let refresher = &config.refresher;
    if refresher.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "refresher.interval_secs cannot be 0".to_string(),
        ));
    }
    if refresher.cycle_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "refresher.cycle_timeout_secs cannot be 0".to_string(),
        ));
    }
    if refresher.cycle_timeout_secs > refresher.interval_secs {
        return Err(ConfigError::ValidationError(format!(
            "refresher.cycle_timeout_secs ({}) must not exceed refresher.interval_secs ({})",
            refresher.cycle_timeout_secs, refresher.interval_secs
        )));
    }

    let notifier = &config.notifier;
    match notifier.default_channel {
        ChannelKind::Telegram if notifier.telegram.is_none() => {
            return Err(ConfigError::ValidationError(
                "notifier.default_channel is telegram but [notifier.telegram] is missing"
                    .to_string(),
            ));
        }
        ChannelKind::Webhook if notifier.webhook.is_none() => {
            return Err(ConfigError::ValidationError(
                "notifier.default_channel is webhook but [notifier.webhook] is missing"
                    .to_string(),
            ));
        }
        _ => {}
    }

    Ok(())
}

//! Notifier configuration.

use serde::{Deserialize, Serialize};

/// A front end requesters can be reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Write the message to the log only.
    #[default]
    Log,
    /// Telegram Bot API.
    Telegram,
    /// JSON POST to a bridge (WhatsApp gateway, home automation...).
    Webhook,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Log => "log",
            ChannelKind::Telegram => "telegram",
            ChannelKind::Webhook => "webhook",
        }
    }

    /// Parse a requester prefix such as `telegram` in `telegram:42`.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "log" => Some(ChannelKind::Log),
            "telegram" => Some(ChannelKind::Telegram),
            "webhook" => Some(ChannelKind::Webhook),
            _ => None,
        }
    }
}

/// Notifier configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Channel for requester ids without a `channel:` prefix.
    #[serde(default)]
    pub default_channel: ChannelKind,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Base URL (default: https://api.telegram.org).
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

/// Webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint receiving one JSON POST per notification.
    pub url: String,
    /// Sent as a bearer token when set.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

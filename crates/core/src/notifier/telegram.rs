//! Telegram Bot API notifier.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Notification, Notifier, NotifyError, TelegramConfig};

/// Sends messages through a Telegram bot.
///
/// Recipients are chat ids.
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        if config.bot_token.is_empty() {
            return Err(NotifyError::NotConfigured(
                "Telegram bot token is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(NotifyError::from_reqwest)?;

        let endpoint = format!(
            "{}/bot{}/sendMessage",
            config.api_url.trim_end_matches('/'),
            config.bot_token
        );

        Ok(Self { client, endpoint })
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn notify(
        &self,
        requester: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        if requester.is_empty() {
            return Err(NotifyError::InvalidRecipient("empty chat id".to_string()));
        }

        debug!(chat_id = %requester, kind = notification.kind(), "Telegram sendMessage");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: requester,
                text: notification.message(),
            })
            .send()
            .await
            .map_err(NotifyError::from_reqwest)?;

        let status = response.status();
        // Telegram reports failures in the body as well, so parse before checking status.
        let body: Option<TelegramResponse> = response.json().await.ok();

        match body {
            Some(TelegramResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(TelegramResponse {
                description: Some(description),
                ..
            }) => Err(NotifyError::DeliveryFailed(format!(
                "HTTP {}: {}",
                status, description
            ))),
            _ => Err(NotifyError::DeliveryFailed(format!("HTTP {}", status))),
        }
    }
}

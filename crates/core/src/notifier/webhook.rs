//! Generic JSON webhook notifier.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{Notification, Notifier, NotifyError, WebhookConfig};

/// POSTs every notification as JSON to a bridge endpoint.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    secret: Option<String>,
}

/// Body of one webhook call.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    recipient: &'a str,
    #[serde(flatten)]
    notification: &'a Notification,
    message: String,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Result<Self, NotifyError> {
        if config.url.is_empty() {
            return Err(NotifyError::NotConfigured("webhook url is required".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(NotifyError::from_reqwest)?;

        Ok(Self {
            client,
            url: config.url.clone(),
            secret: config.secret.clone(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(
        &self,
        requester: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        debug!(recipient = %requester, kind = notification.kind(), "Webhook POST");

        let mut request = self.client.post(&self.url).json(&WebhookPayload {
            recipient: requester,
            notification,
            message: notification.message(),
        });
        if let Some(ref secret) = self.secret {
            request = request.bearer_auth(secret);
        }

        let response = request.send().await.map_err(NotifyError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::DeliveryFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

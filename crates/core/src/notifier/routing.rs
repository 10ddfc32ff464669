//! Dispatch to the front end a requester came from.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{
    ChannelKind, LogNotifier, Notification, Notifier, NotifierConfig, NotifyError,
    TelegramNotifier, WebhookNotifier,
};

/// Routes `channel:id` requesters to the matching notifier.
///
/// Ids without a channel prefix go to the default channel.
pub struct RoutingNotifier {
    default_channel: ChannelKind,
    channels: HashMap<ChannelKind, Arc<dyn Notifier>>,
}

impl RoutingNotifier {
    /// Create a router with only the log channel registered.
    pub fn new(default_channel: ChannelKind) -> Self {
        let mut channels: HashMap<ChannelKind, Arc<dyn Notifier>> = HashMap::new();
        channels.insert(ChannelKind::Log, Arc::new(LogNotifier::new()));
        Self {
            default_channel,
            channels,
        }
    }

    /// Register (or replace) the notifier for a channel.
    pub fn with_channel(mut self, kind: ChannelKind, notifier: Arc<dyn Notifier>) -> Self {
        self.channels.insert(kind, notifier);
        self
    }

    /// Build the router from config, registering every configured front end.
    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        let mut router = Self::new(config.default_channel);

        if let Some(ref telegram) = config.telegram {
            router = router.with_channel(
                ChannelKind::Telegram,
                Arc::new(TelegramNotifier::new(telegram)?),
            );
        }
        if let Some(ref webhook) = config.webhook {
            router = router.with_channel(
                ChannelKind::Webhook,
                Arc::new(WebhookNotifier::new(webhook)?),
            );
        }

        Ok(router)
    }

    /// Channels that can currently deliver.
    pub fn configured_channels(&self) -> Vec<ChannelKind> {
        let mut kinds: Vec<ChannelKind> = self.channels.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    /// Split a requester id into its channel and the channel-local address.
    fn resolve<'a>(&self, requester: &'a str) -> Result<(ChannelKind, &'a str), NotifyError> {
        match requester.split_once(':') {
            Some((prefix, address))
                if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_lowercase()) =>
            {
                let kind = ChannelKind::from_prefix(prefix)
                    .ok_or_else(|| NotifyError::UnknownChannel(prefix.to_string()))?;
                Ok((kind, address))
            }
            _ => Ok((self.default_channel, requester)),
        }
    }
}

#[async_trait]
impl Notifier for RoutingNotifier {
    fn name(&self) -> &str {
        "router"
    }

    async fn notify(
        &self,
        requester: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let (kind, address) = self.resolve(requester)?;
        let notifier = self
            .channels
            .get(&kind)
            .ok_or_else(|| NotifyError::NotConfigured(kind.as_str().to_string()))?;

        notifier.notify(address, notification).await
    }
}

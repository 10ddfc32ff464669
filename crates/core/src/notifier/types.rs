//! Notification types and the notifier trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics;

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Unknown notification channel: {0}")]
    UnknownChannel(String),

    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Request timeout")]
    Timeout,
}

impl NotifyError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NotifyError::Timeout
        } else {
            NotifyError::DeliveryFailed(e.to_string())
        }
    }
}

/// A message for one requester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// The payload is fully downloaded and available.
    DownloadFinished { title: String },
    /// The torrent was handed to the client.
    DownloadQueued { title: String },
    /// A lower-resolution copy was dropped in favour of another one.
    DuplicateReplaced { title: String, kept_resolution: u32 },
}

impl Notification {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::DownloadFinished { .. } => "download_finished",
            Notification::DownloadQueued { .. } => "download_queued",
            Notification::DuplicateReplaced { .. } => "duplicate_replaced",
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Notification::DownloadFinished { title }
            | Notification::DownloadQueued { title }
            | Notification::DuplicateReplaced { title, .. } => title,
        }
    }

    /// Human-readable text.
    pub fn message(&self) -> String {
        match self {
            Notification::DownloadFinished { title } => {
                format!("Download finished: {} is ready to watch.", title)
            }
            Notification::DownloadQueued { title } => {
                format!("Download started: {}. You will be told when it is done.", title)
            }
            Notification::DuplicateReplaced {
                title,
                kept_resolution,
            } => format!(
                "{} was dropped because a {}p copy of the same title is already available.",
                title, kept_resolution
            ),
        }
    }
}

/// Trait for notification front ends.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logging.
    fn name(&self) -> &str;

    /// Deliver one notification to one requester.
    async fn notify(&self, requester: &str, notification: &Notification)
        -> Result<(), NotifyError>;
}

/// Deliver a notification, logging any failure instead of returning it.
///
/// Returns whether the message went out.
pub async fn deliver(notifier: &dyn Notifier, requester: &str, notification: &Notification) -> bool {
    match notifier.notify(requester, notification).await {
        Ok(()) => {
            debug!(
                requester = %requester,
                kind = notification.kind(),
                channel = notifier.name(),
                "Notification sent"
            );
            metrics::NOTIFICATIONS
                .with_label_values(&[notification.kind(), "sent"])
                .inc();
            true
        }
        Err(e) => {
            warn!(
                requester = %requester,
                kind = notification.kind(),
                channel = notifier.name(),
                error = %e,
                "Notification delivery failed"
            );
            metrics::NOTIFICATIONS
                .with_label_values(&[notification.kind(), "failed"])
                .inc();
            false
        }
    }
}

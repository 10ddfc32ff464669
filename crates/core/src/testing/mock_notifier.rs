//! Mock notifier for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notifier::{Notification, Notifier, NotifyError};

/// Records every delivered notification.
#[derive(Debug, Default)]
pub struct MockNotifier {
    sent: Arc<RwLock<Vec<(String, Notification)>>>,
    /// Requesters whose delivery fails.
    failing: Arc<RwLock<HashSet<String>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in order.
    pub async fn sent(&self) -> Vec<(String, Notification)> {
        self.sent.read().await.clone()
    }

    /// Notifications delivered to one requester.
    pub async fn sent_to(&self, requester: &str) -> Vec<Notification> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|(r, _)| r == requester)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Make delivery to this requester fail.
    pub async fn fail_for(&self, requester: &str) {
        self.failing.write().await.insert(requester.to_string());
    }

    pub async fn clear(&self) {
        self.sent.write().await.clear();
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn notify(
        &self,
        requester: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        if self.failing.read().await.contains(requester) {
            return Err(NotifyError::DeliveryFailed(format!(
                "mock delivery to {} failed",
                requester
            )));
        }

        self.sent
            .write()
            .await
            .push((requester.to_string(), notification.clone()));
        Ok(())
    }
}

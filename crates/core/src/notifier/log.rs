//! Notifier that only writes to the log.

use async_trait::async_trait;
use tracing::info;

use super::{Notification, Notifier, NotifyError};

/// Used when no front end is configured, so messages still leave a trace.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(
        &self,
        requester: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        info!(
            requester = %requester,
            kind = notification.kind(),
            "{}",
            notification.message()
        );
        Ok(())
    }
}

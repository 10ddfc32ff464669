//! Requester notifications.
//!
//! Delivery failures never propagate into the refresh cycle; callers go
//! through [`deliver`], which logs and counts them.

mod config;
mod log;
mod routing;
mod telegram;
mod types;
mod webhook;

pub use config::{ChannelKind, NotifierConfig, TelegramConfig, WebhookConfig};
pub use log::LogNotifier;
pub use routing::RoutingNotifier;
pub use telegram::TelegramNotifier;
pub use types::{deliver, Notification, Notifier, NotifyError};
pub use webhook::WebhookNotifier;

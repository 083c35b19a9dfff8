use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

pub mod slack;
pub mod webhook;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Notification rejected by provider: {0}")]
    Rejected(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Templating error: {0}")]
    TemplatingError(String),
}

/// A transport for already-rendered notifications.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Sends a notification.
    ///
    /// # Arguments
    ///
    /// * `destination` - Where to deliver: a Slack channel, or a webhook URL.
    /// * `message` - The rendered, human-readable message.
    /// * `context` - Key-value pairs for senders that support templating (e.g. "app_name": "shop").
    async fn send(
        &self,
        destination: &str,
        message: &str,
        context: &HashMap<String, String>,
    ) -> Result<(), SenderError>;
}

use async_trait::async_trait;
use tracing::info;

use super::formatter::{alert_context, format_alert};
use super::senders::{NotificationSender, SenderError, slack::SlackSender, webhook::WebhookSender};
use crate::alerting::events::AlertEvent;
use crate::server::config::{NotifierKind, ServerConfig};

/// Delivers one alert event to a destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &str, event: &AlertEvent) -> Result<(), SenderError>;
}

/// Renders alert events and hands them to the configured sender.
pub struct NotificationService {
    sender: Box<dyn NotificationSender>,
}

impl NotificationService {
    pub fn new(sender: Box<dyn NotificationSender>) -> Self {
        Self { sender }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, SenderError> {
        let sender: Box<dyn NotificationSender> = match config.notifier {
            NotifierKind::Slack => {
                let token = config.slack_bot_token.clone().ok_or_else(|| {
                    SenderError::InvalidConfiguration("Slack bot token is not configured.".to_string())
                })?;
                Box::new(SlackSender::new(
                    token,
                    config.slack_api_url.clone(),
                    config.request_timeout(),
                )?)
            }
            NotifierKind::Webhook => Box::new(WebhookSender::new(
                config.webhook_body_template.clone(),
                config.request_timeout(),
            )?),
        };
        Ok(Self::new(sender))
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn send(&self, destination: &str, event: &AlertEvent) -> Result<(), SenderError> {
        let message = format_alert(event);
        let context = alert_context(event, &message);
        self.sender.send(destination, &message, &context).await?;

        info!(
            app_name = %event.app_name(),
            kind = %event.kind(),
            destination = %destination,
            "Alert notification sent."
        );
        Ok(())
    }
}

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::{NotificationSender, SenderError};

/// A sender for posting messages through the Slack Web API (`chat.postMessage`).
pub struct SlackSender {
    client: Client,
    api_url: String,
    bot_token: String,
}

impl SlackSender {
    pub fn new(
        bot_token: impl Into<String>,
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SenderError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        })
    }
}

#[derive(Serialize)]
struct SlackMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

/// Slack answers 200 even for rejected calls; the verdict is in `ok`.
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

fn check_response(response: SlackResponse) -> Result<(), SenderError> {
    if response.ok {
        Ok(())
    } else {
        Err(SenderError::Rejected(
            response.error.unwrap_or_else(|| "unknown_error".to_string()),
        ))
    }
}

#[async_trait]
impl NotificationSender for SlackSender {
    async fn send(
        &self,
        destination: &str,
        message: &str,
        _context: &HashMap<String, String>, // Slack messages are pre-rendered
    ) -> Result<(), SenderError> {
        if destination.trim().is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "Slack channel must not be empty.".to_string(),
            ));
        }

        let api_url = format!("{}/chat.postMessage", self.api_url);
        let payload = SlackMessage {
            channel: destination,
            text: message,
        };

        let response = self
            .client
            .post(&api_url)
            .bearer_auth(&self.bot_token)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Slack API returned non-success status: {status}. Body: {error_body}"
            )));
        }

        check_response(response.json::<SlackResponse>().await?)
    }
}

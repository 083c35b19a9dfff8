use async_trait::async_trait;
use reqwest::{Client, header};
use std::collections::HashMap;
use std::time::Duration;
use tera::{Context, Tera};

use super::{NotificationSender, SenderError};

/// Posts `{"text": <message>}` unless a custom template is configured.
pub const DEFAULT_BODY_TEMPLATE: &str = r#"{"text": {{ message | json_encode() | safe }}}"#;

/// A sender for pushing notifications via a custom webhook. The destination is the URL.
pub struct WebhookSender {
    client: Client,
    body_template: String,
}

impl WebhookSender {
    pub fn new(body_template: Option<String>, timeout: Duration) -> Result<Self, SenderError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            body_template: body_template.unwrap_or_else(|| DEFAULT_BODY_TEMPLATE.to_string()),
        })
    }
}

/// Renders a JSON body. Autoescape stays off: the output is JSON, not HTML.
pub fn render_body(
    template: &str,
    message: &str,
    context: &HashMap<String, String>,
) -> Result<String, SenderError> {
    let mut tera_context = Context::new();
    for (key, value) in context {
        tera_context.insert(key, value);
    }
    tera_context.insert("message", message);

    Tera::one_off(template, &tera_context, false)
        .map_err(|e| SenderError::TemplatingError(e.to_string()))
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(
        &self,
        destination: &str,
        message: &str,
        context: &HashMap<String, String>,
    ) -> Result<(), SenderError> {
        let url = reqwest::Url::parse(destination).map_err(|e| {
            SenderError::InvalidConfiguration(format!("Invalid webhook URL '{destination}': {e}"))
        })?;
        let rendered_body = render_body(&self.body_template, message, context)?;

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(rendered_body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}

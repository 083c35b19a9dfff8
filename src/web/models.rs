use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alerting::SchedulerState;
use crate::monitoring::RuntimeConfig;
use crate::server::config::NotifierKind;

/// Dashboard form. Fields arrive as raw strings so blank and malformed input
/// can be reported back instead of rejected by the extractor.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigForm {
    pub app_name: String,
    pub slack_channel: String,
    pub check_interval: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DashboardQuery {
    pub success: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub monitored_app: Option<String>,
    pub notify_destination: Option<String>,
    pub interval_minutes: Option<u32>,
    pub monitoring_active: bool,
}

impl From<Option<&RuntimeConfig>> for ConfigResponse {
    fn from(config: Option<&RuntimeConfig>) -> Self {
        Self {
            monitored_app: config.map(|c| c.monitored_app().to_string()),
            notify_destination: config.map(|c| c.notify_destination().to_string()),
            interval_minutes: config.map(RuntimeConfig::interval_minutes),
            monitoring_active: config.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub monitored_app: Option<String>,
    pub notify_destination: Option<String>,
    pub interval_minutes: Option<u32>,
    pub monitoring_active: bool,
    pub scheduler_state: SchedulerState,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub heroku_api_configured: bool,
    pub slack_configured: bool,
    pub database_configured: bool,
    pub notifier: NotifierKind,
    pub monitored_app: Option<String>,
    pub notify_destination: Option<String>,
    pub interval_minutes: Option<u32>,
}

/// Slash command payload, form-encoded by Slack.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SlashCommand {
    pub command: String,
    pub text: String,
    pub response_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackReply {
    pub response_type: String,
    pub text: String,
}

impl SlackReply {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: "ephemeral".to_string(),
            text: text.into(),
        }
    }

    pub fn in_channel(text: impl Into<String>) -> Self {
        Self {
            response_type: "in_channel".to_string(),
            text: text.into(),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Environment(#[from] envy::Error),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Unsupported notifier '{0}', expected 'slack' or 'webhook'")]
    UnsupportedNotifier(String),
}

/// Which outbound channel alert events are delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Slack,
    Webhook,
}

impl FromStr for NotifierKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slack" => Ok(NotifierKind::Slack),
            "webhook" => Ok(NotifierKind::Webhook),
            other => Err(ConfigError::UnsupportedNotifier(other.to_string())),
        }
    }
}

/// Static process configuration, read once at startup.
///
/// The monitored app, destination and interval here only seed the runtime
/// configuration; later changes go through
/// [`RuntimeConfigHandle`](crate::monitoring::runtime_config::RuntimeConfigHandle).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub heroku_api_key: String,
    pub slack_bot_token: Option<String>,
    pub database_url: Option<String>,
    pub port: u16,
    pub log_dir: String,
    pub monitored_app_name: Option<String>,
    pub slack_channel: String,
    pub check_interval_minutes: u32,
    pub heroku_api_url: String,
    pub slack_api_url: String,
    pub notifier: NotifierKind,
    pub webhook_body_template: Option<String>,
    pub request_timeout_seconds: u64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
pub(crate) struct PartialServerConfig {
    heroku_api_key: Option<String>,
    slack_bot_token: Option<String>,
    database_url: Option<String>,
    port: Option<u16>,
    log_dir: Option<String>,
    monitored_app_name: Option<String>,
    slack_channel: Option<String>,
    check_interval_minutes: Option<u32>,
    heroku_api_url: Option<String>,
    slack_api_url: Option<String>,
    notifier: Option<String>,
    webhook_body_template: Option<String>,
    request_timeout_seconds: Option<u64>,
}

fn default_port() -> u16 {
    5000
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_slack_channel() -> String {
    "#alerts".to_string()
}

fn default_check_interval_minutes() -> u32 {
    5
}

fn default_heroku_api_url() -> String {
    "https://api.heroku.com".to_string()
}

fn default_slack_api_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config = match config_path {
            Some(path_str) => Self::read_file(path_str)?,
            None => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    fn read_file(path_str: &str) -> Result<PartialServerConfig, ConfigError> {
        let path = Path::new(path_str);
        if !path.exists() {
            return Ok(PartialServerConfig::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path_str.to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path_str.to_string(),
            source,
        })
    }

    pub(crate) fn merge(
        env_config: PartialServerConfig,
        file_config: PartialServerConfig,
    ) -> Result<Self, ConfigError> {
        let notifier = match env_config.notifier.or(file_config.notifier) {
            Some(raw) => raw.parse()?,
            None => NotifierKind::Slack,
        };

        let slack_bot_token =
            non_empty(env_config.slack_bot_token.or(file_config.slack_bot_token));
        if notifier == NotifierKind::Slack && slack_bot_token.is_none() {
            return Err(ConfigError::Missing("SLACK_BOT_TOKEN"));
        }

        Ok(ServerConfig {
            heroku_api_key: non_empty(env_config.heroku_api_key.or(file_config.heroku_api_key))
                .ok_or(ConfigError::Missing("HEROKU_API_KEY"))?,
            slack_bot_token,
            database_url: non_empty(env_config.database_url.or(file_config.database_url)),
            port: env_config
                .port
                .or(file_config.port)
                .unwrap_or_else(default_port),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            monitored_app_name: non_empty(
                env_config
                    .monitored_app_name
                    .or(file_config.monitored_app_name),
            ),
            slack_channel: env_config
                .slack_channel
                .or(file_config.slack_channel)
                .unwrap_or_else(default_slack_channel),
            check_interval_minutes: env_config
                .check_interval_minutes
                .or(file_config.check_interval_minutes)
                .unwrap_or_else(default_check_interval_minutes),
            heroku_api_url: env_config
                .heroku_api_url
                .or(file_config.heroku_api_url)
                .unwrap_or_else(default_heroku_api_url),
            slack_api_url: env_config
                .slack_api_url
                .or(file_config.slack_api_url)
                .unwrap_or_else(default_slack_api_url),
            notifier,
            webhook_body_template: env_config
                .webhook_body_template
                .or(file_config.webhook_body_template),
            request_timeout_seconds: env_config
                .request_timeout_seconds
                .or(file_config.request_timeout_seconds)
                .unwrap_or_else(default_request_timeout_seconds),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Whether the selected notifier has the credentials it needs.
    pub fn notifier_configured(&self) -> bool {
        match self.notifier {
            NotifierKind::Slack => self.slack_bot_token.is_some(),
            NotifierKind::Webhook => true,
        }
    }
}

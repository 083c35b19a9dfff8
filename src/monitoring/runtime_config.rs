use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Monitored app name must not be empty")]
    EmptyAppName,
    #[error("Notification destination must not be empty")]
    EmptyDestination,
    #[error("Check interval must be between 1 and 60 minutes, got {0}")]
    IntervalOutOfRange(u32),
}

/// The settings a poll cycle reads. Only ever constructed validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeConfig {
    monitored_app: String,
    notify_destination: String,
    interval_minutes: u32,
}

impl RuntimeConfig {
    pub fn new(
        monitored_app: impl Into<String>,
        notify_destination: impl Into<String>,
        interval_minutes: u32,
    ) -> Result<Self, ValidationError> {
        let monitored_app = monitored_app.into().trim().to_string();
        let notify_destination = notify_destination.into().trim().to_string();

        if monitored_app.is_empty() {
            return Err(ValidationError::EmptyAppName);
        }
        if notify_destination.is_empty() {
            return Err(ValidationError::EmptyDestination);
        }
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&interval_minutes) {
            return Err(ValidationError::IntervalOutOfRange(interval_minutes));
        }

        Ok(Self {
            monitored_app,
            notify_destination,
            interval_minutes,
        })
    }

    pub fn monitored_app(&self) -> &str {
        &self.monitored_app
    }

    pub fn notify_destination(&self) -> &str {
        &self.notify_destination
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }
}

/// Unvalidated reconfiguration request, as received from the outer surfaces.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigUpdate {
    pub monitored_app: String,
    pub notify_destination: String,
    pub interval_minutes: u32,
}

/// Shared owner of the current [`RuntimeConfig`].
///
/// Values are swapped whole through a watch channel: a reader gets either the
/// old or the new `Arc`, never a mix, and the poll loop is woken on change.
#[derive(Clone)]
pub struct RuntimeConfigHandle {
    tx: Arc<watch::Sender<Option<Arc<RuntimeConfig>>>>,
}

impl RuntimeConfigHandle {
    pub fn new(initial: Option<RuntimeConfig>) -> Self {
        let (tx, _rx) = watch::channel(initial.map(Arc::new));
        Self { tx: Arc::new(tx) }
    }

    /// Single atomic read of the whole configuration.
    pub fn current(&self) -> Option<Arc<RuntimeConfig>> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<RuntimeConfig>>> {
        self.tx.subscribe()
    }

    /// Validates then swaps. Nothing is published on a validation failure.
    pub fn update_config(&self, update: ConfigUpdate) -> Result<Arc<RuntimeConfig>, ValidationError> {
        let config = Arc::new(RuntimeConfig::new(
            update.monitored_app,
            update.notify_destination,
            update.interval_minutes,
        )?);
        let previous = self.tx.send_replace(Some(config.clone()));

        info!(
            monitored_app = %config.monitored_app(),
            notify_destination = %config.notify_destination(),
            interval_minutes = config.interval_minutes(),
            previous_app = previous.as_ref().map(|c| c.monitored_app()).unwrap_or(""),
            "Runtime configuration updated."
        );
        Ok(config)
    }
}

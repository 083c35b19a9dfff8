//! Point-in-time view of one monitored application's health.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Observed state of a single process instance (dyno).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Up,
    Down,
    Crashed,
    Starting,
    Unknown,
}

impl ProcessStatus {
    /// Maps a provider state string. Anything unrecognised (e.g. `idle`) is `Unknown`.
    pub fn from_provider(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "up" => ProcessStatus::Up,
            "down" => ProcessStatus::Down,
            "crashed" => ProcessStatus::Crashed,
            "starting" => ProcessStatus::Starting,
            _ => ProcessStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Up => "up",
            ProcessStatus::Down => "down",
            ProcessStatus::Crashed => "crashed",
            ProcessStatus::Starting => "starting",
            ProcessStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessState {
    pub process_type: String,
    pub status: ProcessStatus,
}

/// Metadata of the newest release known when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub version: u64,
    pub description: String,
    pub deployed_by: String,
    pub created_at: String,
}

impl ReleaseInfo {
    pub fn release_id(&self) -> String {
        format!("v{}", self.version)
    }
}

/// An immutable observation of one application.
///
/// Built once through the `with_*` constructors; nothing hands out `&mut`
/// access afterwards, so a stored baseline can never drift in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    app_name: String,
    process_states: BTreeMap<String, ProcessState>,
    last_release_id: String,
    last_release: Option<ReleaseInfo>,
    config_fingerprint: String,
    addon_states: BTreeMap<String, String>,
    observed_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(app_name: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            app_name: app_name.into(),
            process_states: BTreeMap::new(),
            last_release_id: String::new(),
            last_release: None,
            config_fingerprint: String::new(),
            addon_states: BTreeMap::new(),
            observed_at,
        }
    }

    pub fn with_process(
        mut self,
        instance: impl Into<String>,
        process_type: impl Into<String>,
        status: ProcessStatus,
    ) -> Self {
        self.process_states.insert(
            instance.into(),
            ProcessState {
                process_type: process_type.into(),
                status,
            },
        );
        self
    }

    pub fn with_release(mut self, release: ReleaseInfo) -> Self {
        self.last_release_id = release.release_id();
        self.last_release = Some(release);
        self
    }

    /// Sets the release id without metadata.
    pub fn with_release_id(mut self, release_id: impl Into<String>) -> Self {
        self.last_release_id = release_id.into();
        self.last_release = None;
        self
    }

    pub fn with_config_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.config_fingerprint = fingerprint.into();
        self
    }

    pub fn with_config_keys<I, K>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let fingerprint = config_fingerprint(keys);
        self.with_config_fingerprint(fingerprint)
    }

    pub fn with_addon(mut self, addon: impl Into<String>, state: impl Into<String>) -> Self {
        self.addon_states.insert(addon.into(), state.into());
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn process_states(&self) -> &BTreeMap<String, ProcessState> {
        &self.process_states
    }

    pub fn last_release_id(&self) -> &str {
        &self.last_release_id
    }

    pub fn last_release(&self) -> Option<&ReleaseInfo> {
        self.last_release.as_ref()
    }

    pub fn config_fingerprint(&self) -> &str {
        &self.config_fingerprint
    }

    pub fn addon_states(&self) -> &BTreeMap<String, String> {
        &self.addon_states
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// SHA-256 over the sorted, de-duplicated config var keys. Values never enter the hash.
pub fn config_fingerprint<I, K>(keys: I) -> String
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    let mut sorted: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
    sorted.sort();
    sorted.dedup();

    let mut hasher = Sha256::new();
    for key in &sorted {
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

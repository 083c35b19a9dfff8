use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::warn;

use super::client::{Addon, Dyno, FetchError, HerokuClient, Release};
use crate::monitoring::{ProcessStatus, ReleaseInfo, Snapshot};

/// Produces the current health snapshot of an application.
#[async_trait]
pub trait HealthFetcher: Send + Sync {
    async fn fetch(&self, app_name: &str) -> Result<Snapshot, FetchError>;
}

#[async_trait]
impl HealthFetcher for HerokuClient {
    /// Dynos, releases and config vars are all required. Add-ons are
    /// display-only, so their failure degrades to an empty map.
    async fn fetch(&self, app_name: &str) -> Result<Snapshot, FetchError> {
        let (core, addons) = tokio::join!(
            async {
                tokio::try_join!(
                    self.get_dynos(app_name),
                    self.get_releases(app_name),
                    self.get_config_vars(app_name),
                )
            },
            self.get_addons(app_name),
        );
        let (dynos, releases, config_vars) = core?;

        let addons = addons.unwrap_or_else(|e| {
            warn!(app_name = %app_name, error = %e, "Add-on fetch failed, continuing without add-ons.");
            Vec::new()
        });

        Ok(snapshot_from_parts(
            app_name,
            &dynos,
            &releases,
            config_vars.keys(),
            &addons,
            Utc::now(),
        ))
    }
}

/// Assembles a snapshot from raw API payloads.
pub fn snapshot_from_parts<'a>(
    app_name: &str,
    dynos: &[Dyno],
    releases: &[Release],
    config_keys: impl IntoIterator<Item = &'a String>,
    addons: &[Addon],
    observed_at: DateTime<Utc>,
) -> Snapshot {
    let mut snapshot = dynos.iter().fold(Snapshot::new(app_name, observed_at), |s, dyno| {
        s.with_process(
            dyno.name.clone(),
            dyno.dyno_type.clone(),
            ProcessStatus::from_provider(&dyno.state),
        )
    });

    if let Some(latest) = releases.iter().max_by_key(|r| r.version) {
        snapshot = snapshot.with_release(ReleaseInfo {
            version: latest.version,
            description: latest
                .description
                .clone()
                .unwrap_or_else(|| "No description".to_string()),
            deployed_by: latest
                .user
                .as_ref()
                .and_then(|u| u.email.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            created_at: latest.created_at.clone().unwrap_or_default(),
        });
    }

    let addon_states: BTreeMap<&str, &str> = addons
        .iter()
        .map(|a| (a.name.as_str(), a.state.as_deref().unwrap_or("unknown")))
        .collect();

    addon_states
        .into_iter()
        .fold(snapshot.with_config_keys(config_keys), |s, (name, state)| {
            s.with_addon(name, state)
        })
}

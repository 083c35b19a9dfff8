//! Compares a fresh snapshot against the stored baseline and commits it.
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::alerting::events::{AffectedProcess, AlertEvent};
use crate::db::{SnapshotStore, StorageError, StoredSnapshot};
use crate::monitoring::{ProcessStatus, Snapshot};

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The baseline could not be read. Nothing was compared or written.
    #[error("Failed to load baseline snapshot: {0}")]
    BaselineUnavailable(#[source] StorageError),
    /// Alerts were computed but the new baseline was not written. They must not be sent.
    #[error("Failed to commit snapshot, alerts from this cycle were discarded: {0}")]
    CommitFailed(#[source] StorageError),
}

pub struct ReconciliationEngine {
    store: Arc<dyn SnapshotStore>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Diffs `current` against the stored baseline, then persists `current`.
    ///
    /// Returns the alerts ordered crashed, down, release, config. The first
    /// observation of an app yields no alerts. On `CommitFailed` the baseline
    /// is left as it was, so the next cycle diffs against the same state.
    pub async fn reconcile(&self, current: Snapshot) -> Result<Vec<AlertEvent>, ReconcileError> {
        let previous = self
            .store
            .get(current.app_name())
            .await
            .map_err(ReconcileError::BaselineUnavailable)?;

        let current = match &previous {
            Some(stored) => keep_known_release(current, &stored.snapshot),
            None => current,
        };

        let alerts = match &previous {
            None => {
                info!(
                    app_name = %current.app_name(),
                    "First observation for app, recording baseline without alerts."
                );
                Vec::new()
            }
            Some(stored) => diff_snapshots(&stored.snapshot, &current),
        };

        if let Err(e) = self.store.put(&current).await {
            warn!(
                app_name = %current.app_name(),
                discarded_alerts = alerts.len(),
                error = %e,
                "Snapshot commit failed."
            );
            return Err(ReconcileError::CommitFailed(e));
        }

        debug!(
            app_name = %current.app_name(),
            alert_count = alerts.len(),
            "Snapshot committed."
        );
        Ok(alerts)
    }

    /// Read-only view of the last committed snapshot. Never fetches.
    pub async fn status(&self, app_name: &str) -> Result<Option<StoredSnapshot>, StorageError> {
        self.store.get(app_name).await
    }
}

/// An empty release list never replaces a known release id in the baseline.
fn keep_known_release(current: Snapshot, baseline: &Snapshot) -> Snapshot {
    if !current.last_release_id().is_empty() || baseline.last_release_id().is_empty() {
        return current;
    }
    debug!(
        app_name = %current.app_name(),
        release_id = %baseline.last_release_id(),
        "No releases fetched, keeping the last known release."
    );
    match baseline.last_release() {
        Some(release) => current.with_release(release.clone()),
        None => current.with_release_id(baseline.last_release_id()),
    }
}

/// Pure comparison of two snapshots of the same app.
pub fn diff_snapshots(previous: &Snapshot, current: &Snapshot) -> Vec<AlertEvent> {
    let app_name = current.app_name().to_string();
    let detected_at = current.observed_at();
    let mut alerts = Vec::new();

    let crashed = entered_status(previous, current, ProcessStatus::Crashed);
    if !crashed.is_empty() {
        alerts.push(AlertEvent::DynoCrashed {
            app_name: app_name.clone(),
            processes: crashed,
            detected_at,
        });
    }

    let down = entered_status(previous, current, ProcessStatus::Down);
    if !down.is_empty() {
        alerts.push(AlertEvent::DynoDown {
            app_name: app_name.clone(),
            processes: down,
            detected_at,
        });
    }

    // An empty previous id is a first sighting of the release history.
    let previous_release = previous.last_release_id();
    let current_release = current.last_release_id();
    if !previous_release.is_empty() && previous_release != current_release {
        alerts.push(AlertEvent::NewRelease {
            app_name: app_name.clone(),
            release_id: current_release.to_string(),
            previous_release_id: previous_release.to_string(),
            release: current.last_release().cloned(),
            detected_at,
        });
    }

    if previous.config_fingerprint() != current.config_fingerprint() {
        alerts.push(AlertEvent::ConfigChanged {
            app_name,
            detected_at,
        });
    }

    alerts
}

/// Instances in `status` now that were absent or in another state before.
/// Instances that vanished are ignored: scaled down, not failed.
fn entered_status(
    previous: &Snapshot,
    current: &Snapshot,
    status: ProcessStatus,
) -> Vec<AffectedProcess> {
    current
        .process_states()
        .iter()
        .filter(|(_, state)| state.status == status)
        .filter(|(instance, _)| {
            previous
                .process_states()
                .get(instance.as_str())
                .map(|before| before.status)
                != Some(status)
        })
        .map(|(instance, state)| AffectedProcess {
            instance: instance.clone(),
            process_type: state.process_type.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::events::AlertKind;
    use crate::db::MemorySnapshotStore;
    use crate::test_support::FlakyStore;
    use chrono::{Duration, Utc};

    fn snap(processes: &[(&str, ProcessStatus)]) -> Snapshot {
        processes.iter().fold(
            Snapshot::new("shop", Utc::now()).with_config_fingerprint("100"),
            |s, (name, status)| {
                let process_type = name.split('.').next().unwrap_or("web");
                s.with_process(*name, process_type, *status)
            },
        )
    }

    fn kinds(alerts: &[AlertEvent]) -> Vec<AlertKind> {
        alerts.iter().map(AlertEvent::kind).collect()
    }

    fn instances(event: &AlertEvent) -> Vec<&str> {
        event.processes().iter().map(|p| p.instance.as_str()).collect()
    }

    #[test]
    fn test_crash_detected_once() {
        let previous = snap(&[("web.1", ProcessStatus::Up)]);
        let current = snap(&[("web.1", ProcessStatus::Crashed)]);

        let alerts = diff_snapshots(&previous, &current);
        assert_eq!(kinds(&alerts), vec![AlertKind::DynoCrashed]);
        assert_eq!(instances(&alerts[0]), vec!["web.1"]);
        assert_eq!(alerts[0].processes()[0].process_type, "web");

        let still_crashed = snap(&[("web.1", ProcessStatus::Crashed)]);
        assert!(diff_snapshots(&current, &still_crashed).is_empty());
    }

    #[test]
    fn test_crashes_are_batched() {
        let previous = snap(&[("web.1", ProcessStatus::Up), ("web.2", ProcessStatus::Up)]);
        let current = snap(&[
            ("web.1", ProcessStatus::Crashed),
            ("web.2", ProcessStatus::Crashed),
        ]);

        let alerts = diff_snapshots(&previous, &current);
        assert_eq!(alerts.len(), 1);
        assert_eq!(instances(&alerts[0]), vec!["web.1", "web.2"]);
    }

    #[test]
    fn test_new_instance_already_crashed_alerts() {
        let previous = snap(&[("web.1", ProcessStatus::Up)]);
        let current = snap(&[("web.1", ProcessStatus::Up), ("worker.1", ProcessStatus::Crashed)]);

        let alerts = diff_snapshots(&previous, &current);
        assert_eq!(kinds(&alerts), vec![AlertKind::DynoCrashed]);
        assert_eq!(alerts[0].processes()[0].process_type, "worker");
    }

    #[test]
    fn test_down_and_crash_in_one_cycle() {
        let previous = snap(&[
            ("web.1", ProcessStatus::Up),
            ("web.2", ProcessStatus::Up),
            ("worker.1", ProcessStatus::Up),
        ]);
        let current = snap(&[
            ("web.1", ProcessStatus::Down),
            ("web.2", ProcessStatus::Crashed),
            ("worker.1", ProcessStatus::Down),
        ]);

        let alerts = diff_snapshots(&previous, &current);
        assert_eq!(kinds(&alerts), vec![AlertKind::DynoCrashed, AlertKind::DynoDown]);
        assert_eq!(instances(&alerts[0]), vec!["web.2"]);
        assert_eq!(instances(&alerts[1]), vec!["web.1", "worker.1"]);
    }

    #[test]
    fn test_crashed_to_down_is_a_new_down() {
        let previous = snap(&[("web.1", ProcessStatus::Crashed)]);
        let current = snap(&[("web.1", ProcessStatus::Down)]);

        assert_eq!(kinds(&diff_snapshots(&previous, &current)), vec![AlertKind::DynoDown]);
    }

    #[test]
    fn test_disappeared_instances_are_not_alerted() {
        let previous = snap(&[("web.1", ProcessStatus::Up), ("web.2", ProcessStatus::Crashed)]);
        let current = snap(&[("web.1", ProcessStatus::Up)]);

        assert!(diff_snapshots(&previous, &current).is_empty());
    }

    #[test]
    fn test_recovery_is_quiet() {
        let previous = snap(&[("web.1", ProcessStatus::Crashed)]);
        let current = snap(&[("web.1", ProcessStatus::Starting)]);

        assert!(diff_snapshots(&previous, &current).is_empty());
    }

    #[test]
    fn test_release_transition() {
        let previous = snap(&[]).with_release_id("v41");
        let current = snap(&[]).with_release_id("v42");

        let alerts = diff_snapshots(&previous, &current);
        assert_eq!(kinds(&alerts), vec![AlertKind::NewRelease]);
        match &alerts[0] {
            AlertEvent::NewRelease {
                release_id,
                previous_release_id,
                ..
            } => {
                assert_eq!(release_id, "v42");
                assert_eq!(previous_release_id, "v41");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_first_release_sighting_is_quiet() {
        let previous = snap(&[]).with_release_id("");
        let current = snap(&[]).with_release_id("v1");

        assert!(diff_snapshots(&previous, &current).is_empty());
    }

    #[test]
    fn test_release_id_cleared_is_a_transition() {
        let previous = snap(&[]).with_release_id("v41");
        let current = snap(&[]).with_release_id("");

        assert_eq!(kinds(&diff_snapshots(&previous, &current)), vec![AlertKind::NewRelease]);
    }

    #[tokio::test]
    async fn test_empty_release_list_keeps_known_release() {
        let store = Arc::new(MemorySnapshotStore::new());
        let engine = ReconciliationEngine::new(store);

        engine.reconcile(snap(&[]).with_release_id("v41")).await.unwrap();

        let gap = engine.reconcile(snap(&[]).with_release_id("")).await.unwrap();
        assert!(gap.is_empty());
        let stored = engine.status("shop").await.unwrap().unwrap();
        assert_eq!(stored.snapshot.last_release_id(), "v41");

        let alerts = engine.reconcile(snap(&[]).with_release_id("v42")).await.unwrap();
        assert_eq!(kinds(&alerts), vec![AlertKind::NewRelease]);
        match &alerts[0] {
            AlertEvent::NewRelease {
                release_id,
                previous_release_id,
                ..
            } => {
                assert_eq!(release_id, "v42");
                assert_eq!(previous_release_id, "v41");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_config_fingerprint_change() {
        let previous = snap(&[]).with_config_fingerprint("100");
        let changed = snap(&[]).with_config_fingerprint("200");
        let same = snap(&[]).with_config_fingerprint("100");

        assert_eq!(
            kinds(&diff_snapshots(&previous, &changed)),
            vec![AlertKind::ConfigChanged]
        );
        assert!(diff_snapshots(&previous, &same).is_empty());
    }

    #[test]
    fn test_alert_order_is_severity_descending() {
        let previous = snap(&[("web.1", ProcessStatus::Up), ("web.2", ProcessStatus::Up)])
            .with_release_id("v1")
            .with_config_fingerprint("a");
        let current = snap(&[
            ("web.1", ProcessStatus::Down),
            ("web.2", ProcessStatus::Crashed),
        ])
        .with_release_id("v2")
        .with_config_fingerprint("b");

        assert_eq!(
            kinds(&diff_snapshots(&previous, &current)),
            vec![
                AlertKind::DynoCrashed,
                AlertKind::DynoDown,
                AlertKind::NewRelease,
                AlertKind::ConfigChanged,
            ]
        );
    }

    #[tokio::test]
    async fn test_first_observation_is_quiet_and_becomes_baseline() {
        let store = Arc::new(MemorySnapshotStore::new());
        let engine = ReconciliationEngine::new(store.clone());

        let first = snap(&[("web.1", ProcessStatus::Crashed)]).with_release_id("v9");
        let alerts = engine.reconcile(first.clone()).await.unwrap();

        assert!(alerts.is_empty());
        let stored = engine.status("shop").await.unwrap().unwrap();
        assert_eq!(stored.snapshot, first);
    }

    #[tokio::test]
    async fn test_retry_before_commit_is_idempotent_then_quiet() {
        let store = Arc::new(FlakyStore::new());
        let engine = ReconciliationEngine::new(store.clone());

        let baseline = snap(&[("web.1", ProcessStatus::Up)]);
        engine.reconcile(baseline.clone()).await.unwrap();

        let current = snap(&[("web.1", ProcessStatus::Crashed)]);

        // Two cycles that compute alerts but fail to commit.
        store.fail_puts(true);
        let first = engine.reconcile(current.clone()).await;
        let second = engine.reconcile(current.clone()).await;
        assert!(matches!(first, Err(ReconcileError::CommitFailed(_))));
        assert!(matches!(second, Err(ReconcileError::CommitFailed(_))));
        assert_eq!(engine.status("shop").await.unwrap().unwrap().snapshot, baseline);

        // Storage recovers: the same transition fires once, then never again.
        store.fail_puts(false);
        let committed = engine.reconcile(current.clone()).await.unwrap();
        assert_eq!(kinds(&committed), vec![AlertKind::DynoCrashed]);

        let again = engine.reconcile(current).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_keeps_previous_baseline() {
        let store = Arc::new(FlakyStore::new());
        let engine = ReconciliationEngine::new(store.clone());

        let baseline = snap(&[("web.1", ProcessStatus::Up)]).with_release_id("v1");
        engine.reconcile(baseline.clone()).await.unwrap();

        store.fail_puts(true);
        let failed = engine
            .reconcile(snap(&[("web.1", ProcessStatus::Crashed)]).with_release_id("v2"))
            .await;
        assert!(matches!(failed, Err(ReconcileError::CommitFailed(_))));

        let stored = engine.status("shop").await.unwrap().unwrap();
        assert_eq!(stored.snapshot, baseline);
    }

    #[tokio::test]
    async fn test_unreadable_baseline_writes_nothing() {
        let store = Arc::new(FlakyStore::new());
        let engine = ReconciliationEngine::new(store.clone());
        engine.reconcile(snap(&[])).await.unwrap();
        let puts_before = store.put_count();

        store.fail_gets(true);
        let result = engine.reconcile(snap(&[("web.1", ProcessStatus::Crashed)])).await;

        assert!(matches!(result, Err(ReconcileError::BaselineUnavailable(_))));
        assert_eq!(store.put_count(), puts_before);
    }

    #[tokio::test]
    async fn test_detected_at_is_observation_time() {
        let store = Arc::new(MemorySnapshotStore::new());
        let engine = ReconciliationEngine::new(store);
        let observed_at = Utc::now() - Duration::minutes(3);

        engine
            .reconcile(Snapshot::new("shop", observed_at).with_config_fingerprint("a"))
            .await
            .unwrap();
        let alerts = engine
            .reconcile(Snapshot::new("shop", observed_at).with_config_fingerprint("b"))
            .await
            .unwrap();

        assert_eq!(alerts[0].detected_at(), observed_at);
    }
}

//! In-process collaborators shared by the crate's tests.
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::DbErr;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::alerting::{AlertEvent, AlertKind};
use crate::db::{MemorySnapshotStore, SnapshotStore, StorageError, StoredSnapshot};
use crate::heroku::{FetchError, HealthFetcher};
use crate::monitoring::{ProcessStatus, Snapshot};
use crate::notifications::{Notifier, SenderError};

pub(crate) fn observed_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

/// Snapshot of "shop" at a fixed instant; the type is the instance prefix.
pub(crate) fn snapshot(processes: &[(&str, ProcessStatus)]) -> Snapshot {
    processes
        .iter()
        .fold(Snapshot::new("shop", observed_at()), |s, (name, status)| {
            let process_type = name.split('.').next().unwrap_or("web");
            s.with_process(*name, process_type, *status)
        })
}

/// Memory store whose reads and writes can be made to fail on demand.
pub(crate) struct FlakyStore {
    inner: MemorySnapshotStore,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    puts: AtomicUsize,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemorySnapshotStore::new(),
            fail_gets: AtomicBool::new(false),
            fail_puts: AtomicBool::new(false),
            puts: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Put attempts, failed ones included.
    pub(crate) fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for FlakyStore {
    async fn get(&self, app_name: &str) -> Result<Option<StoredSnapshot>, StorageError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(DbErr::Custom("store unavailable".to_string()).into());
        }
        self.inner.get(app_name).await
    }

    async fn put(&self, snapshot: &Snapshot) -> Result<StoredSnapshot, StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(DbErr::Custom("store unavailable".to_string()).into());
        }
        self.inner.put(snapshot).await
    }
}

/// Pauses each fetch until the test releases it.
#[derive(Clone)]
pub(crate) struct Gate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

/// Answers fetches from a queue, then with empty snapshots.
pub(crate) struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<Snapshot, FetchError>>>,
    apps: Mutex<Vec<String>>,
    calls: AtomicUsize,
    gate: Option<Gate>,
}

impl ScriptedFetcher {
    pub(crate) fn new(responses: Vec<Result<Snapshot, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            apps: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub(crate) fn gated(responses: Vec<Result<Snapshot, FetchError>>, gate: Gate) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(responses)
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn apps(&self) -> Vec<String> {
        self.apps.lock().unwrap().clone()
    }
}

#[async_trait]
impl HealthFetcher for ScriptedFetcher {
    async fn fetch(&self, app_name: &str) -> Result<Snapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.apps.lock().unwrap().push(app_name.to_string());
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Snapshot::new(app_name, Utc::now())))
    }
}

/// Records every delivery attempt; fails for the kinds it is told to.
pub(crate) struct RecordingNotifier {
    attempts: Mutex<Vec<(String, AlertKind, bool)>>,
    failing: Mutex<Vec<AlertKind>>,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self {
            attempts: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_on(&self, kind: AlertKind) {
        self.failing.lock().unwrap().push(kind);
    }

    pub(crate) fn attempted_kinds(&self) -> Vec<AlertKind> {
        self.attempts.lock().unwrap().iter().map(|(_, k, _)| *k).collect()
    }

    pub(crate) fn sent_kinds(&self) -> Vec<AlertKind> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, ok)| *ok)
            .map(|(_, k, _)| *k)
            .collect()
    }

    pub(crate) fn destinations(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(d, _, _)| d.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, destination: &str, event: &AlertEvent) -> Result<(), SenderError> {
        let kind = event.kind();
        let ok = !self.failing.lock().unwrap().contains(&kind);
        self.attempts
            .lock()
            .unwrap()
            .push((destination.to_string(), kind, ok));
        if ok {
            Ok(())
        } else {
            Err(SenderError::Rejected("channel_not_found".to_string()))
        }
    }
}

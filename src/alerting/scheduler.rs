//! Drives reconciliation cycles on the configured interval.
//!
//! At most one cycle runs at any instant. A timer tick that lands while a
//! cycle is in flight is dropped, not queued; a forced refresh waits for the
//! in-flight cycle instead.
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::alerting::events::AlertEvent;
use crate::alerting::reconciliation::{ReconcileError, ReconciliationEngine};
use crate::heroku::HealthFetcher;
use crate::monitoring::{RuntimeConfig, RuntimeConfigHandle};
use crate::notifications::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// What one call into the scheduler did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// A cycle was already running.
    Skipped,
    Stopped,
    /// No monitored app is configured yet.
    Unconfigured,
    FetchFailed {
        app_name: String,
        error: String,
    },
    BaselineUnavailable {
        app_name: String,
        error: String,
    },
    /// Alerts, if any, were dropped undelivered.
    CommitFailed {
        app_name: String,
        error: String,
    },
    Completed {
        app_name: String,
        alerts: Vec<AlertEvent>,
        delivered: usize,
        failed: usize,
    },
}

pub struct Scheduler {
    config: RuntimeConfigHandle,
    fetcher: Arc<dyn HealthFetcher>,
    engine: Arc<ReconciliationEngine>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<SchedulerState>,
    cycle_gate: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        config: RuntimeConfigHandle,
        fetcher: Arc<dyn HealthFetcher>,
        engine: Arc<ReconciliationEngine>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (state, _rx) = watch::channel(SchedulerState::Idle);
        Self {
            config,
            fetcher,
            engine,
            notifier,
            state,
            cycle_gate: Mutex::new(()),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    fn is_stopped(&self) -> bool {
        self.state() == SchedulerState::Stopped
    }

    /// Timer entry point. A no-op while another cycle holds the gate.
    pub async fn tick(&self) -> CycleOutcome {
        if self.is_stopped() {
            return CycleOutcome::Stopped;
        }
        let Ok(_gate) = self.cycle_gate.try_lock() else {
            debug!("Previous health check still running, skipping this tick.");
            return CycleOutcome::Skipped;
        };
        if self.is_stopped() {
            return CycleOutcome::Stopped;
        }
        self.run_guarded_cycle().await
    }

    /// Forced refresh: runs one cycle now, after any in-flight cycle completes.
    pub async fn run_now(&self) -> CycleOutcome {
        if self.is_stopped() {
            return CycleOutcome::Stopped;
        }
        let _gate = self.cycle_gate.lock().await;
        if self.is_stopped() {
            return CycleOutcome::Stopped;
        }
        self.run_guarded_cycle().await
    }

    /// Enters `Stopped` and waits until no cycle is in flight.
    pub async fn stop(&self) {
        self.state.send_replace(SchedulerState::Stopped);
        let _gate = self.cycle_gate.lock().await;
        info!("Health check scheduler stopped.");
    }

    /// Poll loop. Runs a cycle at once, then one interval after each completed
    /// cycle. Interval changes reschedule the next tick; shutdown lets the
    /// current cycle finish.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut config_rx = self.config.subscribe();
        let mut interval = config_rx
            .borrow_and_update()
            .as_ref()
            .map(|c| c.interval());
        let mut next_tick = Instant::now();

        info!(
            interval_seconds = interval.map(|i| i.as_secs()).unwrap_or(0),
            "Health check scheduler started."
        );
        if interval.is_none() {
            warn!("No app configured for health checks, waiting for configuration.");
        }

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let deadline = next_tick;
            let armed = interval.is_some();
            let timer = async move {
                if armed {
                    sleep_until(deadline).await;
                } else {
                    std::future::pending::<()>().await;
                }
            };

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping health check scheduler.");
                    break;
                }

                changed = config_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let new_interval = config_rx
                        .borrow_and_update()
                        .as_ref()
                        .map(|c| c.interval());
                    next_tick = reschedule(interval, new_interval, next_tick);
                    interval = new_interval;
                }

                _ = timer => {
                    let outcome = self.tick().await;
                    debug!(?outcome, "Scheduled health check finished.");
                    next_tick = Instant::now() + interval.unwrap_or(Duration::ZERO);
                }
            }
        }

        self.stop().await;
    }

    async fn run_guarded_cycle(&self) -> CycleOutcome {
        self.state.send_if_modified(|state| {
            if *state == SchedulerState::Idle {
                *state = SchedulerState::Running;
                true
            } else {
                false
            }
        });

        let outcome = match self.config.current() {
            Some(config) => self.run_cycle(&config).await,
            None => {
                warn!("No app configured for health check.");
                CycleOutcome::Unconfigured
            }
        };

        self.state.send_if_modified(|state| {
            if *state == SchedulerState::Running {
                *state = SchedulerState::Idle;
                true
            } else {
                false
            }
        });
        outcome
    }

    /// One fetch, reconcile, notify sequence under a single config read.
    async fn run_cycle(&self, config: &RuntimeConfig) -> CycleOutcome {
        let app_name = config.monitored_app().to_string();
        info!(app_name = %app_name, "Running health check.");

        let snapshot = match self.fetcher.fetch(&app_name).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(app_name = %app_name, error = %e, "Health fetch failed, keeping previous baseline.");
                return CycleOutcome::FetchFailed {
                    app_name,
                    error: e.to_string(),
                };
            }
        };

        let alerts = match self.engine.reconcile(snapshot).await {
            Ok(alerts) => alerts,
            Err(e @ ReconcileError::BaselineUnavailable(_)) => {
                error!(app_name = %app_name, error = %e, "Could not load baseline snapshot.");
                return CycleOutcome::BaselineUnavailable {
                    app_name,
                    error: e.to_string(),
                };
            }
            Err(e @ ReconcileError::CommitFailed(_)) => {
                error!(app_name = %app_name, error = %e, "Snapshot commit failed, dropping this cycle's alerts.");
                return CycleOutcome::CommitFailed {
                    app_name,
                    error: e.to_string(),
                };
            }
        };

        let mut delivered = 0;
        let mut failed = 0;
        for event in &alerts {
            match self.notifier.send(config.notify_destination(), event).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    error!(
                        app_name = %app_name,
                        kind = %event.kind(),
                        error = %e,
                        "Failed to send alert notification."
                    );
                }
            }
        }

        info!(
            app_name = %app_name,
            alerts = alerts.len(),
            delivered,
            failed,
            "Health check complete."
        );
        CycleOutcome::Completed {
            app_name,
            alerts,
            delivered,
            failed,
        }
    }
}

/// Next tick after a config change. A newly configured app is checked at
/// once; an interval change counts from now; anything else keeps the deadline.
fn reschedule(old: Option<Duration>, new: Option<Duration>, next_tick: Instant) -> Instant {
    match (old, new) {
        (None, Some(_)) => Instant::now(),
        (Some(old), Some(new)) if old != new => {
            info!(interval_seconds = new.as_secs(), "Check interval changed, rescheduling.");
            Instant::now() + new
        }
        _ => next_tick,
    }
}

pub mod events;
pub mod reconciliation;
pub mod scheduler;

pub use events::{AffectedProcess, AlertEvent, AlertKind};
pub use reconciliation::{ReconcileError, ReconciliationEngine};
pub use scheduler::{CycleOutcome, Scheduler, SchedulerState};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::monitoring::ReleaseInfo;

/// A process instance named in a dyno alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedProcess {
    pub instance: String,
    pub process_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    DynoCrashed,
    DynoDown,
    NewRelease,
    ConfigChanged,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertKind::DynoCrashed => "dyno_crashed",
            AlertKind::DynoDown => "dyno_down",
            AlertKind::NewRelease => "new_release",
            AlertKind::ConfigChanged => "config_changed",
        };
        f.write_str(s)
    }
}

/// A state transition worth telling someone about.
///
/// Dyno events are batched: one event carries every instance that entered
/// the state during the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertEvent {
    DynoCrashed {
        app_name: String,
        processes: Vec<AffectedProcess>,
        detected_at: DateTime<Utc>,
    },
    DynoDown {
        app_name: String,
        processes: Vec<AffectedProcess>,
        detected_at: DateTime<Utc>,
    },
    NewRelease {
        app_name: String,
        release_id: String,
        previous_release_id: String,
        release: Option<ReleaseInfo>,
        detected_at: DateTime<Utc>,
    },
    ConfigChanged {
        app_name: String,
        detected_at: DateTime<Utc>,
    },
}

impl AlertEvent {
    pub fn kind(&self) -> AlertKind {
        match self {
            AlertEvent::DynoCrashed { .. } => AlertKind::DynoCrashed,
            AlertEvent::DynoDown { .. } => AlertKind::DynoDown,
            AlertEvent::NewRelease { .. } => AlertKind::NewRelease,
            AlertEvent::ConfigChanged { .. } => AlertKind::ConfigChanged,
        }
    }

    pub fn app_name(&self) -> &str {
        match self {
            AlertEvent::DynoCrashed { app_name, .. }
            | AlertEvent::DynoDown { app_name, .. }
            | AlertEvent::NewRelease { app_name, .. }
            | AlertEvent::ConfigChanged { app_name, .. } => app_name,
        }
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        match self {
            AlertEvent::DynoCrashed { detected_at, .. }
            | AlertEvent::DynoDown { detected_at, .. }
            | AlertEvent::NewRelease { detected_at, .. }
            | AlertEvent::ConfigChanged { detected_at, .. } => *detected_at,
        }
    }

    /// Processes named by a dyno event; empty for the other kinds.
    pub fn processes(&self) -> &[AffectedProcess] {
        match self {
            AlertEvent::DynoCrashed { processes, .. } | AlertEvent::DynoDown { processes, .. } => {
                processes
            }
            _ => &[],
        }
    }
}

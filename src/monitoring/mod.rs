pub mod runtime_config;
pub mod snapshot;

pub use runtime_config::{ConfigUpdate, RuntimeConfig, RuntimeConfigHandle, ValidationError};
pub use snapshot::{ProcessState, ProcessStatus, ReleaseInfo, Snapshot};

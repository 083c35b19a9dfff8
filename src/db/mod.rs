pub mod entities;
pub mod snapshot_store;

pub use snapshot_store::{
    DbSnapshotStore, MemorySnapshotStore, SnapshotStore, StorageError, StoredSnapshot,
};

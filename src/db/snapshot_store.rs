use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema, Set, sea_query::OnConflict,
};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::db::entities::app_state;
use crate::monitoring::Snapshot;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The durable record for one application: its baseline plus the write time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSnapshot {
    pub snapshot: Snapshot,
    pub updated_at: DateTime<Utc>,
}

/// Keyed persistence of the last committed snapshot per application.
///
/// `get` reports a missing key as `Ok(None)`. `put` is an all-or-nothing
/// upsert keyed by the snapshot's own app name.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, app_name: &str) -> Result<Option<StoredSnapshot>, StorageError>;

    async fn put(&self, snapshot: &Snapshot) -> Result<StoredSnapshot, StorageError>;
}

/// Process-local store. State does not survive a restart.
#[derive(Default)]
pub struct MemorySnapshotStore {
    records: DashMap<String, StoredSnapshot>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, app_name: &str) -> Result<Option<StoredSnapshot>, StorageError> {
        Ok(self.records.get(app_name).map(|entry| entry.value().clone()))
    }

    async fn put(&self, snapshot: &Snapshot) -> Result<StoredSnapshot, StorageError> {
        let record = StoredSnapshot {
            snapshot: snapshot.clone(),
            updated_at: Utc::now(),
        };
        self.records
            .insert(snapshot.app_name().to_string(), record.clone());
        Ok(record)
    }
}

/// Postgres-backed store on the `app_state` table.
pub struct DbSnapshotStore {
    db: DatabaseConnection,
}

impl DbSnapshotStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates the `app_state` table when it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), DbErr> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);
        let mut stmt = schema.create_table_from_entity(app_state::Entity);
        stmt.if_not_exists();
        self.db.execute(backend.build(&stmt)).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for DbSnapshotStore {
    async fn get(&self, app_name: &str) -> Result<Option<StoredSnapshot>, StorageError> {
        let row = app_state::Entity::find_by_id(app_name.to_owned())
            .one(&self.db)
            .await?;

        match row {
            Some(model) => {
                let snapshot: Snapshot = serde_json::from_value(model.snapshot)?;
                Ok(Some(StoredSnapshot {
                    snapshot,
                    updated_at: model.updated_at,
                }))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, snapshot: &Snapshot) -> Result<StoredSnapshot, StorageError> {
        let now = Utc::now();
        let active_state = app_state::ActiveModel {
            app_name: Set(snapshot.app_name().to_owned()),
            last_release: Set(snapshot.last_release_id().to_owned()),
            config_vars_hash: Set(snapshot.config_fingerprint().to_owned()),
            snapshot: Set(serde_json::to_value(snapshot)?),
            updated_at: Set(now),
        };

        // One INSERT ... ON CONFLICT statement, so the row is replaced atomically.
        let rows = app_state::Entity::insert(active_state)
            .on_conflict(
                OnConflict::column(app_state::Column::AppName)
                    .update_columns([
                        app_state::Column::LastRelease,
                        app_state::Column::ConfigVarsHash,
                        app_state::Column::Snapshot,
                        app_state::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        debug!(app_name = %snapshot.app_name(), rows, "Committed snapshot.");

        Ok(StoredSnapshot {
            snapshot: snapshot.clone(),
            updated_at: now,
        })
    }
}

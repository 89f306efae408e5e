//! Capabilities the orchestrator needs from the outside world: describing and
//! migrating schemas, recording the service version, and driving out-of-band
//! migrations. Implementations live with the database driver; an in-memory
//! one ships with `waypoint-runner`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;

use crate::definition::{DefinitionError, Definitions};
use crate::oobmigration::OutOfBandMigration;
use crate::schema::SchemaDescription;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown schema: {0}")]
    UnknownSchema(String),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("refusing to apply privileged migrations {ids:?} to schema {schema:?}")]
    PrivilegedRefused { schema: String, ids: Vec<i32> },
    #[error(
        "privileged migrations for schema {schema:?} must be applied manually, then authorized with hash {hash}"
    )]
    PrivilegedUnauthorized { schema: String, hash: String },
    #[error("unknown out-of-band migration: {0}")]
    UnknownOutOfBandMigration(i32),
    #[error("{0}")]
    Backend(String),
}

/// Migration log summary of one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationVersions {
    pub applied: Vec<i32>,
    pub pending: Vec<i32>,
    pub failed: Vec<i32>,
}

#[async_trait]
pub trait SchemaStore: Send + Sync {
    async fn describe(&self, schema: &str) -> Result<SchemaDescription, StoreError>;
    async fn versions(&self, schema: &str) -> Result<MigrationVersions, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOperationType {
    TargetedUp,
    TargetedDown,
}

/// Move one schema to exactly `target_versions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOperation {
    pub schema_name: String,
    pub operation_type: MigrationOperationType,
    pub target_versions: Vec<i32>,
}

/// How the runner treats migrations that need elevated privileges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum PrivilegedMode {
    /// Apply them like any other migration.
    #[default]
    Apply,
    /// Skip them, provided the operator authorized their hash.
    Noop,
    /// Fail when one is reached.
    Refuse,
}

/// Decides whether a privileged operation, identified by its content hash,
/// may be treated as already applied.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, operation_hash: &str) -> bool;
}

pub struct RunnerOptions<'a> {
    pub operations: Vec<MigrationOperation>,
    pub definitions_by_schema: &'a BTreeMap<String, Definitions>,
    pub privileged_mode: PrivilegedMode,
    pub authorizer: &'a dyn Authorizer,
}

/// Applies schema migration operations and records them in the migration log.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, options: RunnerOptions<'_>) -> Result<(), StoreError>;
}

/// The single recorded instance version, stored as `[v]X.Y[.Z]`.
#[async_trait]
pub trait ServiceVersionStore: Send + Sync {
    async fn service_version(&self) -> Result<Option<String>, StoreError>;
    async fn set_service_version(&self, version: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OutOfBandStore: Send + Sync {
    async fn synchronize_metadata(&self) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<OutOfBandMigration>, StoreError>;
    async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<OutOfBandMigration>, StoreError>;
    async fn update_direction(&self, ids: &[i32], apply_reverse: bool) -> Result<(), StoreError>;
}

/// Background engine that advances out-of-band migrations.
#[async_trait]
pub trait OutOfBandRunner: Send + Sync {
    async fn register_migrators(&self) -> Result<(), StoreError>;

    /// Start advancing only `ids` in the background and return immediately.
    fn start_partial(&self, ids: &[i32]);

    fn stop(&self);

    /// Signalled whenever progress changes, for engines that can report it.
    fn progress_notifier(&self) -> Option<Arc<Notify>> {
        None
    }
}

//! In-memory implementation of every collaborator the executor drives.
//!
//! Schema migrations are recorded in the migration log without touching any
//! database, and out-of-band migrations advance by a fixed step on a timer.
//! The whole state serializes, so a plan can be rehearsed across runs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use waypoint_core::{
    Definition, MigrationOperationType, MigrationVersions, OutOfBandMigration, OutOfBandRunner,
    OutOfBandStore, PrivilegedMode, Runner, RunnerOptions, SchemaDescription, SchemaStore,
    ServiceVersionStore, StoreError, privileged_hash,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemorySchema {
    /// Applied migration IDs in application order.
    pub applied: Vec<i32>,
    pub failed: Vec<i32>,
    pub description: SchemaDescription,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryState {
    pub service_version: Option<String>,
    pub schemas: BTreeMap<String, MemorySchema>,
    pub out_of_band_migrations: Vec<OutOfBandMigration>,
}

pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
    metadata: Vec<OutOfBandMigration>,
    registered: AtomicBool,
    worker: Mutex<Option<CancellationToken>>,
    notify: Arc<Notify>,
    progress_step: f64,
    tick: Duration,
}

impl MemoryBackend {
    /// `metadata` is what [`OutOfBandStore::synchronize_metadata`] merges in.
    pub fn new(state: MemoryState, metadata: Vec<OutOfBandMigration>) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            metadata,
            registered: AtomicBool::new(false),
            worker: Mutex::new(None),
            notify: Arc::new(Notify::new()),
            progress_step: 0.1,
            tick: Duration::from_millis(100),
        }
    }

    /// How far each out-of-band migration moves per tick of the engine.
    pub fn with_progress(mut self, step: f64, tick: Duration) -> Self {
        self.progress_step = step.clamp(0.0, 1.0);
        self.tick = tick;
        self
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state.read().clone()
    }

    pub fn is_worker_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    fn apply_operation(
        state: &mut MemoryState,
        schema: &str,
        to_run: Vec<&Definition>,
        up: bool,
    ) -> Vec<i32> {
        let entry = state.schemas.entry(schema.to_string()).or_default();
        let ids: Vec<i32> = to_run.iter().map(|d| d.id).collect();
        if up {
            entry.applied.extend(ids.iter().copied());
            entry.failed.retain(|id| !ids.contains(id));
        } else {
            entry.applied.retain(|id| !ids.contains(id));
        }
        ids
    }
}

#[async_trait]
impl SchemaStore for MemoryBackend {
    async fn describe(&self, schema: &str) -> Result<SchemaDescription, StoreError> {
        Ok(self
            .state
            .read()
            .schemas
            .get(schema)
            .map(|s| s.description.clone())
            .unwrap_or_default())
    }

    async fn versions(&self, schema: &str) -> Result<MigrationVersions, StoreError> {
        Ok(self
            .state
            .read()
            .schemas
            .get(schema)
            .map(|s| MigrationVersions {
                applied: s.applied.clone(),
                pending: Vec::new(),
                failed: s.failed.clone(),
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl Runner for MemoryBackend {
    async fn run(&self, options: RunnerOptions<'_>) -> Result<(), StoreError> {
        for operation in &options.operations {
            let schema = operation.schema_name.as_str();
            let definitions = options
                .definitions_by_schema
                .get(schema)
                .ok_or_else(|| StoreError::UnknownSchema(schema.to_string()))?;
            let up = operation.operation_type == MigrationOperationType::TargetedUp;

            let mut state = self.state.write();
            let applied = state
                .schemas
                .get(schema)
                .map(|s| s.applied.clone())
                .unwrap_or_default();
            let to_run = if up {
                definitions.up(&applied, &operation.target_versions)?
            } else {
                definitions.down(&applied, &operation.target_versions)?
            };

            let privileged: Vec<&Definition> =
                to_run.iter().copied().filter(|d| d.privileged).collect();
            if !privileged.is_empty() {
                match options.privileged_mode {
                    PrivilegedMode::Apply => {}
                    PrivilegedMode::Refuse => {
                        return Err(StoreError::PrivilegedRefused {
                            schema: schema.to_string(),
                            ids: privileged.iter().map(|d| d.id).collect(),
                        });
                    }
                    PrivilegedMode::Noop => {
                        let hash = privileged_hash(privileged.iter().copied()).unwrap_or_default();
                        if !options.authorizer.is_authorized(&hash) {
                            return Err(StoreError::PrivilegedUnauthorized {
                                schema: schema.to_string(),
                                hash,
                            });
                        }
                        tracing::info!(schema, hash = %hash, "privileged migrations applied manually");
                    }
                }
            }

            let ids = Self::apply_operation(&mut state, schema, to_run, up);
            tracing::debug!(schema, ?ids, up, "recorded schema migrations");
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceVersionStore for MemoryBackend {
    async fn service_version(&self) -> Result<Option<String>, StoreError> {
        Ok(self.state.read().service_version.clone())
    }

    async fn set_service_version(&self, version: &str) -> Result<(), StoreError> {
        self.state.write().service_version = Some(version.to_string());
        Ok(())
    }
}

#[async_trait]
impl OutOfBandStore for MemoryBackend {
    async fn synchronize_metadata(&self) -> Result<(), StoreError> {
        let mut state = self.state.write();
        for meta in &self.metadata {
            match state.out_of_band_migrations.iter_mut().find(|m| m.id == meta.id) {
                Some(existing) => {
                    existing.team = meta.team.clone();
                    existing.component = meta.component.clone();
                    existing.description = meta.description.clone();
                    existing.introduced = meta.introduced;
                    existing.deprecated = meta.deprecated;
                    existing.non_destructive = meta.non_destructive;
                    existing.is_enterprise = meta.is_enterprise;
                }
                None => state.out_of_band_migrations.push(meta.clone()),
            }
        }
        state.out_of_band_migrations.sort_by_key(|m| m.id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<OutOfBandMigration>, StoreError> {
        Ok(self.state.read().out_of_band_migrations.clone())
    }

    async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<OutOfBandMigration>, StoreError> {
        let state = self.state.read();
        ids.iter()
            .map(|id| {
                state
                    .out_of_band_migrations
                    .iter()
                    .find(|m| m.id == *id)
                    .cloned()
                    .ok_or(StoreError::UnknownOutOfBandMigration(*id))
            })
            .collect()
    }

    async fn update_direction(&self, ids: &[i32], apply_reverse: bool) -> Result<(), StoreError> {
        let mut state = self.state.write();
        for id in ids {
            let migration = state
                .out_of_band_migrations
                .iter_mut()
                .find(|m| m.id == *id)
                .ok_or(StoreError::UnknownOutOfBandMigration(*id))?;
            migration.apply_reverse = apply_reverse;
        }
        Ok(())
    }
}

#[async_trait]
impl OutOfBandRunner for MemoryBackend {
    async fn register_migrators(&self) -> Result<(), StoreError> {
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn start_partial(&self, ids: &[i32]) {
        if !self.registered.load(Ordering::SeqCst) {
            tracing::warn!("out-of-band migrators are not registered; nothing started");
            return;
        }

        let token = CancellationToken::new();
        if let Some(previous) = self.worker.lock().replace(token.clone()) {
            previous.cancel();
        }

        let state = Arc::clone(&self.state);
        let notify = Arc::clone(&self.notify);
        let ids: BTreeSet<i32> = ids.iter().copied().collect();
        let (step, tick) = (self.progress_step, self.tick);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(tick) => {}
                }

                let all_complete = {
                    let mut state = state.write();
                    let mut all_complete = true;
                    for migration in state
                        .out_of_band_migrations
                        .iter_mut()
                        .filter(|m| ids.contains(&m.id))
                    {
                        migration.progress = if migration.apply_reverse {
                            (migration.progress - step).max(0.0)
                        } else {
                            (migration.progress + step).min(1.0)
                        };
                        all_complete &= migration.complete();
                    }
                    all_complete
                };
                notify.notify_one();
                if all_complete {
                    break;
                }
            }
        });
    }

    fn stop(&self) {
        if let Some(token) = self.worker.lock().take() {
            token.cancel();
        }
    }

    fn progress_notifier(&self) -> Option<Arc<Notify>> {
        Some(Arc::clone(&self.notify))
    }
}

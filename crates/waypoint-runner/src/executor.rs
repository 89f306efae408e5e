use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use waypoint_core::{
    Authorizer, DEFAULT_MIGRATION_LOG_TABLE, MigrationOperation, MigrationOperationType,
    OutOfBandRunner, OutOfBandStore, PrivilegedMode, Runner, RunnerOptions, SchemaStore,
    ServiceVersionStore, Version,
};
use waypoint_drift::{DriftChecker, ExpectedSchemaFactory};
use waypoint_planner::{MigrationPlan, MigrationStep};

use crate::authorize::HashAllowList;
use crate::error::ExecutorError;
use crate::oob::{DEFAULT_POLL_INTERVAL, OutOfBandOptions, run_out_of_band_migrations};

/// Caller intent for one run of a plan.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub privileged_mode: PrivilegedMode,
    /// Hashes of privileged operations the operator applied by hand.
    pub privileged_hashes: Vec<String>,
    pub skip_version_check: bool,
    pub skip_drift_check: bool,
    /// Walk and validate the plan without changing anything.
    pub dry_run: bool,
    pub up: bool,
    pub poll_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            privileged_mode: PrivilegedMode::default(),
            privileged_hashes: Vec::new(),
            skip_version_check: false,
            skip_drift_check: false,
            dry_run: false,
            up: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Walks a [`MigrationPlan`] step by step: schema migrations first, then the
/// out-of-band migrations the step waits on.
pub struct MigrationExecutor {
    schema_store: Arc<dyn SchemaStore>,
    runner: Arc<dyn Runner>,
    service_versions: Arc<dyn ServiceVersionStore>,
    oob_store: Arc<dyn OutOfBandStore>,
    oob_runner: Arc<dyn OutOfBandRunner>,
    factories: Vec<Box<dyn ExpectedSchemaFactory>>,
    schema_names: Vec<String>,
    bookkeeping_table: String,
    authorizer: Option<Arc<dyn Authorizer>>,
}

impl MigrationExecutor {
    pub fn new(
        schema_store: Arc<dyn SchemaStore>,
        runner: Arc<dyn Runner>,
        service_versions: Arc<dyn ServiceVersionStore>,
        oob_store: Arc<dyn OutOfBandStore>,
        oob_runner: Arc<dyn OutOfBandRunner>,
    ) -> Self {
        Self {
            schema_store,
            runner,
            service_versions,
            oob_store,
            oob_runner,
            factories: Vec::new(),
            schema_names: Vec::new(),
            bookkeeping_table: DEFAULT_MIGRATION_LOG_TABLE.to_string(),
            authorizer: None,
        }
    }

    /// Use one backend for every collaborator.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: SchemaStore + Runner + ServiceVersionStore + OutOfBandStore + OutOfBandRunner + 'static,
    {
        Self::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend,
        )
    }

    /// Sources of expected schemas, tried in order during the drift check.
    pub fn with_expected_schemas(mut self, factories: Vec<Box<dyn ExpectedSchemaFactory>>) -> Self {
        self.factories = factories;
        self
    }

    /// Schemas the drift check covers. Defaults to every schema in the plan.
    pub fn with_schema_names(mut self, schema_names: Vec<String>) -> Self {
        self.schema_names = schema_names;
        self
    }

    pub fn with_bookkeeping_table(mut self, table: impl Into<String>) -> Self {
        self.bookkeeping_table = table.into();
        self
    }

    /// Replaces the hash allow-list built from [`RunOptions::privileged_hashes`].
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub async fn run(
        &self,
        plan: &MigrationPlan,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutorError> {
        let live = self.check_version(plan, options).await?;
        if options.skip_drift_check {
            tracing::warn!("skipping drift check");
        } else {
            self.check_drift(plan, live).await?;
        }

        let allow_list = HashAllowList::new(&options.privileged_hashes);
        let authorizer: &dyn Authorizer = self.authorizer.as_deref().unwrap_or(&allow_list);

        for step in &plan.steps {
            if cancel.is_cancelled() {
                return Err(ExecutorError::Cancelled);
            }
            tracing::info!(dry_run = options.dry_run, "migrating to {step}");
            self.run_step(plan, step, options, authorizer, cancel).await?;
        }

        if options.dry_run {
            tracing::info!(to = %plan.to, "dry run complete; service version left unchanged");
            return Ok(());
        }

        // Instance startup only compares major.minor.
        let recorded = format!("{}.{}.0", plan.to.major, plan.to.minor);
        self.service_versions
            .set_service_version(&recorded)
            .await
            .map_err(ExecutorError::ServiceVersion)?;
        tracing::info!(version = %recorded, "recorded service version");
        Ok(())
    }

    /// Returns the live version when one is recorded.
    async fn check_version(
        &self,
        plan: &MigrationPlan,
        options: &RunOptions,
    ) -> Result<Option<Version>, ExecutorError> {
        let recorded = match self.service_versions.service_version().await {
            Ok(recorded) => recorded,
            Err(err) if options.skip_version_check => {
                tracing::warn!(error = %err, "failed to read service version");
                None
            }
            Err(err) => {
                return Err(ExecutorError::VersionAssertion(format!(
                    "failed to read service version: {err}"
                )));
            }
        };
        let live = recorded.as_deref().map(Version::parse).transpose()?;

        if options.skip_version_check {
            tracing::warn!(expected = %plan.from, live = ?live, "skipping version check");
            return Ok(live);
        }
        match live {
            None => Err(ExecutorError::VersionAssertion(
                "no service version is recorded".to_string(),
            )),
            Some(live) if live != plan.from => Err(ExecutorError::VersionAssertion(format!(
                "expected instance to be at {} but it is at {live}",
                plan.from
            ))),
            Some(live) => Ok(Some(live)),
        }
    }

    async fn check_drift(
        &self,
        plan: &MigrationPlan,
        live: Option<Version>,
    ) -> Result<(), ExecutorError> {
        let schema_names: Vec<String> = if self.schema_names.is_empty() {
            plan.stitched_definitions_by_schema_name.keys().cloned().collect()
        } else {
            self.schema_names.clone()
        };
        let version = plan
            .from
            .git_tag_with_patch(live.and_then(|v| v.patch).unwrap_or(0));

        DriftChecker::new(self.schema_store.as_ref(), &self.factories)
            .with_bookkeeping_table(self.bookkeeping_table.clone())
            .assert_no_drift(&schema_names, &version)
            .await?;
        Ok(())
    }

    async fn run_step(
        &self,
        plan: &MigrationPlan,
        step: &MigrationStep,
        options: &RunOptions,
        authorizer: &dyn Authorizer,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutorError> {
        let version = step.instance_version;
        let operation_type = if options.up {
            MigrationOperationType::TargetedUp
        } else {
            MigrationOperationType::TargetedDown
        };

        let mut operations = Vec::new();
        for (schema, leaf_ids) in &step.schema_migration_leaf_ids_by_schema_name {
            if leaf_ids.is_empty() {
                continue;
            }
            let definitions = plan
                .stitched_definitions_by_schema_name
                .get(schema)
                .ok_or_else(|| ExecutorError::UnknownSchema {
                    version,
                    schema: schema.clone(),
                })?;
            definitions
                .ancestors(leaf_ids)
                .map_err(|source| ExecutorError::InvalidStep { version, source })?;

            operations.push(MigrationOperation {
                schema_name: schema.clone(),
                operation_type,
                target_versions: leaf_ids.clone(),
            });
        }

        if options.dry_run {
            for operation in &operations {
                tracing::info!(
                    schema = %operation.schema_name,
                    targets = ?operation.target_versions,
                    "dry run: would migrate schema"
                );
            }
        } else if !operations.is_empty() {
            self.runner
                .run(RunnerOptions {
                    operations,
                    definitions_by_schema: &plan.stitched_definitions_by_schema_name,
                    privileged_mode: options.privileged_mode,
                    authorizer,
                })
                .await
                .map_err(|source| ExecutorError::Runner { version, source })?;
        }

        if step.out_of_band_migration_ids.is_empty() {
            return Ok(());
        }
        if !options.dry_run {
            self.oob_store
                .synchronize_metadata()
                .await
                .map_err(ExecutorError::OutOfBand)?;
            self.oob_runner
                .register_migrators()
                .await
                .map_err(ExecutorError::OutOfBand)?;
        }
        run_out_of_band_migrations(
            self.oob_store.as_ref(),
            self.oob_runner.as_ref(),
            OutOfBandOptions {
                ids: &step.out_of_band_migration_ids,
                up: options.up,
                dry_run: options.dry_run,
                poll_interval: options.poll_interval,
            },
            cancel,
        )
        .await
    }
}

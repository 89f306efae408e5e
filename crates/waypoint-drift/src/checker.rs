use serde::Serialize;
use waypoint_core::{DEFAULT_MIGRATION_LOG_TABLE, SchemaStore};

use crate::compare::{Drift, compare_schemas};
use crate::error::DriftError;
use crate::expected::{ExpectedSchemaFactory, fetch_expected_schema, schema_filename};

/// Comparison result for one schema.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDrift {
    pub schema: String,
    /// Where the expected schema was loaded from.
    pub expected_source: String,
    pub drifts: Vec<Drift>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub version: String,
    pub schemas: Vec<SchemaDrift>,
    /// Schemas with no applied migrations; never compared.
    pub skipped: Vec<String>,
}

impl DriftReport {
    pub fn has_drift(&self) -> bool {
        self.schemas.iter().any(|s| !s.drifts.is_empty())
    }

    pub fn drifted_schemas(&self) -> impl Iterator<Item = &str> {
        self.schemas
            .iter()
            .filter(|s| !s.drifts.is_empty())
            .map(|s| s.schema.as_str())
    }
}

/// Compares live schemas against the schema expected at a release.
pub struct DriftChecker<'a> {
    store: &'a dyn SchemaStore,
    factories: &'a [Box<dyn ExpectedSchemaFactory>],
    bookkeeping_table: String,
}

impl<'a> DriftChecker<'a> {
    pub fn new(store: &'a dyn SchemaStore, factories: &'a [Box<dyn ExpectedSchemaFactory>]) -> Self {
        Self {
            store,
            factories,
            bookkeeping_table: DEFAULT_MIGRATION_LOG_TABLE.to_string(),
        }
    }

    /// Table excluded from comparison because the migration runner owns it.
    pub fn with_bookkeeping_table(mut self, table: impl Into<String>) -> Self {
        self.bookkeeping_table = table.into();
        self
    }

    /// Compare every schema in `schemas` against its expected description
    /// at `version` (a tag such as `v5.2.1`).
    pub async fn check(&self, schemas: &[String], version: &str) -> Result<DriftReport, DriftError> {
        let mut report = DriftReport {
            version: version.to_string(),
            ..Default::default()
        };

        for schema in schemas {
            let versions = self.store.versions(schema).await?;
            if versions.applied.is_empty() {
                tracing::debug!(schema = %schema, "no applied migrations; skipping drift check");
                report.skipped.push(schema.clone());
                continue;
            }

            let live = self.store.describe(schema).await?;
            let expected =
                fetch_expected_schema(self.factories, &schema_filename(schema), version).await?;

            let drifts = compare_schemas(
                &expected.schema.canonicalize_excluding(&self.bookkeeping_table),
                &live.canonicalize_excluding(&self.bookkeeping_table),
            );
            tracing::info!(
                schema = %schema,
                version,
                source = %expected.source,
                drifts = drifts.len(),
                "compared schema"
            );

            report.schemas.push(SchemaDrift {
                schema: schema.clone(),
                expected_source: expected.source,
                drifts,
            });
        }

        Ok(report)
    }

    /// Like [`check`](Self::check), but drift is an error.
    pub async fn assert_no_drift(
        &self,
        schemas: &[String],
        version: &str,
    ) -> Result<DriftReport, DriftError> {
        let report = self.check(schemas, version).await?;
        if !report.has_drift() {
            return Ok(report);
        }

        for schema in report.schemas.iter().filter(|s| !s.drifts.is_empty()) {
            for drift in &schema.drifts {
                tracing::warn!(schema = %schema.schema, "{drift}");
            }
        }
        Err(DriftError::DatabaseDriftDetected {
            report: Box::new(report),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use waypoint_core::{
        ColumnDescription, MigrationVersions, SchemaDescription, StoreError, TableDescription,
    };

    use crate::expected::LocalExpectedSchemaFactory;

    struct FakeStore {
        schemas: BTreeMap<String, (Vec<i32>, SchemaDescription)>,
    }

    #[async_trait]
    impl SchemaStore for FakeStore {
        async fn describe(&self, schema: &str) -> Result<SchemaDescription, StoreError> {
            self.schemas
                .get(schema)
                .map(|(_, d)| d.clone())
                .ok_or_else(|| StoreError::UnknownSchema(schema.to_string()))
        }

        async fn versions(&self, schema: &str) -> Result<MigrationVersions, StoreError> {
            self.schemas
                .get(schema)
                .map(|(applied, _)| MigrationVersions {
                    applied: applied.clone(),
                    ..Default::default()
                })
                .ok_or_else(|| StoreError::UnknownSchema(schema.to_string()))
        }
    }

    fn repo(type_name: &str) -> SchemaDescription {
        SchemaDescription {
            tables: vec![
                TableDescription {
                    name: "repo".into(),
                    columns: vec![ColumnDescription {
                        name: "name".into(),
                        type_name: type_name.into(),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                TableDescription {
                    name: "migration_logs".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    fn bundle(expected: &SchemaDescription) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("v5.1.0");
        fs::create_dir_all(&dir).unwrap();
        let without_log = SchemaDescription {
            tables: expected.tables[..1].to_vec(),
            ..expected.clone()
        };
        fs::write(
            dir.join("schema.json"),
            serde_json::to_string(&without_log).unwrap(),
        )
        .unwrap();
        temp_dir
    }

    #[tokio::test]
    async fn matching_schema_passes() {
        let dir = bundle(&repo("text"));
        let factories: Vec<Box<dyn ExpectedSchemaFactory>> =
            vec![Box::new(LocalExpectedSchemaFactory::new("bundled", dir.path()))];
        let store = FakeStore {
            schemas: BTreeMap::from([("frontend".to_string(), (vec![1], repo("TEXT")))]),
        };

        let report = DriftChecker::new(&store, &factories)
            .assert_no_drift(&["frontend".to_string()], "v5.1.0")
            .await
            .unwrap();
        assert!(!report.has_drift());
        assert_eq!(report.schemas[0].expected_source, "bundled");
    }

    #[tokio::test]
    async fn drift_is_detected() {
        let dir = bundle(&repo("text"));
        let factories: Vec<Box<dyn ExpectedSchemaFactory>> =
            vec![Box::new(LocalExpectedSchemaFactory::new("bundled", dir.path()))];
        let store = FakeStore {
            schemas: BTreeMap::from([("frontend".to_string(), (vec![1], repo("citext")))]),
        };

        let err = DriftChecker::new(&store, &factories)
            .assert_no_drift(&["frontend".to_string()], "v5.1.0")
            .await
            .unwrap_err();
        match err {
            DriftError::DatabaseDriftDetected { report } => {
                assert_eq!(report.drifted_schemas().collect::<Vec<_>>(), vec!["frontend"]);
                assert_eq!(report.schemas[0].drifts[0].name, "repo.name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_schema_is_never_drifted() {
        // No sources at all: the comparison must never be attempted.
        let factories: Vec<Box<dyn ExpectedSchemaFactory>> = Vec::new();
        let store = FakeStore {
            schemas: BTreeMap::from([("codeintel".to_string(), (vec![], repo("anything")))]),
        };

        let report = DriftChecker::new(&store, &factories)
            .assert_no_drift(&["codeintel".to_string()], "v5.1.0")
            .await
            .unwrap();
        assert_eq!(report.skipped, vec!["codeintel"]);
        assert!(report.schemas.is_empty());
    }

    #[tokio::test]
    async fn custom_bookkeeping_table_is_ignored() {
        let dir = bundle(&repo("text"));
        let factories: Vec<Box<dyn ExpectedSchemaFactory>> =
            vec![Box::new(LocalExpectedSchemaFactory::new("bundled", dir.path()))];
        let mut live = repo("text");
        live.tables[1].name = "schema_migrations".into();
        let store = FakeStore {
            schemas: BTreeMap::from([("frontend".to_string(), (vec![1], live))]),
        };

        let checker = DriftChecker::new(&store, &factories);
        assert!(
            checker
                .check(&["frontend".to_string()], "v5.1.0")
                .await
                .unwrap()
                .has_drift()
        );

        let report = checker
            .with_bookkeeping_table("schema_migrations")
            .check(&["frontend".to_string()], "v5.1.0")
            .await
            .unwrap();
        assert!(!report.has_drift());
    }
}

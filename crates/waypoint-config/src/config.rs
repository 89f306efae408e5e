use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use waypoint_core::{DEFAULT_MIGRATION_LOG_TABLE, PrivilegedMode};

/// Where an expected-schema source reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A directory laid out as `{location}/{version}/{filename}`.
    Local,
    /// A URL prefix laid out the same way.
    Remote,
}

/// A version pattern an expected-schema source can serve, with an example
/// version shown to operators when nothing matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionPatternConfig {
    pub pattern: String,
    #[serde(default)]
    pub example: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSourceConfig {
    pub name: String,
    pub kind: SourceKind,
    pub location: String,
    /// Empty means the source is tried for every version.
    #[serde(default)]
    pub patterns: Vec<VersionPatternConfig>,
}

fn default_stitched_migrations() -> PathBuf {
    PathBuf::from("stitched-migrations.json")
}

fn default_out_of_band_migrations() -> PathBuf {
    PathBuf::from("oobmigrations.yaml")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("waypoint-state.json")
}

pub fn default_schema_names() -> Vec<String> {
    ["frontend", "codeintel", "codeinsights"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_migration_log_table() -> String {
    DEFAULT_MIGRATION_LOG_TABLE.to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_expected_schema_sources() -> Vec<SchemaSourceConfig> {
    vec![SchemaSourceConfig {
        name: "bundled".to_string(),
        kind: SourceKind::Local,
        location: "schemas".to_string(),
        patterns: Vec::new(),
    }]
}

/// Top-level waypoint configuration, read from `waypoint.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointConfig {
    #[serde(default = "default_stitched_migrations")]
    pub stitched_migrations: PathBuf,
    #[serde(default = "default_out_of_band_migrations")]
    pub out_of_band_migrations: PathBuf,
    /// Persisted state of the rehearsal backend.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_schema_names")]
    pub schema_names: Vec<String>,
    #[serde(default = "default_migration_log_table")]
    pub migration_log_table: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Tried in order; the first source that loads wins.
    #[serde(default = "default_expected_schema_sources")]
    pub expected_schema_sources: Vec<SchemaSourceConfig>,
    #[serde(default)]
    pub privileged_mode: PrivilegedMode,
}

impl Default for WaypointConfig {
    fn default() -> Self {
        Self {
            stitched_migrations: default_stitched_migrations(),
            out_of_band_migrations: default_out_of_band_migrations(),
            state_file: default_state_file(),
            schema_names: default_schema_names(),
            migration_log_table: default_migration_log_table(),
            poll_interval_ms: default_poll_interval_ms(),
            expected_schema_sources: default_expected_schema_sources(),
            privileged_mode: PrivilegedMode::default(),
        }
    }
}

impl WaypointConfig {
    pub fn stitched_migrations(&self) -> &Path {
        &self.stitched_migrations
    }

    pub fn out_of_band_migrations(&self) -> &Path {
        &self.out_of_band_migrations
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    pub fn schema_names(&self) -> &[String] {
        &self.schema_names
    }

    pub fn migration_log_table(&self) -> &str {
        &self.migration_log_table
    }

    /// How often the out-of-band loop re-reads progress. Never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn expected_schema_sources(&self) -> &[SchemaSourceConfig] {
        &self.expected_schema_sources
    }

    /// Resolve a relative path in this config against `root`.
    pub fn resolve(&self, root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use waypoint_config::FileFormat;
use waypoint_core::{OutOfBandMigration, StitchedMigrationIndex};

/// Read a JSON or YAML document, picking the parser from the extension.
/// Unknown extensions are parsed as JSON.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read file: {}", path.display()))?;

    let format = FileFormat::from_path(path).unwrap_or_default();
    let value = if format.is_yaml() {
        serde_yaml::from_str(&content).with_context(|| format!("parse: {}", path.display()))?
    } else {
        serde_json::from_str(&content).with_context(|| format!("parse: {}", path.display()))?
    };
    Ok(value)
}

/// Write a document in the format implied by the extension, creating parent
/// directories as needed.
pub fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory: {}", parent.display()))?;
    }

    let format = FileFormat::from_path(path).unwrap_or_default();
    let content = if format.is_yaml() {
        serde_yaml::to_string(value).context("serialize yaml")?
    } else {
        serde_json::to_string_pretty(value).context("serialize json")?
    };
    fs::write(path, content).with_context(|| format!("write file: {}", path.display()))?;
    Ok(())
}

/// Load the stitched migration bundle. Leaf IDs are checked against each
/// schema's definition graph while parsing.
pub fn load_stitched_index(path: &Path) -> Result<StitchedMigrationIndex> {
    if !path.exists() {
        anyhow::bail!("stitched migrations not found at: {}", path.display());
    }
    let index: StitchedMigrationIndex =
        read_document(path).context("load stitched migrations")?;
    tracing::debug!(
        path = %path.display(),
        schemas = index.schema_names().len(),
        versions = index.known_versions().len(),
        "loaded stitched migrations"
    );
    Ok(index)
}

/// Load out-of-band migration metadata, sorted by ID. A missing file means
/// there are none.
pub fn load_out_of_band_migrations(path: &Path) -> Result<Vec<OutOfBandMigration>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut migrations: Vec<OutOfBandMigration> =
        read_document(path).context("load out-of-band migrations")?;
    migrations.sort_by_key(|m| m.id);

    if let Some(pair) = migrations.windows(2).find(|pair| pair[0].id == pair[1].id) {
        anyhow::bail!("duplicate out-of-band migration id: {}", pair[0].id);
    }
    Ok(migrations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use waypoint_core::Version;

    const STITCHED_JSON: &str = r#"{
        "frontend": {
            "definitions": [
                {"id": 1, "name": "init"},
                {"id": 2, "name": "add_repo", "parents": [1]}
            ],
            "boundsByRev": {
                "v5.0": {"leafIds": [1]},
                "v5.1": {"leafIds": [2]}
            }
        }
    }"#;

    const STITCHED_YAML: &str = r#"
frontend:
  definitions:
    - id: 1
      name: init
    - id: 2
      name: add_repo
      parents: [1]
  boundsByRev:
    v5.0:
      leafIds: [1]
    v5.1:
      leafIds: [2]
"#;

    #[rstest]
    #[case("stitched.json", STITCHED_JSON)]
    #[case("stitched.yaml", STITCHED_YAML)]
    #[case("stitched.yml", STITCHED_YAML)]
    #[case("stitched", STITCHED_JSON)]
    fn test_load_stitched_index_by_extension(#[case] file: &str, #[case] content: &str) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(file);
        fs::write(&path, content).unwrap();

        let index = load_stitched_index(&path).unwrap();
        assert_eq!(index.schema_names(), ["frontend"]);
        assert_eq!(index.latest_version(), Some(Version::new(5, 1)));
    }

    #[rstest]
    #[case("stitched.json")]
    #[case("stitched")]
    fn test_load_stitched_index_yaml_under_json_name(#[case] file: &str) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(file);
        fs::write(&path, STITCHED_YAML).unwrap();

        let err = load_stitched_index(&path).unwrap_err();
        assert!(format!("{err:#}").contains(file), "{err:#}");
    }

    #[test]
    fn test_load_stitched_index_rejects_unknown_leaf() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stitched.json");
        fs::write(
            &path,
            r#"{"frontend": {"definitions": [{"id": 1, "name": "init"}],
                "boundsByRev": {"v5.0": {"leafIds": [9]}}}}"#,
        )
        .unwrap();

        let err = load_stitched_index(&path).unwrap_err();
        assert!(format!("{err:#}").contains("unknown migration 9"));
    }

    #[test]
    fn test_load_stitched_index_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_stitched_index(&temp_dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("stitched migrations not found"));
    }

    #[test]
    fn test_load_out_of_band_migrations_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("oobmigrations.yaml");
        fs::write(
            &path,
            r#"
- id: 17
  team: search
  component: repo
  description: backfill languages
  introduced: v5.1
  deprecated: v5.3
  nonDestructive: true
- id: 4
  introduced: v5.0
"#,
        )
        .unwrap();

        let migrations = load_out_of_band_migrations(&path).unwrap();
        assert_eq!(migrations.iter().map(|m| m.id).collect::<Vec<_>>(), vec![4, 17]);
        assert_eq!(migrations[1].deprecated, Some(Version::new(5, 3)));
        assert!(migrations[1].non_destructive);
        assert!(migrations[0].deprecated.is_none());
    }

    #[test]
    fn test_load_out_of_band_migrations_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let migrations =
            load_out_of_band_migrations(&temp_dir.path().join("oobmigrations.yaml")).unwrap();
        assert!(migrations.is_empty());
    }

    #[test]
    fn test_load_out_of_band_migrations_duplicate_id() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("oob.json");
        fs::write(
            &path,
            r#"[{"id": 3, "introduced": "v5.0"}, {"id": 3, "introduced": "v5.1"}]"#,
        )
        .unwrap();

        let err = load_out_of_band_migrations(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate out-of-band migration id: 3"));
    }

    #[rstest]
    #[case("nested/dir/state.yaml", "frontend:")]
    #[case("nested/dir/state.yml", "frontend:")]
    #[case("nested/dir/state.json", "\"frontend\": [")]
    fn test_write_document_creates_parents(#[case] file: &str, #[case] marker: &str) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(file);
        let value = BTreeMap::from([("frontend".to_string(), vec![1, 2, 3])]);

        write_document(&path, &value).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains(marker));
        let back: BTreeMap<String, Vec<i32>> = read_document(&path).unwrap();
        assert_eq!(back, value);
    }
}

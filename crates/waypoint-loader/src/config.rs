use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use waypoint_config::WaypointConfig;

pub const CONFIG_FILE: &str = "waypoint.json";

/// Load waypoint.json config from current directory.
pub fn load_config() -> Result<WaypointConfig> {
    let path = PathBuf::from(CONFIG_FILE);
    if !path.exists() {
        anyhow::bail!("waypoint.json not found. Run 'waypoint init' first.");
    }
    parse_config(&path)
}

/// Load config from a specific path.
pub fn load_config_from_path(path: PathBuf) -> Result<WaypointConfig> {
    if !path.exists() {
        anyhow::bail!("waypoint.json not found at: {}", path.display());
    }
    parse_config(&path)
}

fn parse_config(path: &Path) -> Result<WaypointConfig> {
    let content = fs::read_to_string(path).context("read waypoint.json")?;
    let config: WaypointConfig = serde_json::from_str(&content).context("parse waypoint.json")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_from_path_reads_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.json");
        fs::write(&path, r#"{"schemaNames": ["frontend"], "pollIntervalMs": 250}"#).unwrap();

        let config = load_config_from_path(path).unwrap();
        assert_eq!(config.schema_names(), ["frontend".to_string()]);
        assert_eq!(config.poll_interval_ms, 250);
    }

    #[test]
    fn test_load_config_from_path_missing() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_config_from_path(temp_dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(err.to_string().contains("waypoint.json not found at"));
    }

    #[test]
    fn test_load_config_from_path_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        let err = load_config_from_path(path).unwrap_err();
        assert!(err.to_string().contains("parse waypoint.json"));
    }
}

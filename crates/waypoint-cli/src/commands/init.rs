use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use colored::Colorize;
use waypoint_config::WaypointConfig;
use waypoint_loader::CONFIG_FILE;

/// Write a default config to `config`, or to waypoint.json in the current
/// directory.
pub fn cmd_init(config: Option<&Path>) -> Result<()> {
    let path = config.map_or_else(|| PathBuf::from(CONFIG_FILE), Path::to_path_buf);
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    let config = WaypointConfig::default();
    let json = serde_json::to_string_pretty(&config).context("serialize default config")?;
    fs::write(&path, json).context("write waypoint.json")?;
    println!("{} {}", "Created".bright_green(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use waypoint_loader::{load_config, load_config_from_path};

    use crate::utils::testing::CwdGuard;

    #[test]
    #[serial_test::serial]
    fn cmd_init_creates_loadable_config() {
        let tmp = tempdir().unwrap();
        let _guard = CwdGuard::new(tmp.path());

        cmd_init(None).unwrap();
        assert_eq!(load_config().unwrap(), WaypointConfig::default());
    }

    #[test]
    #[serial_test::serial]
    fn cmd_init_fails_when_exists() {
        let tmp = tempdir().unwrap();
        let _guard = CwdGuard::new(tmp.path());

        cmd_init(None).unwrap();
        let err = cmd_init(None).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    #[serial_test::serial]
    fn cmd_init_writes_to_given_path() {
        let tmp = tempdir().unwrap();
        let _guard = CwdGuard::new(tmp.path());
        let path = tmp.path().join("deploy/waypoint.json");
        std::fs::create_dir_all(tmp.path().join("deploy")).unwrap();

        cmd_init(Some(&path)).unwrap();
        assert!(!tmp.path().join(CONFIG_FILE).exists());
        assert_eq!(load_config_from_path(path).unwrap(), WaypointConfig::default());
    }
}

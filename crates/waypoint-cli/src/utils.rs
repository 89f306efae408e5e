use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use waypoint_config::WaypointConfig;
use waypoint_core::{OutOfBandMigration, StitchedMigrationIndex, Version};
use waypoint_loader::{
    load_config, load_config_from_path, load_out_of_band_migrations, load_stitched_index,
    read_document, write_document,
};
use waypoint_runner::{MemoryBackend, MemoryState};

/// The config plus the directory its relative paths are resolved against.
pub struct Project {
    pub root: PathBuf,
    pub config: WaypointConfig,
}

impl Project {
    pub fn path(&self, path: &Path) -> PathBuf {
        self.config.resolve(&self.root, path)
    }

    pub fn index(&self) -> Result<StitchedMigrationIndex> {
        load_stitched_index(&self.path(self.config.stitched_migrations()))
    }

    pub fn out_of_band_migrations(&self) -> Result<Vec<OutOfBandMigration>> {
        load_out_of_band_migrations(&self.path(self.config.out_of_band_migrations()))
    }

    /// Recorded state of the rehearsal backend; empty when nothing ran yet.
    pub fn state(&self) -> Result<MemoryState> {
        let path = self.path(self.config.state_file());
        if !path.exists() {
            return Ok(MemoryState::default());
        }
        read_document(&path).context("load state file")
    }

    pub fn save_state(&self, state: &MemoryState) -> Result<()> {
        write_document(&self.path(self.config.state_file()), state).context("save state file")
    }

    pub fn backend(&self) -> Result<Arc<MemoryBackend>> {
        Ok(Arc::new(MemoryBackend::new(
            self.state()?,
            self.out_of_band_migrations()?,
        )))
    }
}

/// Load the config at `config`, or waypoint.json in the current directory.
/// Relative paths in it resolve against the directory it lives in.
pub fn load_project(config: Option<&Path>) -> Result<Project> {
    let cwd = env::current_dir().context("resolve current directory")?;
    let Some(path) = config else {
        return Ok(Project {
            root: cwd,
            config: load_config()?,
        });
    };

    let path = cwd.join(path);
    let root = path.parent().map_or_else(|| cwd.clone(), Path::to_path_buf);
    Ok(Project {
        root,
        config: load_config_from_path(path)?,
    })
}

pub fn parse_version(raw: &str) -> Result<Version> {
    Version::parse(raw).with_context(|| format!("invalid version: {raw}"))
}

/// The recorded service version, if any.
pub fn recorded_version(state: &MemoryState) -> Result<Option<Version>> {
    state
        .service_version
        .as_deref()
        .map(|raw| Version::parse(raw).context("parse recorded service version"))
        .transpose()
}

/// Cancelled on Ctrl-C.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; stopping after the current operation");
            trigger.cancel();
        }
    });
    token
}

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use waypoint_core::{OutOfBandRunner, OutOfBandStore};
use waypoint_runner::{OutOfBandOptions, run_out_of_band_migrations};

use crate::utils::{load_project, shutdown_token};

/// Drive out-of-band migrations to completion outside of a plan. No ids means
/// every registered migration.
pub async fn cmd_run_out_of_band(
    config: Option<&Path>,
    ids: Vec<i32>,
    down: bool,
    dry_run: bool,
) -> Result<()> {
    let project = load_project(config)?;
    let backend = project.backend()?;

    backend
        .synchronize_metadata()
        .await
        .context("synchronize out-of-band metadata")?;
    backend
        .register_migrators()
        .await
        .context("register out-of-band migrators")?;

    let result = run_out_of_band_migrations(
        backend.as_ref(),
        backend.as_ref(),
        OutOfBandOptions {
            ids: &ids,
            up: !down,
            dry_run,
            poll_interval: project.config.poll_interval(),
        },
        &shutdown_token(),
    )
    .await;
    if !dry_run {
        project.save_state(&backend.snapshot())?;
    }
    result.context("run out-of-band migrations")?;

    let done = if dry_run { "Checked" } else { "Finished" };
    println!("{} {}", done.bright_green().bold(), "out-of-band migrations".bright_white());
    Ok(())
}

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::utils::{Project, load_project, recorded_version};

pub fn cmd_status(config_path: Option<&Path>) -> Result<()> {
    let project = load_project(config_path)?;
    let config = &project.config;
    let state = project.state()?;

    println!("{}", "Configuration:".bright_cyan().bold());
    println!(
        "  {} {}",
        "Stitched migrations:".cyan(),
        config.stitched_migrations().display().to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Out-of-band migrations:".cyan(),
        config.out_of_band_migrations().display().to_string().bright_white()
    );
    println!(
        "  {} {}",
        "State file:".cyan(),
        config.state_file().display().to_string().bright_white()
    );
    println!("  {} {:?}", "Privileged mode:".cyan(), config.privileged_mode);
    println!();

    let version = match recorded_version(&state)? {
        Some(version) => version.to_string().bright_magenta(),
        None => "none".bright_yellow(),
    };
    println!("{} {}", "Service version:".bright_cyan().bold(), version);
    println!("  {}", latest_release(&project));
    println!();

    println!("{}", "Schemas:".bright_cyan().bold());
    for name in config.schema_names() {
        let Some(schema) = state.schemas.get(name) else {
            println!("  {} {} {}", "-".bright_white(), name.bright_green(), "(empty)".bright_black());
            continue;
        };
        println!(
            "  {} {} ({} {}, {} {})",
            "-".bright_white(),
            name.bright_green(),
            schema.applied.len().to_string().bright_blue(),
            "applied".bright_white(),
            schema.failed.len().to_string().bright_blue(),
            "failed".bright_white()
        );
        if !schema.failed.is_empty() {
            println!("    {} {:?}", "Failed:".bright_red(), schema.failed);
        }
    }

    if !state.out_of_band_migrations.is_empty() {
        println!();
        println!("{}", "Out-of-band migrations:".bright_cyan().bold());
        for migration in &state.out_of_band_migrations {
            let progress = format!("{:.0}%", migration.progress * 100.0);
            let progress = if migration.complete() {
                progress.bright_green()
            } else {
                progress.bright_yellow()
            };
            let direction = if migration.apply_reverse { " (reversing)" } else { "" };
            println!(
                "  {} {} {} {}{}",
                "-".bright_white(),
                migration.id.to_string().bright_blue(),
                migration.description.bright_white(),
                progress,
                direction
            );
        }
    }
    Ok(())
}

/// The newest release in the stitched bundle, or why the bundle can't be read.
fn latest_release(project: &Project) -> String {
    match project.index() {
        Ok(index) => match index.latest_version() {
            Some(latest) => format!(
                "{} {}",
                "Latest known release:".cyan(),
                latest.to_string().bright_magenta()
            ),
            None => format!("{} {}", "Latest known release:".cyan(), "none".bright_yellow()),
        },
        Err(err) => format!("{} {err:#}", "Stitched migrations unavailable:".bright_yellow()),
    }
}

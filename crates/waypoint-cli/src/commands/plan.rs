use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use waypoint_core::Version;
use waypoint_planner::{MigrationPlan, MigrationPlanner, serialize_upgrade_plan};

use crate::utils::{Project, load_project, parse_version, recorded_version};

/// Build the plan between `from` and `to`. `from` defaults to the recorded
/// service version and `to` to the newest release in the bundle.
pub fn build_plan(project: &Project, from: Option<&str>, to: Option<&str>) -> Result<MigrationPlan> {
    let index = project.index()?;
    let planner = MigrationPlanner::new(&index);

    let from = match from {
        Some(raw) => parse_version(raw)?,
        None => recorded_version(&project.state()?)?
            .context("no service version is recorded; pass --from")?,
    };
    let to = match to {
        Some(raw) => parse_version(raw)?,
        None => planner.latest_version()?,
    };

    let migrations = project.out_of_band_migrations()?;
    Ok(planner.plan_between(from, to, &migrations)?)
}

pub fn print_plan(plan: &MigrationPlan) {
    let direction = if plan.is_upgrade() { "upgrade" } else { "downgrade" };
    println!(
        "{} {} {} {} ({})",
        "Plan:".bright_cyan().bold(),
        plan.from.to_string().bright_magenta(),
        "->".bright_white(),
        plan.to.to_string().bright_magenta(),
        direction
    );
    for (i, step) in plan.steps.iter().enumerate() {
        println!("  {} {}", format!("{}.", i + 1).bright_white(), step);
    }

    let ids = plan.out_of_band_migration_ids();
    if !ids.is_empty() {
        println!(
            "{} {:?}",
            "Out-of-band migrations:".bright_cyan().bold(),
            ids
        );
    }
}

pub fn cmd_plan(
    config: Option<&Path>,
    from: Option<String>,
    to: Option<String>,
    json: bool,
) -> Result<()> {
    let project = load_project(config)?;
    let plan = build_plan(&project, from.as_deref(), to.as_deref())?;

    if json {
        let view = serialize_upgrade_plan(&plan)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&view).context("serialize plan")?
        );
    } else {
        print_plan(&plan);
    }
    Ok(())
}

/// Refuse a plan that moves the wrong way for the command.
pub fn ensure_direction(from: Version, to: Version, up: bool) -> Result<()> {
    if up && from > to {
        anyhow::bail!("cannot upgrade from {from} to older {to}; use 'waypoint downgrade'");
    }
    if !up && from < to {
        anyhow::bail!("cannot downgrade from {from} to newer {to}; use 'waypoint upgrade'");
    }
    Ok(())
}

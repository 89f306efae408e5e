use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use waypoint_core::PrivilegedMode;
use waypoint_drift::factories_from_config;
use waypoint_planner::MigrationPlan;
use waypoint_runner::{MigrationExecutor, RunOptions};

use super::plan::{build_plan, ensure_direction, print_plan};
use crate::utils::{Project, load_project, shutdown_token};

#[derive(Args, Debug, Clone, Default)]
pub struct MigrateArgs {
    /// Version the instance is at. Defaults to the recorded service version.
    #[arg(long)]
    pub from: Option<String>,
    /// Version to migrate to.
    #[arg(long)]
    pub to: Option<String>,
    /// Upgrade from the recorded version to the newest known release.
    #[arg(long, env = "SRC_AUTOUPGRADE", value_parser = clap::builder::BoolishValueParser::new())]
    pub auto: bool,
    /// Overrides `privilegedMode` from waypoint.json.
    #[arg(long, value_enum)]
    pub privileged_mode: Option<PrivilegedMode>,
    /// Hash of privileged migrations already applied by hand. Repeatable.
    #[arg(long = "privileged-hash")]
    pub privileged_hashes: Vec<String>,
    #[arg(long)]
    pub skip_version_check: bool,
    #[arg(
        long,
        env = "SRC_AUTOUPGRADE_IGNORE_DRIFT",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub skip_drift_check: bool,
    /// Validate and print every step without changing anything.
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn cmd_upgrade(config: Option<&Path>, args: MigrateArgs) -> Result<()> {
    cmd_migrate(config, args, true).await
}

pub async fn cmd_downgrade(config: Option<&Path>, args: MigrateArgs) -> Result<()> {
    if args.auto {
        anyhow::bail!("--auto only applies to upgrades");
    }
    args.to
        .as_deref()
        .context("a downgrade needs an explicit --to version")?;
    cmd_migrate(config, args, false).await
}

async fn cmd_migrate(config: Option<&Path>, args: MigrateArgs, up: bool) -> Result<()> {
    let project = load_project(config)?;
    let to = if args.auto { None } else { args.to.as_deref() };
    let from = if args.auto { None } else { args.from.as_deref() };
    let plan = build_plan(&project, from, to)?;
    ensure_direction(plan.from, plan.to, up)?;

    print_plan(&plan);
    run_plan(&project, &plan, &args, up).await?;

    let verb = if args.dry_run { "Validated" } else { "Migrated" };
    println!(
        "{} {} {} {}",
        verb.bright_green().bold(),
        plan.from.to_string().bright_magenta(),
        "->".bright_white(),
        plan.to.to_string().bright_magenta()
    );
    Ok(())
}

async fn run_plan(project: &Project, plan: &MigrationPlan, args: &MigrateArgs, up: bool) -> Result<()> {
    let config = &project.config;
    let backend = project.backend()?;
    let executor = MigrationExecutor::from_backend(backend.clone())
        .with_expected_schemas(factories_from_config(
            config.expected_schema_sources(),
            &project.root,
        )?)
        .with_schema_names(config.schema_names().to_vec())
        .with_bookkeeping_table(config.migration_log_table());

    let options = RunOptions {
        privileged_mode: args.privileged_mode.unwrap_or(config.privileged_mode),
        privileged_hashes: args.privileged_hashes.clone(),
        skip_version_check: args.skip_version_check,
        skip_drift_check: args.skip_drift_check,
        dry_run: args.dry_run,
        up,
        poll_interval: config.poll_interval(),
    };

    let result = executor.run(plan, &options, &shutdown_token()).await;
    // A failed run leaves the plan partially applied; keep what did happen.
    if !args.dry_run {
        project.save_state(&backend.snapshot())?;
    }
    result.context("run migration plan")
}

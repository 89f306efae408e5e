use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod utils;
use commands::{
    MigrateArgs, cmd_downgrade, cmd_drift, cmd_init, cmd_plan, cmd_run_out_of_band, cmd_status,
    cmd_upgrade,
};

/// waypoint command-line interface.
#[derive(Parser, Debug)]
#[command(name = "waypoint", author, version, about)]
struct Cli {
    /// Path to waypoint.json. Defaults to the one in the current directory.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize waypoint.json with defaults.
    Init,
    /// Show the steps between two releases.
    Plan {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Print the display form as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Compare live schemas against the schema expected at a release.
    Drift {
        /// Defaults to the recorded service version.
        #[arg(long)]
        version: Option<String>,
    },
    /// Upgrade across one or more releases.
    Upgrade(MigrateArgs),
    /// Downgrade to an older release.
    Downgrade(MigrateArgs),
    /// Show the recorded version, schema migrations, and out-of-band progress.
    Status,
    /// Run out-of-band migrations to completion.
    RunOutOfBand {
        /// Migration to run. Repeatable; none means all of them.
        #[arg(long = "id")]
        ids: Vec<i32>,
        /// Reverse the migrations instead.
        #[arg(long)]
        down: bool,
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Init => cmd_init(config),
        Commands::Plan { from, to, json } => cmd_plan(config, from, to, json),
        Commands::Drift { version } => cmd_drift(config, version).await,
        Commands::Upgrade(args) => cmd_upgrade(config, args).await,
        Commands::Downgrade(args) => cmd_downgrade(config, args).await,
        Commands::Status => cmd_status(config),
        Commands::RunOutOfBand { ids, down, dry_run } => {
            cmd_run_out_of_band(config, ids, down, dry_run).await
        }
    }
}

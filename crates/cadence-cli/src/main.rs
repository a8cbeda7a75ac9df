mod cmd_init;
mod cmd_plan;
mod cmd_run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadence", version, about = "Simulate a commit history on a GitHub repository")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a commented sample config
    Init {
        /// Output path (default: cadence.yaml)
        #[arg(default_value = "cadence.yaml")]
        path: PathBuf,
    },
    /// Validate a config and preview the commit plan
    Plan {
        /// Path to the config file
        config: PathBuf,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the simulation against the configured repository
    Run {
        /// Path to the config file
        config: PathBuf,
        /// Run against an in-memory repository instead of GitHub
        #[arg(long)]
        dry_run: bool,
        /// Echo log entries as JSON lines instead of console lines
        #[arg(long)]
        json_events: bool,
        /// Also append every log entry to this JSONL file
        #[arg(long)]
        events: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Init { path } => cmd_init::execute(&path),
        Command::Plan { config, json } => cmd_plan::execute(&config, json),
        Command::Run {
            config,
            dry_run,
            json_events,
            events,
        } => cmd_run::execute(cmd_run::RunParams {
            config_path: &config,
            dry_run,
            json_events,
            events: events.as_deref(),
        }),
    }
}

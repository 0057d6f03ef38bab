//! Ember vault simulator.
//!
//! Replays a JSON scenario script against a vault backed by in-memory
//! tokens and prints a JSON report of members, totals and step outcomes.
//! Saved vault states can be inspected as JSON.

mod report;
mod script;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use ember_vault::{VaultConfig, VaultState};

use crate::report::{RunReport, StateReport};
use crate::script::{Script, Simulation};

/// Replay staking scenarios against an Ember vault.
#[derive(Parser, Debug)]
#[command(name = "ember-sim", version, about = "Replay staking scenarios against an Ember vault")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a script and print the resulting report.
    Run(RunArgs),
    /// Print a saved vault state as JSON.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the JSON scenario script.
    script: PathBuf,

    /// Vault config file (default: <config_dir>/ember/vault.toml, if present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the final vault state to this file.
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Abort on the first failing step instead of recording it.
    #[arg(long)]
    strict: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Path to a state file written by `run --save-state`.
    state: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Inspect(args) => inspect(&args.state),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(VaultConfig::default_path);
    let config = VaultConfig::load(Some(&config_path))
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    info!(path = %config_path.display(), multiplier = ?config.multiplier, "config loaded");

    let text = std::fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read script {}", args.script.display()))?;
    let script: Script = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse script {}", args.script.display()))?;

    let mut sim = Simulation::new(&config, &script.allocator).context("failed to create vault")?;
    let steps = sim.run(&script, args.strict).context("script aborted")?;
    let report = RunReport::build(&sim, steps).context("failed to build report")?;

    if let Some(path) = &args.save_state {
        sim.vault
            .export_state()
            .save(path)
            .with_context(|| format!("failed to save state {}", path.display()))?;
        info!(path = %path.display(), "state saved");
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let state = VaultState::load(path).with_context(|| format!("failed to load state {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&StateReport::from(&state))?);
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Logs go to stderr so the JSON report on stdout stays parseable.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

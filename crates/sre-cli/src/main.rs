//! Shards Runtime Engine - CLI
//!
//! Loads a JSON wire description, runs it on a mesh and prints the result.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sre_core::loader::value_to_json;
use sre_core::{ProcessContext, SreConfig, Value, WireLoader};
use sre_mesh::{FailurePolicy, Mesh};

#[derive(Parser)]
#[command(name = "sre", version, about = "Shards Runtime Engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a wire description until it ends
    Run(RunArgs),
    /// List the registered shards
    Shards,
}

#[derive(Args)]
struct RunArgs {
    /// Wire description (JSON)
    file: PathBuf,
    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Wire input, as JSON
    #[arg(long)]
    input: Option<String>,
    /// Give up after this many mesh ticks
    #[arg(long)]
    max_ticks: Option<u64>,
    /// Restart a failed wire up to this many times
    #[arg(long)]
    restarts: Option<u32>,
    /// Write the failure log to this file
    #[arg(long)]
    failure_log: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Run(args) => run(args),
        Command::Shards => list_shards(),
    };
    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: RunArgs) -> Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => SreConfig::load(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => SreConfig::new(),
    };
    if let Some(ticks) = args.max_ticks {
        config.max_iterations = ticks;
    }
    init_tracing(&config.log_filter);

    let process = ProcessContext::init(config);
    let mut loader = WireLoader::new(&process);
    let wire = loader
        .load_file(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;
    let input = match &args.input {
        Some(text) => {
            let json: serde_json::Value =
                serde_json::from_str(text).context("--input is not valid JSON")?;
            loader.value_from_json(&json)?
        }
        None => Value::None,
    };

    let policy = args
        .restarts
        .map_or(FailurePolicy::Log, |max_attempts| FailurePolicy::Restart { max_attempts });
    let mut mesh = Mesh::new(process.clone()).with_policy(policy);
    let handle = mesh.schedule(wire, input)?;
    let ran = mesh.run_until_idle();
    if let Some(path) = &args.failure_log {
        mesh.failures()
            .persist(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    mesh.terminate()?;
    let ticks = ran?;

    let wire = handle.lock();
    tracing::info!(wire = %wire.name(), ticks, "wire finished");
    match wire.finished_error() {
        Some(error) => {
            eprintln!("wire `{}` failed: {error}", wire.name());
            Ok(ExitCode::FAILURE)
        }
        None => {
            let output = value_to_json(wire.finished_output());
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn list_shards() -> Result<ExitCode> {
    let process = ProcessContext::init(SreConfig::new());
    let registry = process.shards();
    for name in registry.names() {
        let shard = registry.create(&name)?;
        let params = shard
            .parameters()
            .iter()
            .map(|p| p.name)
            .collect::<Vec<_>>()
            .join(", ");
        println!("{name:<10} [{params}] {}", shard.help());
    }
    Ok(ExitCode::SUCCESS)
}

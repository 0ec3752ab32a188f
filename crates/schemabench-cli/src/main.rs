//! CLI for SchemaBench - benchmark constrained-decoding engines on JSON Schemas.

mod progress;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use progress::ProgressDisplay;
use schemabench_core::config::{load_config_with_overrides, BenchConfig, ConfigOverrides};
use schemabench_core::persistence::{generate_run_id, load_samples, SampleStore};
use schemabench_core::reporter::{render, render_outcomes, render_usage};
use schemabench_core::{
    aggregate_by_task, Bench, BenchOptions, EngineRegistry, LocalDataset, TokenUsage,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "schemabench",
    about = "Benchmark constrained-decoding engines against JSON Schema tasks"
)]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the benchmark and print the score table.
    Bench {
        #[command(flatten)]
        overrides: OverrideArgs,
        /// Do not write samples to the runs directory.
        #[arg(long)]
        no_save: bool,
    },

    /// Score a saved samples file.
    Analyze {
        /// NDJSON file written by a previous bench run.
        #[arg(long)]
        outputs: PathBuf,
        /// Also print the per-outcome breakdown.
        #[arg(long)]
        outcomes: bool,
    },

    /// Load and print the resolved configuration.
    ShowConfig {
        #[command(flatten)]
        overrides: OverrideArgs,
    },
}

#[derive(Debug, Args)]
struct OverrideArgs {
    /// Engine name (e.g. openai, gemini).
    #[arg(long)]
    engine: Option<String>,
    /// Comma-separated list of tasks (e.g. --tasks Github_easy,Snowplow).
    #[arg(long, value_delimiter = ',')]
    tasks: Option<Vec<String>>,
    #[arg(long)]
    limit: Option<usize>,
    #[arg(long)]
    dataset_dir: Option<String>,
    #[arg(long)]
    runs_dir: Option<String>,
    /// Override concurrency (generations in flight per task).
    #[arg(long)]
    concurrency: Option<usize>,
}

impl OverrideArgs {
    fn into_overrides(self, save_results: Option<bool>) -> ConfigOverrides {
        ConfigOverrides {
            engine: self.engine,
            tasks: self.tasks,
            limit: self.limit,
            dataset_dir: self.dataset_dir,
            runs_dir: self.runs_dir,
            save_results,
            concurrency: self.concurrency,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Bench { overrides, no_save } => {
            let save = if no_save { Some(false) } else { None };
            let config = load(cli.config.as_deref(), overrides.into_overrides(save))?;
            run_bench(config)
        }
        Command::Analyze { outputs, outcomes } => analyze(&outputs, outcomes),
        Command::ShowConfig { overrides } => {
            let config = load(cli.config.as_deref(), overrides.into_overrides(None))?;
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<BenchConfig> {
    load_config_with_overrides(path, overrides).with_context(|| match path {
        Some(p) => format!("failed to load config from {}", p.display()),
        None => "failed to resolve configuration".to_string(),
    })
}

fn run_bench(config: BenchConfig) -> Result<()> {
    let registry = EngineRegistry::with_builtin();
    let engine = registry.create(&config.engine, &config.engine_settings)?;
    let loader = LocalDataset::new(config.dataset_path());

    let mut bench = Bench::new(engine, Box::new(loader), BenchOptions::from_config(&config));
    if config.save_results {
        let run_id = generate_run_id(&config.engine);
        let run_dir = config.runs_path().join(&run_id);
        let store = SampleStore::new(&run_dir)
            .with_context(|| format!("failed to create run directory {}", run_dir.display()))?;
        info!(run_id = %run_id, dir = %run_dir.display(), "saving samples");
        bench = bench.with_store(run_id, store);
    }
    let events = bench.subscribe();

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        let display = ProgressDisplay::new();
        let display_handle = tokio::spawn(display.run(events));

        let result = bench.run().await;

        let _ = display_handle.await;

        result
    })?;

    println!("{}", report.render());
    println!("{}", render_usage(&report.total_usage));
    Ok(())
}

fn analyze(outputs: &Path, outcomes: bool) -> Result<()> {
    let samples = load_samples(outputs)
        .with_context(|| format!("failed to read samples from {}", outputs.display()))?;
    let tasks = aggregate_by_task(&samples);

    println!("{}", render(&tasks));
    if outcomes {
        println!("{}", render_outcomes(&tasks));
    }
    let usage = samples
        .iter()
        .fold(TokenUsage::default(), |total, s| total + s.token_usage);
    println!("{}", render_usage(&usage));
    Ok(())
}

//! Evolution of play, deceit and affect: batch runner
//!
//! Loads a configuration (or the baseline), runs every replica in parallel
//! and emits each replica's record as soon as that replica finishes.

use clap::Parser;
use evolution_play::output;
use evolution_play::replica::{simple_progress_reporter, ReplicaRecord, ReplicaRunner};
use evolution_play::{Error, ModelConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Command line arguments for the replica runner
#[derive(Parser, Debug)]
#[command(name = "play_model")]
#[command(about = "Evolution of play, deceit and affect in the Prisoner's Dilemma")]
struct Args {
    /// TOML configuration file (defaults to the baseline configuration)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed of replica 0; replica i uses seed + i
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of replicas
    #[arg(long)]
    replicas: Option<usize>,

    /// Override the number of iterations per replica
    #[arg(long)]
    iterations: Option<usize>,

    /// Worker threads (defaults to one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Directory for replicas.jsonl and summary.csv
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Args {
    /// Parsed configuration with overrides applied; the runner validates it
    fn load_config(&self) -> Result<ModelConfig, Error> {
        let mut config = match &self.config {
            Some(path) => ModelConfig::load(path)?,
            None => ModelConfig::baseline(),
        };
        if let Some(seed) = self.seed {
            config.base_seed = Some(seed);
        }
        if let Some(replicas) = self.replicas {
            config.replicas = replicas;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        Ok(config)
    }
}

fn run(args: &Args) -> Result<usize, Error> {
    let config = args.load_config()?;
    let sink = output::record_sink(args.output.as_deref())?;
    let mut runner = ReplicaRunner::new(config)?
        .progress(simple_progress_reporter(1))
        .on_record(sink);
    if let Some(threads) = args.threads {
        runner = runner.num_threads(threads);
    }

    let mut records: Vec<ReplicaRecord> = Vec::new();
    let mut failures = 0;
    for (replica, result) in runner.run()?.into_iter().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(reason) => {
                failures += 1;
                tracing::error!("{}", Error::Replica { replica, reason });
            }
        }
    }

    if let Some(dir) = &args.output {
        output::write_summary_csv(&records, dir.join(output::SUMMARY_FILE))?;
        tracing::info!(dir = %dir.display(), records = records.len(), "wrote output");
    }
    Ok(failures)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            tracing::error!(failures, "some replicas failed");
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

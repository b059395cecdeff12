//! imu-extract: batch step-kinematics extraction from IMU trial recordings

mod batch_service;
mod demo_data;
mod discovery;
mod loader;
mod metrics_table;

use anyhow::{Context, Result};
use batch_service::{BatchConfig, BatchService};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use demo_data::{write_demo_tree, DemoTreeConfig};
use imu_processing::{PipelineConfig, TrialPipeline};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Step kinematics from raw IMU trials", long_about = None)]
struct Cli {
    /// Raise log verbosity to debug (RUST_LOG overrides)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every trial under the input tree and append metrics rows
    Run(RunArgs),
    /// Write a synthetic input tree
    Simulate(SimulateArgs),
    /// Analyze one trial and print every stage result as JSON
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Batch configuration JSON; flags below override it
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Root of the p<N>/p<N><no|yes>/<session> tree
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    root: Option<PathBuf>,

    /// Metrics table to append to
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    #[arg(long)]
    first_patient: Option<u32>,

    #[arg(long)]
    last_patient: Option<u32>,

    /// Trials processed concurrently
    #[arg(short, long)]
    workers: Option<usize>,

    /// Print the batch summary as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Output root
    #[arg(short, long, default_value = "csv", value_hint = ValueHint::DirPath)]
    root: PathBuf,

    #[arg(long, default_value_t = 3)]
    patients: u32,

    #[arg(long, default_value_t = 2)]
    sessions: u32,

    #[arg(long, default_value_t = 100.0)]
    sampling_rate: f64,

    #[arg(long, default_value_t = 7)]
    seed: u64,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Trial CSV inside <patient>/<condition>/<session>
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Pipeline configuration JSON
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Print only the metrics row
    #[arg(long, action = ArgAction::SetTrue)]
    record_only: bool,
}

fn init_tracing(verbose: u8) {
    let default = if verbose > 0 { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Simulate(args) => simulate(args),
        Command::Inspect(args) => inspect(args),
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => BatchConfig::from_json_file(path)?,
        None => BatchConfig::default(),
    };
    if let Some(root) = args.root {
        config.root = root;
    }
    if let Some(output) = args.output {
        config.output = output;
    }
    if let Some(first) = args.first_patient {
        config.first_patient = first;
    }
    if let Some(last) = args.last_patient {
        config.last_patient = last;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    info!("Starting batch with {} workers", config.workers);
    let service = BatchService::new(config).context("Invalid batch configuration")?;
    let summary = service.run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

fn simulate(args: SimulateArgs) -> Result<()> {
    let config = DemoTreeConfig {
        root: args.root,
        patients: args.patients,
        sessions_per_condition: args.sessions,
        sampling_rate: args.sampling_rate,
        seed: args.seed,
    };
    let written = write_demo_tree(&config, chrono::Local::now())?;
    println!("Wrote {} trials under {}", written.len(), config.root.display());
    Ok(())
}

fn load_pipeline_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;
            PipelineConfig::from_json_str(&json)
                .with_context(|| format!("Invalid pipeline config {:?}", path))
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn inspect(args: InspectArgs) -> Result<()> {
    let pipeline = TrialPipeline::new(load_pipeline_config(args.config.as_deref())?)?;
    let id = discovery::trial_id_from_path(&args.input)?;
    let recording = loader::load_trial(&args.input, id)?;
    let analysis = pipeline.analyze(&recording)
        .with_context(|| format!("Failed to analyze {:?}", args.input))?;

    let json = if args.record_only {
        serde_json::to_string_pretty(&analysis.metrics_record())?
    } else {
        serde_json::to_string_pretty(&analysis)?
    };
    println!("{}", json);
    info!(
        "{}: event {} window [{}, {}] in {} us",
        analysis.trial,
        analysis.event_index(),
        analysis.window.start_index(),
        analysis.window.end_index(),
        analysis.total_time_us()
    );
    Ok(())
}

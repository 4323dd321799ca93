use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use flowpilot::core::EnvConfigStore;
use flowpilot::{
    ExecutorSet, FlowDocument, FlowError, FlowService, HttpClientProvider, MemoryStore, PilotConfig,
    Repositories, RunConfig, StopSignal,
};

#[derive(Parser, Debug)]
#[command(name = "flowpilot")]
#[command(about = "Run load-test flows of HTTP, gRPC and GraphQL calls", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a flow document and print the stored steps
    Validate {
        /// Flow document (.json or .toml)
        file: PathBuf,
    },
    /// Configure and run a flow document, then print the run summary
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Flow document (.json or .toml)
    file: PathBuf,

    /// Number of virtual users
    #[arg(long)]
    threads: Option<u32>,

    /// Total run duration in seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Ramp-up window in seconds
    #[arg(long)]
    ramp_up: Option<u64>,

    /// Extra variable, `key=value`; the value is parsed as JSON when possible
    #[arg(long = "var", value_parser = parse_var)]
    vars: Vec<(String, Value)>,

    /// Engine configuration file (.toml or .json)
    #[arg(long, env = "FLOWPILOT_CONFIG")]
    config: Option<PathBuf>,
}

fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Validate { file } => validate(file).await,
        Command::Run(args) => run(args).await,
    };
    if let Err(e) = result {
        eprintln!("error [{}]: {}", e.code().code(), e);
        std::process::exit(1);
    }
}

fn build_service(store: Arc<MemoryStore>, config: &PilotConfig) -> Result<FlowService, FlowError> {
    let provider = HttpClientProvider::new(config.http.clone())?;
    Ok(FlowService::new(
        Repositories::memory(store),
        Arc::new(ExecutorSet::new(&provider)),
        config.max_concurrent_runs,
    ))
}

async fn validate(file: PathBuf) -> Result<(), FlowError> {
    let doc = FlowDocument::load(&file)?;
    let store = Arc::new(MemoryStore::new());
    doc.install(&store).await?;

    let service = build_service(store, &PilotConfig::default())?;
    let steps = service.configure_flow(doc.flow.id, doc.steps.clone()).await?;
    info!(flow_id = doc.flow.id, steps = steps.len(), "Flow is valid");
    println!("{}", to_pretty_json(&steps)?);
    Ok(())
}

async fn run(args: RunArgs) -> Result<(), FlowError> {
    let config = match &args.config {
        Some(path) => PilotConfig::load(path)?,
        None => PilotConfig::default(),
    }
    .overlay(&EnvConfigStore);

    let doc = FlowDocument::load(&args.file)?;
    let run_config = run_config(&args, doc.run.as_ref())?;

    let store = Arc::new(MemoryStore::new());
    doc.install(&store).await?;
    let service = build_service(store, &config)?;
    service.configure_flow(doc.flow.id, doc.steps.clone()).await?;

    let stop = StopSignal::new();
    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping run");
            ctrl_c.trigger();
        }
    });

    let summary = service.run_flow_until(doc.flow.id, run_config, stop).await?;
    println!("{}", to_pretty_json(&summary)?);
    Ok(())
}

/// Command-line flags override the document's `[run]` section.
fn run_config(args: &RunArgs, defaults: Option<&RunConfig>) -> Result<RunConfig, FlowError> {
    let missing = |flag: &str| FlowError::InvalidRunConfig(format!("--{} is required", flag));
    let threads = args
        .threads
        .or(defaults.map(RunConfig::threads))
        .ok_or_else(|| missing("threads"))?;
    let duration = args
        .duration
        .or(defaults.map(RunConfig::total_duration_secs))
        .ok_or_else(|| missing("duration"))?;
    let ramp_up = args
        .ramp_up
        .or(defaults.map(RunConfig::ramp_up_secs))
        .unwrap_or(0);

    let mut variables: Map<String, Value> = defaults.map(|d| d.variables().clone()).unwrap_or_default();
    variables.extend(args.vars.iter().cloned());
    Ok(RunConfig::new(threads, duration, ramp_up)?.with_variables(variables))
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String, FlowError> {
    serde_json::to_string_pretty(value).map_err(|e| FlowError::InternalError(e.to_string()))
}

//! Spotlift: measures and forecasts the traffic impact of broadcast spots.
//!
//! Loads events and telemetry from JSON, runs the batch analysis and emits the
//! JSON report.

use anyhow::Context;
use clap::{Parser, Subcommand};
use spotlift_core::types::EventRecord;
use spotlift_core::AppConfig;
use spotlift_engine::{read_json, AnalysisOrchestrator, EventConversions, InMemorySource};
use spotlift_predict::{HistoricalData, MarketData};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "spotlift")]
#[command(about = "Temporal impact and predictive analytics for broadcast spots")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a batch of events against historical telemetry
    Analyze(AnalyzeArgs),
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// JSON array of events
    #[arg(long)]
    events: PathBuf,

    /// JSON historical data (samples, prior impacts, funnel baseline)
    #[arg(long)]
    history: PathBuf,

    /// JSON map of event id to funnel volumes
    #[arg(long)]
    conversions: Option<PathBuf>,

    /// JSON market context
    #[arg(long)]
    market: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, env = "SPOTLIFT_CONFIG")]
    config: Option<String>,

    /// Concurrent analysis workers (overrides config)
    #[arg(long, env = "SPOTLIFT__ENGINE__WORKERS")]
    workers: Option<usize>,

    /// Per-event timeout in milliseconds (overrides config)
    #[arg(long, env = "SPOTLIFT__ENGINE__EVENT_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spotlift=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => analyze(args).await,
    }
}

async fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(workers) = args.workers {
        config.engine.workers = workers;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.engine.event_timeout_ms = timeout_ms;
    }

    let events: Vec<EventRecord> = load(&args.events)?;
    let history: HistoricalData = load(&args.history)?;
    let conversions: BTreeMap<String, EventConversions> = match &args.conversions {
        Some(path) => load(path)?,
        None => BTreeMap::new(),
    };
    let market: MarketData = match &args.market {
        Some(path) => load(path)?,
        None => MarketData::default(),
    };

    info!(
        events = events.len(),
        samples = history.samples.len(),
        conversions = conversions.len(),
        workers = config.engine.workers,
        "Inputs loaded"
    );

    let source = InMemorySource::new(history).with_conversions(conversions);
    let orchestrator = AnalysisOrchestrator::new(&config, Arc::new(source)).with_market(market);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling batch");
            let _ = cancel_tx.send(true);
        }
    });

    let report = orchestrator.analyze_batch(events, cancel_rx).await;
    let json = serde_json::to_string_pretty(&report).context("serializing report")?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("writing report to {}", path.display()))?;
            info!(path = %path.display(), batch_id = %report.batch_id, "Report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn load<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    read_json(path).with_context(|| format!("loading {}", path.display()))
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use scarebridge::{
    build_sinks, BridgeConfig, DispatchReport, OperatingState, SinkDispatcher,
};
use tracing::{error, info};

/// Drive configured sinks by hand, without a classifier.
#[derive(Parser, Debug)]
#[command(name = "sinkprobe")]
#[command(about = "Apply idle or triggered to the configured scarebridge sinks")]
struct Args {
    /// Path to scarebridge configuration file
    #[arg(short = 'c', long, default_value = "scarebridge.toml")]
    config: PathBuf,

    /// Which state(s) to apply
    #[arg(value_enum, default_value = "cycle")]
    action: Action,

    /// Only drive the sink with this name (repeatable)
    #[arg(short, long)]
    sink: Vec<String>,

    /// Seconds to hold the triggered state when cycling
    #[arg(long, default_value_t = 2.0)]
    hold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum Action {
    Idle,
    Scare,
    /// Triggered, wait, then idle
    Cycle,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = BridgeConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    config.validate().context("Invalid configuration")?;

    let selected: Vec<_> = config
        .sinks
        .iter()
        .filter(|sink| args.sink.is_empty() || args.sink.iter().any(|name| *name == sink.name()))
        .cloned()
        .collect();

    if selected.is_empty() && !args.sink.is_empty() {
        return Err(anyhow!("No configured sink matches {:?}", args.sink));
    }

    let mut dispatcher = SinkDispatcher::new(config.sink_timeout());
    for sink in build_sinks(&selected) {
        dispatcher.register(sink);
    }
    info!("Probing sinks: {}", dispatcher.sink_names().join(", "));

    let mut failed = false;
    match args.action {
        Action::Idle => failed |= apply(&dispatcher, OperatingState::Idle).await,
        Action::Scare => failed |= apply(&dispatcher, OperatingState::Triggered).await,
        Action::Cycle => {
            let hold = Duration::try_from_secs_f64(args.hold)
                .map_err(|e| anyhow!("Invalid hold duration {}: {}", args.hold, e))?;
            failed |= apply(&dispatcher, OperatingState::Triggered).await;
            tokio::time::sleep(hold).await;
            failed |= apply(&dispatcher, OperatingState::Idle).await;
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Returns true when any sink failed
async fn apply(dispatcher: &SinkDispatcher, state: OperatingState) -> bool {
    let report: DispatchReport = dispatcher.apply_all(state).await;
    for failure in &report.failures {
        error!("{}", failure);
    }
    info!(
        "{}: {} delivered, {} failed",
        state,
        report.delivered.len(),
        report.failures.len()
    );
    !report.is_success()
}

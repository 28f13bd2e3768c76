use anyhow::Result;
use clap::Parser;
use scarebridge::{BridgeConfig, BridgeOrchestrator, SourceKind};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "scarebridge")]
#[command(about = "Turn classifier detections into debounced show-control cues")]
#[command(version)]
#[command(long_about = "Reads a stream of classifier observations, debounces them into an \
idle/triggered state machine with cooldown and auto-release, and fans every transition out \
to OSC, process, MIDI and log sinks. All outputs are forced back to idle on shutdown.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "scarebridge.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the bridge")]
    validate_config: bool,

    /// Print an example configuration and exit
    #[arg(long, help = "Print an example configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - force sinks idle but don't start the control loop
    #[arg(long, help = "Perform dry run - initialize sinks but don't read observations")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to daily rotated files in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Label that counts as a detection
    #[arg(long, value_name = "LABEL")]
    label: Option<String>,

    /// Confidence at or above which the label triggers
    #[arg(long, value_name = "CONFIDENCE")]
    scare_conf: Option<f64>,

    /// Minimum seconds between transitions
    #[arg(long, value_name = "SECS")]
    cooldown: Option<f64>,

    /// Seconds in the triggered state before returning to idle (0 disables)
    #[arg(long, value_name = "SECS")]
    scare_duration: Option<f64>,

    /// Observation source
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// Input file for `--source file`
    #[arg(long, value_name = "PATH")]
    input: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_example_config()?;
        return Ok(());
    }

    let log_guard = init_logging(&args)?;

    info!("Starting scarebridge v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match BridgeConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    apply_overrides(&mut config, &args);

    match config.validate() {
        Ok(()) if args.validate_config => {
            info!("Configuration validation successful");
            println!("✓ Configuration is valid");
            return Ok(());
        }
        Ok(()) => {}
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
    }

    let mut orchestrator = BridgeOrchestrator::new(config).await.map_err(|e| {
        error!("Failed to create bridge: {}", e);
        e
    })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize bridge: {}", e);
        e
    })?;

    if args.dry_run {
        info!("Dry run mode - sinks initialized, control loop not started");
        println!("✓ Dry run completed successfully - all sinks initialized");
        return Ok(());
    }

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start bridge: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("Bridge error during execution: {}", e);
        e
    })?;

    info!("scarebridge exited with code: {}", exit_code);
    // process::exit skips destructors; flush file logs first
    drop(log_guard);
    std::process::exit(exit_code);
}

/// Command-line flags take precedence over file and environment settings
fn apply_overrides(config: &mut BridgeConfig, args: &Args) {
    if let Some(label) = &args.label {
        config.trigger.label = label.clone();
    }
    if let Some(confidence) = args.scare_conf {
        config.trigger.confidence_threshold = confidence;
    }
    if let Some(cooldown) = args.cooldown {
        config.trigger.cooldown_secs = cooldown;
    }
    if let Some(duration) = args.scare_duration {
        config.release.auto_release_secs = duration;
    }
    if let Some(kind) = args.source {
        config.source.kind = kind;
    }
    if let Some(path) = &args.input {
        config.source.path = Some(path.clone());
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scarebridge={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let mut layers = vec![fmt_layer];
    let mut guard = None;
    if let Some(dir) = &args.log_dir {
        let appender = tracing_appender::rolling::daily(dir, "scarebridge.log");
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed(),
        );
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print an example configuration in TOML format
fn print_example_config() -> Result<()> {
    println!("# scarebridge configuration file");
    println!("# Every key can also be set as SCAREBRIDGE__<SECTION>__<KEY>");
    println!();
    println!("{}", toml::to_string_pretty(&BridgeConfig::example())?);
    Ok(())
}

//! CAN Telemetry CLI Application
//!
//! This is the command-line front end for the can-telemetry library.
//! It uses the library and adds:
//! - Signal map and frame source selection (flags or config.toml)
//! - Running ingestion on a dedicated thread while polling snapshots
//! - Rendering snapshots as JSON or a text table, refreshed every poll when
//!   writing to a file

use anyhow::{Context, Result};
use can_telemetry::{
    load_signal_map, CancellationToken, CandumpSource, FrameIngestionLoop, FrameSource,
    IngestConfig, IngestSummary, TelemetryStore,
};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mod config;
mod report;

use config::{AppConfig, OutputFormat};

/// How long a cancelled ingestion thread gets to notice before we stop waiting
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// CAN Telemetry - Decode a CAN frame stream against a CSV signal map
#[derive(Parser, Debug)]
#[command(name = "can-telemetry-cli")]
#[command(about = "Decode candump streams into live signal values", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the CSV signal map
    #[arg(short, long, value_name = "FILE")]
    map: Option<PathBuf>,

    /// candump -L log to replay, or "-" to read a live stream from stdin
    #[arg(short, long, value_name = "FILE")]
    input: Option<String>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of raw frames kept in history
    #[arg(long, value_name = "COUNT")]
    raw_capacity: Option<usize>,

    /// Maximum number of frames to ingest (for testing)
    #[arg(long, value_name = "COUNT")]
    max_frames: Option<u64>,

    /// Stop ingesting after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Output format of the final snapshot
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Output file, rewritten on every poll (default: final snapshot to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Snapshot polling interval in milliseconds
    #[arg(long, value_name = "MS")]
    poll_ms: Option<u64>,

    /// List raw frames oldest first
    #[arg(long)]
    oldest_first: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Telemetry CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using telemetry library v{}", can_telemetry::VERSION);

    let config = resolve_config(&args)?;
    run(&config, args.duration.map(Duration::from_secs))
}

/// Merge the optional config file with command-line overrides
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    if let Some(map) = &args.map {
        config.schema.path = map.clone();
    }
    if let Some(input) = &args.input {
        config.source.input = input.clone();
    }
    if let Some(max_frames) = args.max_frames {
        config.source.max_frames = Some(max_frames);
    }
    if let Some(capacity) = args.raw_capacity {
        config.store.raw_capacity = capacity;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(output) = &args.output {
        config.output.path = Some(output.clone());
    }
    if let Some(poll_ms) = args.poll_ms {
        config.output.poll_interval_ms = poll_ms.max(1);
    }
    if args.oldest_first {
        config.output.raw_latest_first = false;
    }

    config.validate()?;
    Ok(config)
}

/// Load the map, ingest until the stream ends (or time runs out), then report
fn run(config: &AppConfig, duration: Option<Duration>) -> Result<()> {
    run_with_source(config, open_source(&config.source.input), duration)
}

fn run_with_source<S>(config: &AppConfig, source: S, duration: Option<Duration>) -> Result<()>
where
    S: FrameSource + Send + 'static,
{
    let table = load_signal_map(&config.schema.path)
        .with_context(|| format!("Failed to load signal map {:?}", config.schema.path))?;
    let stats = table.stats();
    log::info!("Signal map: {} frames, {} signals", stats.num_frames, stats.num_signals);

    let mut ingest_config = IngestConfig::new().with_raw_capacity(config.store.raw_capacity);
    if let Some(max_frames) = config.source.max_frames {
        ingest_config = ingest_config.with_max_frames(max_frames);
    }

    let store = Arc::new(TelemetryStore::from_config(&ingest_config));
    let source_name = source.describe();

    let cancel = CancellationToken::new();
    let handle = FrameIngestionLoop::new(Arc::new(table), Arc::clone(&store))
        .with_config(ingest_config)
        .spawn(source, cancel.clone())?;

    let poll = Duration::from_millis(config.output.poll_interval_ms);
    let started = Instant::now();
    let mut cancelled_at: Option<Instant> = None;

    while !handle.is_finished() {
        thread::sleep(poll);

        log::debug!(
            "Store: {} signals, {} raw frames",
            store.signal_count(),
            store.raw_len()
        );

        // Live sources may never end; keep the output file current
        if let Some(path) = &config.output.path {
            if let Err(e) = render_snapshot(config, &store, &source_name)
                .and_then(|rendered| replace_file(path, &rendered))
            {
                log::warn!("Failed to refresh snapshot: {:#}", e);
            }
        }

        if cancelled_at.is_none() && duration.is_some_and(|d| started.elapsed() >= d) {
            log::info!("Duration elapsed, stopping ingestion");
            cancel.cancel();
            cancelled_at = Some(Instant::now());
        }

        // A source blocked on a quiet bus never observes cancellation
        if cancelled_at.is_some_and(|t| t.elapsed() >= SHUTDOWN_GRACE) {
            log::warn!("Ingestion thread did not stop within {:?}, detaching", SHUTDOWN_GRACE);
            break;
        }
    }

    // None when the thread was left behind blocked in its source
    let outcome = if handle.is_finished() {
        match handle.join() {
            Ok(result) => Some(result.map_err(anyhow::Error::from)),
            Err(_) => Some(Err(anyhow::anyhow!("ingestion thread panicked"))),
        }
    } else {
        None
    };

    // The raw history is still worth writing out when the source failed
    write_snapshot(config, &store, &source_name)?;

    match outcome {
        Some(result) => {
            let summary: IngestSummary =
                result.with_context(|| format!("Ingestion from {} failed", source_name))?;
            log::info!(
                "Done: {} frames received, {} decoded, {} unmapped",
                summary.frames_received,
                summary.frames_decoded,
                summary.frames_unmapped
            );
        }
        None => log::info!(
            "Done: ingestion thread detached while blocked on {}, no summary available",
            source_name
        ),
    }
    Ok(())
}

fn open_source(input: &str) -> Box<dyn FrameSource + Send> {
    if input == "-" {
        log::info!("Reading candump stream from stdin");
        Box::new(CandumpSource::stdin())
    } else {
        log::info!("Replaying candump log: {}", input);
        Box::new(CandumpSource::open_path(input))
    }
}

fn render_snapshot(config: &AppConfig, store: &TelemetryStore, source_name: &str) -> Result<String> {
    let snapshot = store.snapshot();
    let latest_first = config.output.raw_latest_first;

    Ok(match config.output.format {
        OutputFormat::Json => report::render_json(&snapshot, source_name, latest_first)?,
        OutputFormat::Txt => report::render_txt(&snapshot, source_name, latest_first),
    })
}

fn write_snapshot(config: &AppConfig, store: &TelemetryStore, source_name: &str) -> Result<()> {
    let rendered = render_snapshot(config, store, source_name)?;

    match &config.output.path {
        Some(path) => {
            replace_file(path, &rendered)?;
            log::info!("Snapshot written to {:?}", path);
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Write through a temp file in the same directory so readers never see a partial document
fn replace_file(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {:?}", dir))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write snapshot for {:?}", path))?;
    file.persist(path)
        .with_context(|| format!("Failed to write snapshot to {:?}", path))?;
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

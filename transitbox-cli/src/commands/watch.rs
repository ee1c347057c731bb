//! `transitbox watch`: run a live map session against the console renderer.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use transitbox::config::{ConfigFile, ConfigKey};
use transitbox::feed::{FeedSource, HttpFeedFetcher};
use transitbox::logging::{init_logging, LoggingConfig};
use transitbox::session::{LiveMap, LiveMapConfig};
use transitbox::telemetry::TelemetrySnapshot;

use crate::console::ConsoleRenderer;
use crate::error::CliError;

const TELEMETRY_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Built-in source by index or id (see `transitbox sources`)
    #[arg(long, conflicts_with = "url")]
    pub source: Option<String>,

    /// Custom GTFS-Realtime vehicle positions URL
    #[arg(long)]
    pub url: Option<String>,

    /// Vehicle color, e.g. #FF8800
    #[arg(long)]
    pub color: Option<String>,

    /// Polling interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<String>,

    /// Hide vehicles not reported for this many seconds (0 disables)
    #[arg(long)]
    pub stale_after_secs: Option<String>,

    /// Follow this vehicle id with the camera
    #[arg(long)]
    pub follow: Option<String>,

    /// Write every vehicle layer update to stdout as GeoJSON
    #[arg(long)]
    pub geojson: bool,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    pub duration_secs: Option<u64>,
}

/// Status lines go to stderr when stdout carries GeoJSON.
struct Status {
    stderr: bool,
}

impl Status {
    fn line(&self, text: impl Display) {
        if self.stderr {
            eprintln!("{}", text);
        } else {
            println!("{}", text);
        }
    }
}

pub fn run(args: WatchArgs) -> Result<(), CliError> {
    let mut config = ConfigFile::load()?;
    apply_overrides(&mut config, &args)?;
    let source = resolve_source(&config, args.source.as_deref())?;

    let _logging = init_logging(&LoggingConfig::from(&config.logging))?;

    let status = Status {
        stderr: args.geojson,
    };
    status.line(format_args!("TransitBox Live Map v{}", transitbox::VERSION));
    status.line("=========================");
    status.line("");
    status.line(format_args!("Source:   {} ({})", source.label, source.id));
    status.line(format_args!("URL:      {}", source.url));
    status.line(format_args!("Interval: {} ms", config.feed.interval_ms));
    match config.registry.stale_after_secs {
        0 => status.line("Stale:    never"),
        secs => status.line(format_args!("Stale:    after {} s", secs)),
    }
    if let Some(vehicle) = &args.follow {
        status.line(format_args!("Follow:   {}", vehicle));
    }
    status.line("");
    status.line("Press Ctrl+C to stop");
    status.line("");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || signal.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(format!("Failed to start async runtime: {}", e)))?;

    let summary = runtime.block_on(watch(config, source, args, shutdown, &status))?;

    status.line("");
    status.line("Session Summary");
    status.line("───────────────");
    print_summary(&status, &summary);
    Ok(())
}

async fn watch(
    config: ConfigFile,
    source: FeedSource,
    args: WatchArgs,
    shutdown: CancellationToken,
    status: &Status,
) -> Result<TelemetrySnapshot, CliError> {
    let fetcher = Arc::new(HttpFeedFetcher::with_timeout(config.fetch_timeout())?);
    let renderer = Arc::new(ConsoleRenderer::new(args.geojson));
    let map = Arc::new(LiveMap::new(
        renderer.clone(),
        fetcher,
        LiveMapConfig::from(&config),
    ));

    map.select_source(source);
    if let Some(vehicle) = args.follow {
        map.follow(vehicle);
    }
    let session = map.run(shutdown.clone());

    if let Some(secs) = args.duration_secs {
        let deadline = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            deadline.cancel();
        });
    }

    let mut report = tokio::time::interval_at(
        tokio::time::Instant::now() + TELEMETRY_INTERVAL,
        TELEMETRY_INTERVAL,
    );
    report.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = report.tick() => {
                let snapshot = map.telemetry();
                if snapshot.cycles_started > 0 {
                    status.line(format_args!(
                        "[{}] {} | {} tracked",
                        format_uptime(snapshot.uptime),
                        snapshot,
                        map.registry().len()
                    ));
                }
            }
        }
    }

    status.line("");
    status.line("Stopping...");
    session
        .await
        .map_err(|e| CliError::Runtime(format!("Session task failed: {}", e)))?;
    tracing::debug!(updates = renderer.updates(), "Renderer layer updates");
    Ok(map.telemetry())
}

/// Push command-line values through the same validation as `config set`.
fn apply_overrides(config: &mut ConfigFile, args: &WatchArgs) -> Result<(), CliError> {
    let overrides = [
        (ConfigKey::FeedUrl, &args.url),
        (ConfigKey::FeedColor, &args.color),
        (ConfigKey::FeedIntervalMs, &args.interval_ms),
        (ConfigKey::RegistryStaleAfterSecs, &args.stale_after_secs),
    ];
    for (key, value) in overrides {
        if let Some(value) = value {
            key.set(config, value)?;
        }
    }
    if args.source.is_some() {
        config.feed.url = None;
    }
    Ok(())
}

/// `--source` by index or id, else whatever the configuration selects.
fn resolve_source(config: &ConfigFile, choice: Option<&str>) -> Result<FeedSource, CliError> {
    let Some(choice) = choice else {
        return Ok(config.feed_source()?);
    };

    let source = match choice.parse::<usize>() {
        Ok(index) => {
            if index >= FeedSource::presets().len() {
                tracing::warn!(index, "No source at index, using the first");
            }
            FeedSource::preset(index)
        }
        Err(_) => FeedSource::preset_by_id(choice).ok_or_else(|| {
            CliError::Config(format!(
                "Unknown source '{}'. Run 'transitbox sources' to list them.",
                choice
            ))
        })?,
    };

    Ok(match config.feed.color {
        Some(color) => source.with_color(color),
        None => source,
    })
}

fn print_summary(status: &Status, snapshot: &TelemetrySnapshot) {
    status.line(format_args!(
        "  Feed cycles:   {} completed of {} ({:.0}%)",
        snapshot.cycles_completed,
        snapshot.cycles_started,
        snapshot.success_rate() * 100.0
    ));
    status.line(format_args!(
        "  Failures:      {} fetch, {} decode, {} discarded",
        snapshot.fetch_failures, snapshot.decode_failures, snapshot.cycles_discarded
    ));
    status.line(format_args!("  Skipped ticks: {}", snapshot.ticks_skipped));
    status.line(format_args!(
        "  Stale flags:   {}",
        snapshot.stale_warnings
    ));
    status.line(format_args!(
        "  Downloaded:    {} KB",
        snapshot.bytes_fetched / 1024
    ));
    status.line(format_args!(
        "  Camera:        {} applied, {} suppressed",
        snapshot.camera_accepted, snapshot.camera_suppressed
    ));
    status.line(format_args!("  Uptime:        {}", format_uptime(snapshot.uptime)));
}

fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

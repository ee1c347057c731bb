//! Periodic feed ingestion: fetch, decode, merge, publish.
//!
//! # Lifecycle
//!
//! ```text
//!            start(source)                       start(other source)
//!   Stopped ───────────────► Running(gen N) ─────────────────────────► Running(gen N+1)
//!      ▲                          │                                    (registry reset)
//!      └──────── stop() ──────────┘
//! ```
//!
//! Every tick first checks the registry for stale vehicles, then starts a
//! cycle unless a cycle for the same source is still in flight, including
//! one left over from an earlier run of that source. A
//! cycle's merge is gated on the run generation under a lock, so once
//! `stop()` returns no result of the stopped run reaches the registry.
//!
//! No failure ends the loop. Fetch and decode errors are logged, counted and
//! broadcast; the next tick simply tries again.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::decoder::FeedDecoder;
use super::error::{DecodeError, FetchError};
use super::fetch::FeedFetcher;
use super::source::FeedSource;
use crate::registry::{now_secs, MergeSummary, StaleDataWarning, VehicleRegistry};
use crate::telemetry::IngestionMetrics;

/// Shortest accepted polling interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Observable outcome of ingestion work.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestionEvent {
    /// A snapshot was merged into the registry.
    CycleCompleted {
        source_id: String,
        vehicles: usize,
        summary: MergeSummary,
    },
    /// The payload could not be fetched; retried on the next tick.
    FetchFailed { source_id: String, error: FetchError },
    /// The payload could not be decoded; the registry was left untouched.
    DecodeFailed {
        source_id: String,
        error: DecodeError,
    },
    /// Vehicles newly hidden from render output.
    StaleVehicles { warnings: Vec<StaleDataWarning> },
    /// A tick found the previous cycle still running.
    TickSkipped { source_id: String },
}

/// State shared between the engine handle, its poll loop and its cycles.
struct EngineShared {
    fetcher: Arc<dyn FeedFetcher>,
    decoder: FeedDecoder,
    registry: Arc<VehicleRegistry>,
    metrics: Arc<IngestionMetrics>,
    events: broadcast::Sender<IngestionEvent>,
    /// Generation of the current run; bumped on every start and stop.
    generation: Mutex<u64>,
    /// Source ids with a cycle in flight, across runs.
    in_flight: Mutex<HashSet<String>>,
}

struct ActiveRun {
    source: FeedSource,
    interval: Duration,
    cancel: CancellationToken,
}

/// Polls one feed source at a fixed interval and merges into a registry.
pub struct FeedIngestionEngine {
    shared: Arc<EngineShared>,
    run: Mutex<Option<ActiveRun>>,
}

impl FeedIngestionEngine {
    /// Create a stopped engine.
    pub fn new(fetcher: Arc<dyn FeedFetcher>, registry: Arc<VehicleRegistry>) -> Self {
        Self::with_metrics(fetcher, registry, Arc::new(IngestionMetrics::new()))
    }

    /// Create a stopped engine reporting into existing metrics.
    pub fn with_metrics(
        fetcher: Arc<dyn FeedFetcher>,
        registry: Arc<VehicleRegistry>,
        metrics: Arc<IngestionMetrics>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(EngineShared {
                fetcher,
                decoder: FeedDecoder::new(),
                registry,
                metrics,
                events,
                generation: Mutex::new(0),
                in_flight: Mutex::new(HashSet::new()),
            }),
            run: Mutex::new(None),
        }
    }

    /// Start polling `source` every `interval`; the first tick fires at once.
    ///
    /// Starting the source that is already running at the same interval does
    /// nothing. Any other start replaces the current run; a different source
    /// also resets the registry. Returns whether a new run was started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, source: FeedSource, interval: Duration) -> bool {
        let interval = if interval < MIN_POLL_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "Polling interval too short, using minimum"
            );
            MIN_POLL_INTERVAL
        } else {
            interval
        };

        let mut run = self.run.lock();
        if let Some(active) = run.as_ref() {
            if active.source == source && active.interval == interval {
                debug!(source = %source.id, "Ingestion already running");
                return false;
            }
        }
        if let Some(previous) = run.take() {
            self.halt(previous);
        }

        let removed = self
            .shared
            .registry
            .begin_source(&source.id, source.color);
        let generation = {
            let mut current = self.shared.generation.lock();
            *current += 1;
            *current
        };

        info!(
            source = %source.id,
            url = %source.url,
            interval_ms = interval.as_millis() as u64,
            removed,
            "Feed ingestion started"
        );

        let cancel = CancellationToken::new();
        tokio::spawn(poll_loop(
            Arc::clone(&self.shared),
            source.clone(),
            interval,
            generation,
            cancel.clone(),
        ));
        *run = Some(ActiveRun {
            source,
            interval,
            cancel,
        });
        true
    }

    /// Stop polling. A cycle still in flight finishes but is not merged.
    ///
    /// Returns whether a run was stopped.
    pub fn stop(&self) -> bool {
        match self.run.lock().take() {
            Some(active) => {
                info!(source = %active.source.id, "Feed ingestion stopped");
                self.halt(active);
                true
            }
            None => false,
        }
    }

    fn halt(&self, active: ActiveRun) {
        *self.shared.generation.lock() += 1;
        active.cancel.cancel();
    }

    /// Whether a run is active.
    pub fn is_running(&self) -> bool {
        self.run.lock().is_some()
    }

    /// The source being polled, if any.
    pub fn current_source(&self) -> Option<FeedSource> {
        self.run.lock().as_ref().map(|r| r.source.clone())
    }

    /// Subscribe to ingestion events.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestionEvent> {
        self.shared.events.subscribe()
    }

    pub fn registry(&self) -> &Arc<VehicleRegistry> {
        &self.shared.registry
    }

    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.shared.metrics
    }
}

impl Drop for FeedIngestionEngine {
    fn drop(&mut self) {
        if let Some(active) = self.run.get_mut().take() {
            *self.shared.generation.lock() += 1;
            active.cancel.cancel();
        }
    }
}

/// Releases a source's in-flight slot when a cycle ends, including by panic.
struct InFlightGuard {
    shared: Arc<EngineShared>,
    source_id: String,
}

impl InFlightGuard {
    /// Claim the slot for `source_id`, or `None` if a cycle already holds it.
    fn acquire(shared: &Arc<EngineShared>, source_id: &str) -> Option<Self> {
        if !shared.in_flight.lock().insert(source_id.to_string()) {
            return None;
        }
        Some(Self {
            shared: Arc::clone(shared),
            source_id: source_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.shared.in_flight.lock().remove(&self.source_id);
    }
}

async fn poll_loop(
    shared: Arc<EngineShared>,
    source: FeedSource,
    interval: Duration,
    generation: u64,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        shared.check_staleness();

        let Some(guard) = InFlightGuard::acquire(&shared, &source.id) else {
            debug!(source = %source.id, "Previous cycle still in flight, skipping tick");
            shared.metrics.tick_skipped();
            shared.emit(IngestionEvent::TickSkipped {
                source_id: source.id.clone(),
            });
            continue;
        };

        let cycle_shared = Arc::clone(&shared);
        let cycle_source = source.clone();
        tokio::spawn(async move {
            let _guard = guard;
            cycle_shared.run_cycle(&cycle_source, generation).await;
        });
    }

    debug!(source = %source.id, "Poll loop exited");
}

impl EngineShared {
    fn emit(&self, event: IngestionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn check_staleness(&self) {
        let warnings = self.registry.check_staleness(now_secs());
        if !warnings.is_empty() {
            self.metrics.stale_detected(warnings.len());
            self.emit(IngestionEvent::StaleVehicles { warnings });
        }
    }

    async fn run_cycle(&self, source: &FeedSource, generation: u64) {
        let started = Instant::now();
        self.metrics.cycle_started();

        let bytes = match self.fetcher.fetch(&source.url).await {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(source = %source.id, error = %error, "Feed fetch failed");
                self.metrics.fetch_failed();
                self.emit(IngestionEvent::FetchFailed {
                    source_id: source.id.clone(),
                    error,
                });
                return;
            }
        };

        let snapshot = match self.decoder.decode(&bytes) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(
                    source = %source.id,
                    bytes = bytes.len(),
                    error = %error,
                    "Feed decode failed, keeping previous vehicles"
                );
                self.metrics.decode_failed(bytes.len());
                self.emit(IngestionEvent::DecodeFailed {
                    source_id: source.id.clone(),
                    error,
                });
                return;
            }
        };

        let summary = {
            let current = self.generation.lock();
            if *current != generation {
                debug!(source = %source.id, "Run stopped during cycle, discarding snapshot");
                self.metrics.cycle_discarded();
                return;
            }
            self.registry.merge(&snapshot)
        };

        if snapshot.rejected_positions > 0 {
            debug!(
                source = %source.id,
                rejected = snapshot.rejected_positions,
                "Dropped positions with invalid coordinates"
            );
        }

        let vehicles = snapshot.vehicle_count();
        self.metrics.cycle_completed(
            vehicles,
            bytes.len(),
            started.elapsed().as_millis() as u64,
        );
        debug!(
            source = %source.id,
            vehicles,
            feed_timestamp = snapshot.timestamp,
            "Feed cycle completed"
        );
        self.emit(IngestionEvent::CycleCompleted {
            source_id: source.id.clone(),
            vehicles,
            summary,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::decoder::tests::{encode_feed, vehicle_entity};
    use crate::feed::fetch::tests::ScriptedFetcher;
    use crate::registry::RegistryConfig;
    use bytes::Bytes;

    fn feed(ids: &[&str]) -> Result<Bytes, FetchError> {
        let entities = ids
            .iter()
            .map(|id| vehicle_entity(id, 35.0, 139.0))
            .collect();
        Ok(Bytes::from(encode_feed(Some(now_secs()), entities)))
    }

    fn engine(fetcher: ScriptedFetcher) -> (FeedIngestionEngine, Arc<ScriptedFetcher>) {
        let fetcher = Arc::new(fetcher);
        let registry = Arc::new(VehicleRegistry::new(RegistryConfig::without_staleness()));
        let engine = FeedIngestionEngine::new(fetcher.clone(), registry);
        (engine, fetcher)
    }

    async fn next_event(rx: &mut broadcast::Receiver<IngestionEvent>) -> IngestionEvent {
        tokio::time::timeout(Duration::from_secs(60), rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open")
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_merges_immediately() {
        let (engine, _) = engine(ScriptedFetcher::new(vec![feed(&["V1", "V2"])]));
        let mut rx = engine.subscribe();

        assert!(engine.start(FeedSource::preset(0), Duration::from_secs(10)));
        match next_event(&mut rx).await {
            IngestionEvent::CycleCompleted { vehicles, .. } => assert_eq!(vehicles, 2),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(engine.registry().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let (engine, _) = engine(ScriptedFetcher::new(vec![feed(&["V1"])]));
        let source = FeedSource::preset(0);

        assert!(engine.start(source.clone(), Duration::from_secs(10)));
        assert!(!engine.start(source, Duration::from_secs(10)));
        assert!(engine.stop());
        assert!(!engine.stop());
        assert!(!engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_keep_loop_alive() {
        let (engine, fetcher) = engine(ScriptedFetcher::new(vec![
            Err(FetchError::Status {
                url: "u".to_string(),
                status: 500,
            }),
            Ok(Bytes::from_static(&[0xFF, 0xFF, 0xFF])),
            feed(&["V1"]),
        ]));
        let mut rx = engine.subscribe();
        engine.start(FeedSource::preset(0), Duration::from_secs(10));

        assert!(matches!(
            next_event(&mut rx).await,
            IngestionEvent::FetchFailed { .. }
        ));
        assert!(matches!(
            next_event(&mut rx).await,
            IngestionEvent::DecodeFailed { .. }
        ));
        assert!(engine.registry().is_empty());
        assert!(matches!(
            next_event(&mut rx).await,
            IngestionEvent::CycleCompleted { .. }
        ));
        assert_eq!(fetcher.calls(), 3);

        let snapshot = engine.metrics().snapshot();
        assert_eq!(snapshot.fetch_failures, 1);
        assert_eq!(snapshot.decode_failures, 1);
        assert_eq!(snapshot.cycles_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_skips_ticks() {
        let fetcher = ScriptedFetcher::new(vec![feed(&["V1"])]).with_delay(Duration::from_secs(25));
        let (engine, fetcher) = engine(fetcher);
        let mut rx = engine.subscribe();
        engine.start(FeedSource::preset(0), Duration::from_secs(10));

        assert!(matches!(
            next_event(&mut rx).await,
            IngestionEvent::TickSkipped { .. }
        ));
        assert!(matches!(
            next_event(&mut rx).await,
            IngestionEvent::TickSkipped { .. }
        ));
        assert!(matches!(
            next_event(&mut rx).await,
            IngestionEvent::CycleCompleted { .. }
        ));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(engine.metrics().snapshot().ticks_skipped, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_cycle() {
        let fetcher = ScriptedFetcher::new(vec![feed(&["V1"])]).with_delay(Duration::from_secs(5));
        let (engine, fetcher) = engine(fetcher);
        engine.start(FeedSource::preset(0), Duration::from_secs(10));

        // Let the first fetch begin, then stop before it returns.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fetcher.calls(), 1);
        engine.stop();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(engine.registry().is_empty());
        assert_eq!(engine.metrics().snapshot().cycles_discarded, 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_waits_for_previous_cycle_of_same_source() {
        let fetcher = ScriptedFetcher::new(vec![feed(&["V1"])]).with_delay(Duration::from_secs(5));
        let (engine, fetcher) = engine(fetcher);
        let source = FeedSource::preset(0);

        engine.start(source.clone(), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.stop();
        assert!(engine.start(source.clone(), Duration::from_secs(10)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        // New interval, same source: still one fetch at a time.
        assert!(engine.start(source, Duration::from_secs(3)));

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(fetcher.max_concurrent(), 1);
        assert!(fetcher.calls() >= 2);
        assert!(engine.metrics().snapshot().ticks_skipped >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_source_resets_registry() {
        let (engine, _) = engine(ScriptedFetcher::new(vec![feed(&["V1"])]));
        let mut rx = engine.subscribe();

        engine.start(FeedSource::preset(0), Duration::from_secs(10));
        next_event(&mut rx).await;
        assert_eq!(engine.registry().len(), 1);

        // The new run's first cycle has not been polled yet.
        assert!(engine.start(FeedSource::preset(1), Duration::from_secs(10)));
        assert!(engine.registry().is_empty());
        assert_eq!(engine.current_source().map(|s| s.id), Some("bart".to_string()));
    }
}

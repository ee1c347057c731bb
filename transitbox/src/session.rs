//! A live map session: one map view wired to one feed.
//!
//! ```text
//!                      ┌──────────────── LiveMap ─────────────────┐
//! network ──► FeedIngestionEngine ──► VehicleRegistry ──► RenderBridge ──► renderer
//!                      │                                    ▲            │
//! renderer events ──► GestureMonitor ──► CameraArbiter ─────┘            │
//!                      │        ▲                                        │
//!                      │  VehicleTracker (frame ticks)                   │
//!                      └─► EventThrottler (move / moveend) ◄─────────────┘
//! ```
//!
//! The session owns no renderer and no network client; both are injected.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::camera::{CameraIntent, CameraView, GestureMonitor, IntentSource, RendererEvent};
use crate::config::ConfigFile;
use crate::feed::{FeedFetcher, FeedIngestionEngine, FeedSource, IngestionEvent};
use crate::registry::{RegistryConfig, VehicleRegistry};
use crate::render::{MapRenderer, RenderBridge};
use crate::telemetry::{IngestionMetrics, TelemetrySnapshot};
use crate::throttle::{EventThrottler, RatePolicy, SubscriptionId};
use crate::tracking::{TrackingTick, VehicleTracker};

/// Event name for continuous camera movement.
pub const MOVE_EVENT: &str = "move";
/// Event name for the camera coming to rest.
pub const SETTLED_EVENT: &str = "moveend";

/// Timing and policy for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveMapConfig {
    pub poll_interval: Duration,
    pub registry: RegistryConfig,
    pub move_throttle: Duration,
    pub settle_debounce: Duration,
    pub tracking_frame: Duration,
    pub tracking_zoom: f64,
}

impl Default for LiveMapConfig {
    fn default() -> Self {
        Self::from(&ConfigFile::default())
    }
}

impl From<&ConfigFile> for LiveMapConfig {
    fn from(config: &ConfigFile) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            registry: config.registry_config(),
            move_throttle: Duration::from_millis(config.camera.move_throttle_ms),
            settle_debounce: Duration::from_millis(config.camera.settle_debounce_ms),
            tracking_frame: Duration::from_millis(config.camera.tracking_frame_ms),
            tracking_zoom: config.camera.tracking_zoom,
        }
    }
}

#[derive(Debug, Default)]
struct ViewState {
    current: Option<CameraView>,
    settled: Option<CameraView>,
}

/// All components of one live map view.
pub struct LiveMap {
    config: LiveMapConfig,
    registry: Arc<VehicleRegistry>,
    engine: FeedIngestionEngine,
    bridge: RenderBridge,
    tracker: VehicleTracker,
    camera_events: EventThrottler<CameraView>,
    /// The session's own `move`/`moveend` channels, kept across shutdowns.
    view_subscriptions: [SubscriptionId; 2],
    views: Arc<Mutex<ViewState>>,
}

impl LiveMap {
    /// Create a session. Nothing is polled until a source is selected.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        renderer: Arc<dyn MapRenderer>,
        fetcher: Arc<dyn FeedFetcher>,
        config: LiveMapConfig,
    ) -> Self {
        let registry = Arc::new(VehicleRegistry::new(config.registry.clone()));
        let metrics = Arc::new(IngestionMetrics::new());
        let engine = FeedIngestionEngine::with_metrics(fetcher, Arc::clone(&registry), metrics);
        let bridge = RenderBridge::new(renderer, Arc::new(GestureMonitor::new()));
        let tracker = VehicleTracker::new(config.tracking_zoom);

        let camera_events: EventThrottler<CameraView> = EventThrottler::new();
        let views = Arc::new(Mutex::new(ViewState::default()));

        let current = Arc::clone(&views);
        let current_sub = camera_events.subscribe(
            MOVE_EVENT,
            RatePolicy::throttle(config.move_throttle),
            move |view| current.lock().current = Some(view),
        );
        let settled = Arc::clone(&views);
        let settled_sub = camera_events.subscribe(
            SETTLED_EVENT,
            RatePolicy::debounce(config.settle_debounce),
            move |view: CameraView| {
                trace!(center = %view.center, zoom = view.zoom, "Camera settled");
                settled.lock().settled = Some(view);
            },
        );

        Self {
            config,
            registry,
            engine,
            bridge,
            tracker,
            camera_events,
            view_subscriptions: [current_sub, settled_sub],
            views,
        }
    }

    /// Switch to `source`: restart ingestion and fly to its home view.
    ///
    /// Re-selecting the active source changes nothing. Returns whether the
    /// source changed.
    pub fn select_source(&self, source: FeedSource) -> bool {
        let previous = self.engine.current_source();
        if previous.as_ref().map(|s| s.id.as_str()) == Some(source.id.as_str()) {
            return false;
        }

        info!(source = %source.id, label = %source.label, "Selecting feed source");
        if let Some(vehicle) = self.tracker.unfollow() {
            debug!(vehicle = %vehicle, "Tracking cleared by source change");
        }

        let home = source.home;
        self.engine.start(source, self.config.poll_interval);
        // Vehicles of the previous source are gone from the registry.
        self.publish();
        self.bridge
            .request_camera(CameraIntent::to_view(IntentSource::Transition, &home));
        true
    }

    /// Route an event from the renderer.
    pub fn handle_renderer_event(&self, event: RendererEvent) {
        match event {
            RendererEvent::GestureStart(_)
            | RendererEvent::GestureEnd(_)
            | RendererEvent::Device(_) => {
                self.bridge.gestures().observe(&event);
            }
            RendererEvent::CameraMove(view) => {
                self.camera_events.emit(MOVE_EVENT, view);
            }
            RendererEvent::CameraMoveEnd(view) => {
                self.camera_events.emit(SETTLED_EVENT, view);
            }
        }
    }

    /// Subscribe to rate-limited camera events (`move` or `moveend`).
    pub fn on_camera_event<F>(&self, event: &str, policy: RatePolicy, handler: F) -> SubscriptionId
    where
        F: FnMut(CameraView) + Send + 'static,
    {
        self.camera_events.subscribe(event, policy, handler)
    }

    /// Remove a camera event subscription.
    pub fn off_camera_event(&self, id: SubscriptionId) -> bool {
        self.camera_events.unsubscribe(id)
    }

    /// Publish the current vehicles. Returns the number published.
    pub fn publish(&self) -> usize {
        self.bridge.publish_vehicles(&self.registry.list())
    }

    /// Run one tracking tick.
    pub fn tracking_tick(&self) -> TrackingTick {
        if self.tracker.followed().is_none() {
            return TrackingTick::Idle;
        }
        self.tracker.tick(&self.registry.list(), &self.bridge)
    }

    /// Move the camera on behalf of the user.
    pub fn fly_to(&self, view: CameraView) -> bool {
        self.bridge
            .request_camera(CameraIntent::to_view(IntentSource::UserApi, &view))
    }

    pub fn follow(&self, vehicle_id: impl Into<String>) {
        self.tracker.follow(vehicle_id);
    }

    pub fn unfollow(&self) -> Option<String> {
        self.tracker.unfollow()
    }

    /// Spawn the session task: publish after every feed cycle, tick the
    /// tracker every frame, stop ingestion on shutdown.
    pub fn run(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let session = Arc::clone(self);
        let mut events = self.engine.subscribe();
        tokio::spawn(async move {
            let frame = session.config.tracking_frame.max(Duration::from_millis(1));
            let mut frames = tokio::time::interval(frame);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => break,

                    event = events.recv() => match event {
                        Ok(IngestionEvent::CycleCompleted { .. })
                        | Ok(IngestionEvent::StaleVehicles { .. }) => {
                            session.publish();
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(missed)) => {
                            trace!(missed, "Session lagged behind ingestion events");
                            session.publish();
                        }
                        Err(RecvError::Closed) => break,
                    },

                    _ = frames.tick() => {
                        session.tracking_tick();
                    }
                }
            }

            session.shutdown();
        })
    }

    /// Stop ingestion and drop external camera subscriptions.
    ///
    /// The session's own view tracking survives, so it can be run again.
    pub fn shutdown(&self) {
        self.engine.stop();
        let internal = self.view_subscriptions;
        self.camera_events.retain(|id, _| internal.contains(&id));
        info!("Live map session stopped");
    }

    /// Counters for display.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        let arbiter = self.bridge.arbiter();
        self.engine
            .metrics()
            .snapshot()
            .with_camera(arbiter.accepted_count(), arbiter.suppressed_count())
    }

    /// Latest camera view seen by the throttled `move` channel.
    pub fn current_view(&self) -> Option<CameraView> {
        self.views.lock().current
    }

    /// Latest view the camera settled on.
    pub fn settled_view(&self) -> Option<CameraView> {
        self.views.lock().settled
    }

    pub fn registry(&self) -> &Arc<VehicleRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &FeedIngestionEngine {
        &self.engine
    }

    pub fn bridge(&self) -> &RenderBridge {
        &self.bridge
    }

    pub fn tracker(&self) -> &VehicleTracker {
        &self.tracker
    }

    pub fn config(&self) -> &LiveMapConfig {
        &self.config
    }
}

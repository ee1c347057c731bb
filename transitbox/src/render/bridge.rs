//! The only path from the crate to the renderer.
//!
//! Vehicle data goes out as a full [`FeatureCollection`] per publish. Camera
//! moves go through the [`CameraArbiter`] first and reach the renderer only
//! when accepted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use super::features::FeatureCollection;
use crate::camera::{ArbitrationOutcome, CameraArbiter, CameraIntent, GestureMonitor};
use crate::registry::VehicleRecord;

/// The external map renderer.
///
/// Implementations forward to whatever draws the map. Both methods are
/// called synchronously and must not block for long.
pub trait MapRenderer: Send + Sync {
    /// Replace the vehicle layer's data.
    fn set_vehicle_features(&self, features: &FeatureCollection);

    /// Move the camera.
    fn apply_camera(&self, intent: &CameraIntent);
}

/// Connects registry output and camera intents to a [`MapRenderer`].
pub struct RenderBridge {
    renderer: Arc<dyn MapRenderer>,
    arbiter: CameraArbiter,
    publishes: AtomicU64,
}

impl RenderBridge {
    pub fn new(renderer: Arc<dyn MapRenderer>, gestures: Arc<GestureMonitor>) -> Self {
        Self {
            renderer,
            arbiter: CameraArbiter::new(gestures),
            publishes: AtomicU64::new(0),
        }
    }

    /// Publish vehicle records as point features. Returns the feature count.
    pub fn publish_vehicles(&self, records: &[VehicleRecord]) -> usize {
        let features = FeatureCollection::from_records(records);
        self.renderer.set_vehicle_features(&features);
        self.publishes.fetch_add(1, Ordering::Relaxed);
        trace!(vehicles = features.len(), "Published vehicle features");
        features.len()
    }

    /// Submit a camera intent; forward it to the renderer if accepted.
    ///
    /// Returns whether the renderer was asked to move.
    pub fn request_camera(&self, intent: CameraIntent) -> bool {
        self.submit_camera(intent).is_accepted()
    }

    /// Like [`request_camera`](Self::request_camera), returning the full
    /// arbitration outcome.
    ///
    /// Gesture transitions wait while the decision is made and forwarded, so
    /// an accepted tracking intent reaches the renderer before any gesture
    /// that starts concurrently. The renderer must not feed gesture events to
    /// the monitor from inside `apply_camera`.
    pub fn submit_camera(&self, intent: CameraIntent) -> ArbitrationOutcome {
        let _hold = self.arbiter.gestures().hold_transitions();
        let outcome = self.arbiter.submit(&intent);
        if outcome.is_accepted() {
            self.renderer.apply_camera(&intent);
        }
        outcome
    }

    pub fn arbiter(&self) -> &CameraArbiter {
        &self.arbiter
    }

    pub fn gestures(&self) -> &Arc<GestureMonitor> {
        self.arbiter.gestures()
    }

    /// Number of publishes so far.
    pub fn publish_count(&self) -> u64 {
        self.publishes.load(Ordering::Relaxed)
    }
}

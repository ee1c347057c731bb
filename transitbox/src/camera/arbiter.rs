//! Camera arbitration between tracking and user gestures.
//!
//! Two independent mutators compete for the camera: the tracking driver,
//! which wants to re-center on a vehicle every tick, and the user, whose
//! gestures the renderer is animating. A tracking move issued mid-gesture
//! cancels the renderer's gesture handler and leaves it half-committed.
//!
//! The rule is evaluated against the gesture state at decision time:
//!
//! | Source       | Gesture Idle | Gesture Active |
//! |--------------|--------------|----------------|
//! | `Tracking`   | Accepted     | Suppressed     |
//! | `UserApi`    | Accepted     | Accepted       |
//! | `Transition` | Accepted     | Accepted       |
//!
//! Suppressed intents are dropped, never queued or replayed once the gesture
//! ends. The tracker issues a fresh intent on its next tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::gesture::GestureMonitor;
use super::intent::{CameraIntent, IntentSource};

/// Result of submitting an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbitrationOutcome {
    /// The intent may be forwarded to the renderer.
    Accepted,
    /// The intent was dropped; the camera must not be touched.
    Suppressed,
}

impl ArbitrationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ArbitrationOutcome::Accepted)
    }
}

/// Decides whether programmatic camera intents may proceed.
#[derive(Debug)]
pub struct CameraArbiter {
    gestures: Arc<GestureMonitor>,
    accepted: AtomicU64,
    suppressed: AtomicU64,
}

impl CameraArbiter {
    /// Create an arbiter reading gesture state from `gestures`.
    pub fn new(gestures: Arc<GestureMonitor>) -> Self {
        Self {
            gestures,
            accepted: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Decide on an intent.
    pub fn submit(&self, intent: &CameraIntent) -> ArbitrationOutcome {
        if intent.source() == IntentSource::Tracking && self.gestures.is_active() {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            debug!(
                source = %intent.source(),
                gestures = ?self.gestures.active_gestures(),
                "Camera intent suppressed during user gesture"
            );
            return ArbitrationOutcome::Suppressed;
        }

        self.accepted.fetch_add(1, Ordering::Relaxed);
        ArbitrationOutcome::Accepted
    }

    /// The gesture monitor this arbiter consults.
    pub fn gestures(&self) -> &Arc<GestureMonitor> {
        &self.gestures
    }

    /// Number of intents accepted so far.
    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Number of intents suppressed so far.
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }
}

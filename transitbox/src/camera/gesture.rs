//! Gesture monitor: is the user manipulating the camera right now?
//!
//! # State Machine
//!
//! ```text
//!          gesture-start(kind)              gesture-end(last active kind)
//!   Idle ----------------------> Active -------------------------------> Idle
//!                                  |  ^
//!                                  +--+ start/end of other kinds
//! ```
//!
//! Only the renderer's own lifecycle events drive transitions. Raw device
//! events (wheel, pointer, touch) can arrive before the renderer has committed
//! to a gesture, so treating them as authoritative would report `Idle` during
//! exactly the window where a programmatic camera move does the most damage.
//! They are recorded for diagnostics and nothing else.
//!
//! Transitions also take a separate gate lock. Holding the gate through
//! [`GestureMonitor::hold_transitions`] freezes the state while a camera
//! decision is made and forwarded; reads such as
//! [`is_active`](GestureMonitor::is_active) never touch the gate.

use std::fmt;
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use super::intent::CameraView;

/// Interaction modalities the renderer reports lifecycle events for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    ScrollZoom,
    DragPan,
    DragRotate,
    TouchZoomRotate,
    BoxZoom,
}

impl GestureKind {
    /// All kinds, in bit order.
    pub const ALL: [GestureKind; 5] = [
        GestureKind::ScrollZoom,
        GestureKind::DragPan,
        GestureKind::DragRotate,
        GestureKind::TouchZoomRotate,
        GestureKind::BoxZoom,
    ];

    fn bit(self) -> u8 {
        match self {
            GestureKind::ScrollZoom => 1 << 0,
            GestureKind::DragPan => 1 << 1,
            GestureKind::DragRotate => 1 << 2,
            GestureKind::TouchZoomRotate => 1 << 3,
            GestureKind::BoxZoom => 1 << 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GestureKind::ScrollZoom => "scroll-zoom",
            GestureKind::DragPan => "drag-pan",
            GestureKind::DragRotate => "drag-rotate",
            GestureKind::TouchZoomRotate => "touch-zoom-rotate",
            GestureKind::BoxZoom => "box-zoom",
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw input-device events, observed for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Wheel,
    PointerDown,
    PointerMove,
    PointerUp,
    TouchStart,
    TouchEnd,
}

/// Events emitted by the external renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    /// The renderer's handler committed to starting a gesture.
    GestureStart(GestureKind),
    /// The renderer's handler finished a gesture.
    GestureEnd(GestureKind),
    /// A raw input-device event.
    Device(DeviceEvent),
    /// The camera moved (fires continuously during animations and gestures).
    CameraMove(CameraView),
    /// The camera came to rest.
    CameraMoveEnd(CameraView),
}

/// Whether a gesture is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Active,
}

impl GestureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureState::Idle => "Idle",
            GestureState::Active => "Active",
        }
    }
}

impl fmt::Display for GestureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct MonitorInner {
    /// Bit set of active [`GestureKind`]s.
    active: u8,
    last_device_event: Option<(DeviceEvent, Instant)>,
    gestures_started: u64,
}

impl MonitorInner {
    fn state(&self) -> GestureState {
        if self.active == 0 {
            GestureState::Idle
        } else {
            GestureState::Active
        }
    }
}

/// Sole source of truth for whether the user is manipulating the camera.
///
/// Shared between the event router, which feeds it, and the camera arbiter,
/// which queries it on every intent.
#[derive(Debug, Default)]
pub struct GestureMonitor {
    inner: Mutex<MonitorInner>,
    /// Held by every transition and by [`TransitionHold`].
    gate: Mutex<()>,
}

/// Blocks gesture transitions until dropped.
///
/// Lock order is gate then state, so the holder may query the monitor but
/// must not feed it gesture events.
#[must_use = "transitions resume as soon as the hold is dropped"]
pub struct TransitionHold<'a> {
    _gate: MutexGuard<'a, ()>,
}

impl GestureMonitor {
    /// Create a monitor in the `Idle` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a renderer event.
    ///
    /// Returns the new state when the event caused an `Idle`/`Active`
    /// transition.
    pub fn observe(&self, event: &RendererEvent) -> Option<GestureState> {
        match event {
            RendererEvent::GestureStart(kind) => self.gesture_started(*kind),
            RendererEvent::GestureEnd(kind) => self.gesture_ended(*kind),
            RendererEvent::Device(device) => {
                self.inner.lock().last_device_event = Some((*device, Instant::now()));
                None
            }
            RendererEvent::CameraMove(_) | RendererEvent::CameraMoveEnd(_) => None,
        }
    }

    /// Freeze the `Idle`/`Active` state until the returned hold is dropped.
    pub fn hold_transitions(&self) -> TransitionHold<'_> {
        TransitionHold {
            _gate: self.gate.lock(),
        }
    }

    /// Record a gesture start signal.
    pub fn gesture_started(&self, kind: GestureKind) -> Option<GestureState> {
        let _gate = self.gate.lock();
        let mut inner = self.inner.lock();
        let before = inner.state();
        if inner.active & kind.bit() == 0 {
            inner.active |= kind.bit();
            inner.gestures_started += 1;
        }
        let after = inner.state();

        if before != after {
            debug!(gesture = %kind, "Gesture started, camera is user-controlled");
            Some(after)
        } else {
            None
        }
    }

    /// Record a gesture end signal.
    ///
    /// An end without a matching start is ignored.
    pub fn gesture_ended(&self, kind: GestureKind) -> Option<GestureState> {
        let _gate = self.gate.lock();
        let mut inner = self.inner.lock();
        if inner.active & kind.bit() == 0 {
            debug!(gesture = %kind, "Ignoring gesture end without matching start");
            return None;
        }

        inner.active &= !kind.bit();
        if inner.state() == GestureState::Idle {
            debug!(gesture = %kind, "Gesture ended, camera released");
            Some(GestureState::Idle)
        } else {
            None
        }
    }

    /// Whether any gesture is in progress.
    pub fn is_active(&self) -> bool {
        self.inner.lock().active != 0
    }

    /// Current state.
    pub fn state(&self) -> GestureState {
        self.inner.lock().state()
    }

    /// Gesture kinds currently in progress.
    pub fn active_gestures(&self) -> Vec<GestureKind> {
        let active = self.inner.lock().active;
        GestureKind::ALL
            .into_iter()
            .filter(|kind| active & kind.bit() != 0)
            .collect()
    }

    /// Total gestures started since creation.
    pub fn gestures_started(&self) -> u64 {
        self.inner.lock().gestures_started
    }

    /// The most recent raw device event and when it arrived.
    pub fn last_device_event(&self) -> Option<(DeviceEvent, Instant)> {
        self.inner.lock().last_device_event
    }

    /// Forget every active gesture, e.g. after the renderer was recreated and
    /// will never send the matching end events.
    pub fn reset(&self) {
        let _gate = self.gate.lock();
        let mut inner = self.inner.lock();
        if inner.active != 0 {
            debug!("Gesture monitor reset while active");
        }
        inner.active = 0;
    }
}

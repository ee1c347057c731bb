//! Camera arbitration.
//!
//! ```text
//! renderer lifecycle events ──► GestureMonitor ──┐
//!                                                ▼
//! tracking / API / transitions ──► CameraIntent ──► CameraArbiter ──► Accepted | Suppressed
//! ```

mod arbiter;
mod gesture;
mod intent;

pub use arbiter::{ArbitrationOutcome, CameraArbiter};
pub use gesture::{
    DeviceEvent, GestureKind, GestureMonitor, GestureState, RendererEvent, TransitionHold,
};
pub use intent::{
    CameraIntent, CameraMotion, CameraView, IntentSource, LngLat, MAX_PITCH, MAX_ZOOM,
};

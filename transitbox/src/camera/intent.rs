//! Camera intents: requests to move the map camera.
//!
//! Intents are built with [`CameraIntent::tracking`], [`CameraIntent::user`] or
//! [`CameraIntent::transition`] and refined with builder methods. They are
//! plain values handed to the arbiter; nothing stores them.

use std::fmt;

/// Maximum pitch the renderer accepts, in degrees.
pub const MAX_PITCH: f64 = 85.0;

/// Maximum zoom level the renderer accepts.
pub const MAX_ZOOM: f64 = 24.0;

/// A geographic coordinate in longitude/latitude order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

impl fmt::Display for LngLat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lng, self.lat)
    }
}

/// A complete camera pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub center: LngLat,
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
}

impl CameraView {
    pub const fn new(center: LngLat, zoom: f64, bearing: f64, pitch: f64) -> Self {
        Self {
            center,
            zoom,
            bearing,
            pitch,
        }
    }
}

/// Who asked for the camera move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentSource {
    /// Continuous vehicle-following driven by the tracking tick.
    Tracking,
    /// An explicit move requested through the public API.
    UserApi,
    /// A one-off transition such as flying to a newly selected source.
    Transition,
}

impl IntentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentSource::Tracking => "tracking",
            IntentSource::UserApi => "user-api",
            IntentSource::Transition => "transition",
        }
    }

    /// Motion used when the requester does not choose one.
    pub fn default_motion(&self) -> CameraMotion {
        match self {
            IntentSource::Tracking => CameraMotion::Jump,
            IntentSource::UserApi => CameraMotion::Ease,
            IntentSource::Transition => CameraMotion::Fly,
        }
    }
}

impl fmt::Display for IntentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the renderer should animate to the target pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMotion {
    /// Move instantly, no animation.
    Jump,
    /// Short linear animation.
    Ease,
    /// Zoom-out-and-in flight animation.
    Fly,
}

/// A request to change some or all of the camera pose.
///
/// Fields left as `None` keep the renderer's current value.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraIntent {
    source: IntentSource,
    motion: CameraMotion,
    center: Option<LngLat>,
    zoom: Option<f64>,
    bearing: Option<f64>,
    pitch: Option<f64>,
}

impl CameraIntent {
    /// Start an intent with the given source.
    pub fn new(source: IntentSource) -> Self {
        Self {
            source,
            motion: source.default_motion(),
            center: None,
            zoom: None,
            bearing: None,
            pitch: None,
        }
    }

    /// Start a tracking intent.
    pub fn tracking() -> Self {
        Self::new(IntentSource::Tracking)
    }

    /// Start a user API intent.
    pub fn user() -> Self {
        Self::new(IntentSource::UserApi)
    }

    /// Start a transition intent.
    pub fn transition() -> Self {
        Self::new(IntentSource::Transition)
    }

    /// Intent targeting a full camera pose.
    pub fn to_view(source: IntentSource, view: &CameraView) -> Self {
        Self::new(source)
            .center(view.center)
            .zoom(view.zoom)
            .bearing(view.bearing)
            .pitch(view.pitch)
    }

    pub fn center(mut self, center: LngLat) -> Self {
        self.center = Some(center);
        self
    }

    /// Set the zoom level, clamped to `0..=MAX_ZOOM`.
    pub fn zoom(mut self, zoom: f64) -> Self {
        self.zoom = Some(zoom.clamp(0.0, MAX_ZOOM));
        self
    }

    /// Set the bearing, normalized to `[0, 360)`.
    pub fn bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing.rem_euclid(360.0));
        self
    }

    /// Set the pitch, clamped to `0..=MAX_PITCH`.
    pub fn pitch(mut self, pitch: f64) -> Self {
        self.pitch = Some(pitch.clamp(0.0, MAX_PITCH));
        self
    }

    pub fn motion(mut self, motion: CameraMotion) -> Self {
        self.motion = motion;
        self
    }

    pub fn source(&self) -> IntentSource {
        self.source
    }

    pub fn motion_kind(&self) -> CameraMotion {
        self.motion
    }

    pub fn target_center(&self) -> Option<LngLat> {
        self.center
    }

    pub fn target_zoom(&self) -> Option<f64> {
        self.zoom
    }

    pub fn target_bearing(&self) -> Option<f64> {
        self.bearing
    }

    pub fn target_pitch(&self) -> Option<f64> {
        self.pitch
    }

    /// Whether the intent would change anything at all.
    pub fn is_empty(&self) -> bool {
        self.center.is_none() && self.zoom.is_none() && self.bearing.is_none() && self.pitch.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_motion_per_source() {
        assert_eq!(CameraIntent::tracking().motion_kind(), CameraMotion::Jump);
        assert_eq!(CameraIntent::user().motion_kind(), CameraMotion::Ease);
        assert_eq!(CameraIntent::transition().motion_kind(), CameraMotion::Fly);
    }

    #[test]
    fn test_builder_normalizes_values() {
        let intent = CameraIntent::user()
            .bearing(-90.0)
            .pitch(120.0)
            .zoom(30.0);

        assert_eq!(intent.target_bearing(), Some(270.0));
        assert_eq!(intent.target_pitch(), Some(MAX_PITCH));
        assert_eq!(intent.target_zoom(), Some(MAX_ZOOM));
    }

    #[test]
    fn test_to_view_sets_every_field() {
        let view = CameraView::new(LngLat::new(77.61, 12.95), 10.0, 0.0, 60.0);
        let intent = CameraIntent::to_view(IntentSource::Transition, &view);

        assert_eq!(intent.source(), IntentSource::Transition);
        assert_eq!(intent.target_center(), Some(LngLat::new(77.61, 12.95)));
        assert_eq!(intent.target_zoom(), Some(10.0));
        assert_eq!(intent.target_pitch(), Some(60.0));
        assert!(!intent.is_empty());
    }

    #[test]
    fn test_empty_intent() {
        assert!(CameraIntent::tracking().is_empty());
    }

    #[test]
    fn test_source_display() {
        assert_eq!(IntentSource::Tracking.to_string(), "tracking");
        assert_eq!(IntentSource::UserApi.to_string(), "user-api");
    }
}

//! Following a single vehicle with the camera.
//!
//! The tracker turns the followed vehicle's latest position into a
//! `Tracking` camera intent on every tick. It holds no memory of suppressed
//! ticks: when a gesture ends, the next tick simply submits the vehicle's
//! position at that moment.

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::camera::{ArbitrationOutcome, CameraIntent, LngLat};
use crate::registry::VehicleRecord;
use crate::render::RenderBridge;

/// Zoom level used while following a vehicle.
pub const DEFAULT_TRACKING_ZOOM: f64 = 15.0;

/// Result of one tracking tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingTick {
    /// No vehicle is followed.
    Idle,
    /// The followed vehicle is not in the current render list.
    VehicleMissing,
    /// An intent was submitted to the arbiter.
    Submitted(ArbitrationOutcome),
}

/// Follows one vehicle by emitting tracking intents.
#[derive(Debug)]
pub struct VehicleTracker {
    followed: Mutex<Option<String>>,
    zoom: f64,
    follow_heading: bool,
}

impl Default for VehicleTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKING_ZOOM)
    }
}

impl VehicleTracker {
    pub fn new(zoom: f64) -> Self {
        Self {
            followed: Mutex::new(None),
            zoom,
            follow_heading: true,
        }
    }

    /// Rotate the camera to the vehicle's heading when it reports one.
    pub fn with_follow_heading(mut self, follow_heading: bool) -> Self {
        self.follow_heading = follow_heading;
        self
    }

    /// Start following `vehicle_id`, replacing any previous target.
    pub fn follow(&self, vehicle_id: impl Into<String>) {
        let vehicle_id = vehicle_id.into();
        info!(vehicle = %vehicle_id, "Tracking vehicle");
        *self.followed.lock() = Some(vehicle_id);
    }

    /// Stop following. Returns the previous target.
    pub fn unfollow(&self) -> Option<String> {
        let previous = self.followed.lock().take();
        if let Some(id) = &previous {
            info!(vehicle = %id, "Stopped tracking vehicle");
        }
        previous
    }

    pub fn followed(&self) -> Option<String> {
        self.followed.lock().clone()
    }

    /// The intent that centers the camera on `record`.
    pub fn intent_for(&self, record: &VehicleRecord) -> CameraIntent {
        let mut intent = CameraIntent::tracking()
            .center(LngLat::new(record.longitude, record.latitude))
            .zoom(self.zoom);
        if self.follow_heading {
            if let Some(heading) = record.heading {
                intent = intent.bearing(f64::from(heading));
            }
        }
        intent
    }

    /// Submit a tracking intent for the followed vehicle.
    pub fn tick(&self, vehicles: &[VehicleRecord], bridge: &RenderBridge) -> TrackingTick {
        let Some(target) = self.followed() else {
            return TrackingTick::Idle;
        };

        match vehicles.iter().find(|v| v.id == target) {
            Some(record) => TrackingTick::Submitted(bridge.submit_camera(self.intent_for(record))),
            None => {
                debug!(vehicle = %target, "Tracked vehicle not in render list");
                TrackingTick::VehicleMissing
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::GestureKind;
    use crate::registry::Color;
    use crate::render::recording_bridge;

    fn record(id: &str, lon: f64, lat: f64, heading: Option<f32>) -> VehicleRecord {
        VehicleRecord {
            id: id.to_string(),
            latitude: lat,
            longitude: lon,
            heading,
            speed: None,
            route_id: None,
            trip_id: None,
            label: id.to_string(),
            observed_at: 0,
            color: Color::default(),
        }
    }

    #[test]
    fn test_idle_without_target() {
        let (renderer, bridge) = recording_bridge();
        let tracker = VehicleTracker::default();

        assert_eq!(tracker.tick(&[record("V1", 0.0, 0.0, None)], &bridge), TrackingTick::Idle);
        assert!(renderer.cameras.lock().is_empty());
    }

    #[test]
    fn test_tick_centers_on_vehicle() {
        let (renderer, bridge) = recording_bridge();
        let tracker = VehicleTracker::new(14.0);
        tracker.follow("V1");

        let vehicles = [record("V0", 1.0, 1.0, None), record("V1", 139.77, 35.68, Some(450.0))];
        assert_eq!(
            tracker.tick(&vehicles, &bridge),
            TrackingTick::Submitted(ArbitrationOutcome::Accepted)
        );

        let cameras = renderer.cameras.lock();
        assert_eq!(cameras[0].target_center(), Some(LngLat::new(139.77, 35.68)));
        assert_eq!(cameras[0].target_zoom(), Some(14.0));
        assert_eq!(cameras[0].target_bearing(), Some(90.0));
    }

    #[test]
    fn test_missing_vehicle() {
        let (_, bridge) = recording_bridge();
        let tracker = VehicleTracker::default();
        tracker.follow("V9");

        assert_eq!(
            tracker.tick(&[record("V1", 0.0, 0.0, None)], &bridge),
            TrackingTick::VehicleMissing
        );
    }

    #[test]
    fn test_resumes_after_gesture_without_catch_up() {
        let (renderer, bridge) = recording_bridge();
        let tracker = VehicleTracker::default().with_follow_heading(false);
        tracker.follow("V1");

        bridge.gestures().gesture_started(GestureKind::DragPan);
        let during = tracker.tick(&[record("V1", 10.0, 10.0, Some(45.0))], &bridge);
        assert_eq!(during, TrackingTick::Submitted(ArbitrationOutcome::Suppressed));

        bridge.gestures().gesture_ended(GestureKind::DragPan);
        tracker.tick(&[record("V1", 11.0, 11.0, Some(45.0))], &bridge);

        let cameras = renderer.cameras.lock();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].target_center(), Some(LngLat::new(11.0, 11.0)));
        assert_eq!(cameras[0].target_bearing(), None);
    }

    #[test]
    fn test_unfollow() {
        let tracker = VehicleTracker::default();
        tracker.follow("V1");
        assert_eq!(tracker.unfollow(), Some("V1".to_string()));
        assert_eq!(tracker.followed(), None);
    }
}

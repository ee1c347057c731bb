//! A renderer that writes to the terminal.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use transitbox::camera::CameraIntent;
use transitbox::render::{FeatureCollection, MapRenderer};

/// Prints vehicle layer updates and camera moves instead of drawing them.
pub struct ConsoleRenderer {
    geojson: bool,
    updates: AtomicU64,
}

impl ConsoleRenderer {
    /// With `geojson` set, every layer update is written as one line of
    /// GeoJSON instead of a summary.
    pub fn new(geojson: bool) -> Self {
        Self {
            geojson,
            updates: AtomicU64::new(0),
        }
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }
}

impl MapRenderer for ConsoleRenderer {
    fn set_vehicle_features(&self, features: &FeatureCollection) {
        self.updates.fetch_add(1, Ordering::Relaxed);

        if self.geojson {
            match features.to_json() {
                Ok(json) => {
                    let mut out = std::io::stdout().lock();
                    let _ = writeln!(out, "{}", json);
                }
                Err(e) => tracing::warn!(error = %e, "Failed to serialize vehicle layer"),
            }
            return;
        }

        println!("vehicles: {}", features.len());
    }

    fn apply_camera(&self, intent: &CameraIntent) {
        if self.geojson {
            return;
        }
        println!("{}", describe_camera(intent));
    }
}

/// One-line description of a camera intent.
pub fn describe_camera(intent: &CameraIntent) -> String {
    let mut line = format!("camera [{}] {:?}", intent.source(), intent.motion_kind());
    if let Some(center) = intent.target_center() {
        line.push_str(&format!(" center {}", center));
    }
    if let Some(zoom) = intent.target_zoom() {
        line.push_str(&format!(" zoom {:.1}", zoom));
    }
    if let Some(bearing) = intent.target_bearing() {
        line.push_str(&format!(" bearing {:.0}", bearing));
    }
    if let Some(pitch) = intent.target_pitch() {
        line.push_str(&format!(" pitch {:.0}", pitch));
    }
    line
}

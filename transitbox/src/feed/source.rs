//! Feed sources: where vehicle positions come from and how the map frames them.

use std::fmt;

use crate::camera::{CameraView, LngLat};
use crate::registry::Color;

/// Default polling interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// A polled vehicle-position feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSource {
    /// Stable identifier; switching to a source with another id resets the
    /// registry.
    pub id: String,
    /// Human-readable name.
    pub label: String,
    /// Vehicle-position endpoint.
    pub url: String,
    /// Color given to every vehicle of this source.
    pub color: Color,
    /// Camera pose the map flies to when the source is selected.
    pub home: CameraView,
}

impl FeedSource {
    /// A user-supplied feed URL with the default color and a world view.
    pub fn custom(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: format!("custom:{}", url),
            label: url.clone(),
            url,
            color: Color::default(),
            home: CameraView::new(LngLat::new(0.0, 0.0), 1.0, 0.0, 0.0),
        }
    }

    /// Override the vehicle color.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Override the home view.
    pub fn with_home(mut self, home: CameraView) -> Self {
        self.home = home;
        self
    }

    /// Built-in sources.
    pub fn presets() -> Vec<FeedSource> {
        vec![
            FeedSource {
                id: "kia".to_string(),
                label: "Bengaluru Airport Buses [KIA] (Bengaluru, India)".to_string(),
                url: "https://backend.bengawalk.com/kia/gtfs-rt.proto".to_string(),
                color: Color::rgb(0x00, 0xC8, 0xFF),
                home: CameraView::new(LngLat::new(77.61, 12.95), 10.0, 0.0, 60.0),
            },
            FeedSource {
                id: "bart".to_string(),
                label: "Bay Area Rapid Transit [BART] (San Francisco Bay Area, CA, USA)"
                    .to_string(),
                url: "https://api.bart.gov/gtfsrt/tripupdate.aspx".to_string(),
                color: Color::rgb(0x00, 0x99, 0xCC),
                home: CameraView::new(LngLat::new(-122.27, 37.80), 10.0, 0.0, 60.0),
            },
        ]
    }

    /// Look up a preset by list index, falling back to the first preset.
    pub fn preset(index: usize) -> FeedSource {
        let mut presets = Self::presets();
        if index < presets.len() {
            presets.swap_remove(index)
        } else {
            presets.swap_remove(0)
        }
    }

    /// Look up a preset by id (case-insensitive).
    pub fn preset_by_id(id: &str) -> Option<FeedSource> {
        Self::presets()
            .into_iter()
            .find(|s| s.id.eq_ignore_ascii_case(id))
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.id)
    }
}

//! Vehicle records and their display color.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::feed::VehicleReport;

/// A 24-bit RGB display color, rendered as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Create a color from its components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(0x00, 0xC8, 0xFF)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Error returned when parsing a color that is not six hex digits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid color '{0}': expected six hex digits, optionally prefixed with '#'")]
pub struct ParseColorError(pub String);

impl FromStr for Color {
    type Err = ParseColorError;

    /// Accepts `RRGGBB` or `#RRGGBB`, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseColorError(s.to_string()));
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| ParseColorError(s.to_string()))?;
        Ok(Self::rgb(
            (value >> 16) as u8,
            (value >> 8) as u8,
            value as u8,
        ))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Latest known state of one vehicle.
///
/// A record is always replaced as a whole; fields from an earlier report
/// never survive a later one.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRecord {
    /// Feed entity identifier.
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees clockwise from North.
    pub heading: Option<f32>,
    /// Metres per second.
    pub speed: Option<f32>,
    pub route_id: Option<String>,
    pub trip_id: Option<String>,
    pub label: String,
    /// Seconds since the Unix epoch.
    pub observed_at: u64,
    pub color: Color,
}

impl VehicleRecord {
    /// Build a record from a decoded report.
    pub fn from_report(id: &str, report: &VehicleReport, color: Color) -> Self {
        Self {
            id: id.to_string(),
            latitude: report.latitude,
            longitude: report.longitude,
            heading: report.bearing,
            speed: report.speed,
            route_id: report.route_id.clone(),
            trip_id: report.trip_id.clone(),
            label: report.label.clone(),
            observed_at: report.timestamp,
            color,
        }
    }

    /// Seconds elapsed since the record was observed, saturating at zero for
    /// timestamps ahead of `now_secs`.
    pub fn age_secs(&self, now_secs: u64) -> u64 {
        now_secs.saturating_sub(self.observed_at)
    }
}

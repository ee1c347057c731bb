//! Point-in-time telemetry copies.

use std::fmt;
use std::time::Duration;

/// Copy of the ingestion and camera counters at one moment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub uptime: Duration,
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub fetch_failures: u64,
    pub decode_failures: u64,
    pub cycles_discarded: u64,
    pub ticks_skipped: u64,
    pub stale_warnings: u64,
    pub bytes_fetched: u64,
    pub vehicles_last_cycle: u64,
    pub last_cycle_ms: u64,
    /// Camera intents forwarded to the renderer.
    pub camera_accepted: u64,
    /// Tracking intents dropped while a gesture was active.
    pub camera_suppressed: u64,
}

impl TelemetrySnapshot {
    /// Attach camera arbitration counters.
    pub fn with_camera(mut self, accepted: u64, suppressed: u64) -> Self {
        self.camera_accepted = accepted;
        self.camera_suppressed = suppressed;
        self
    }

    /// Fetch plus decode failures.
    pub fn failures(&self) -> u64 {
        self.fetch_failures + self.decode_failures
    }

    /// Fraction of started cycles that merged, `1.0` before any cycle ran.
    pub fn success_rate(&self) -> f64 {
        if self.cycles_started == 0 {
            1.0
        } else {
            self.cycles_completed as f64 / self.cycles_started as f64
        }
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycles {}/{} ok, {} fetch failures, {} decode failures, {} skipped ticks, \
             {} vehicles, {} KB fetched, camera {} applied / {} suppressed",
            self.cycles_completed,
            self.cycles_started,
            self.fetch_failures,
            self.decode_failures,
            self.ticks_skipped,
            self.vehicles_last_cycle,
            self.bytes_fetched / 1024,
            self.camera_accepted,
            self.camera_suppressed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut snapshot = TelemetrySnapshot::default();
        assert_eq!(snapshot.success_rate(), 1.0);
        snapshot.cycles_started = 4;
        snapshot.cycles_completed = 3;
        assert!((snapshot.success_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display_includes_camera_counters() {
        let snapshot = TelemetrySnapshot::default().with_camera(5, 2);
        let text = snapshot.to_string();
        assert!(text.contains("camera 5 applied / 2 suppressed"));
    }
}

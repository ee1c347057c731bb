//! Atomic ingestion counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::snapshot::TelemetrySnapshot;

/// Counters shared between the ingestion engine and its observers.
#[derive(Debug)]
pub struct IngestionMetrics {
    started_at: Instant,
    cycles_started: AtomicU64,
    cycles_completed: AtomicU64,
    fetch_failures: AtomicU64,
    decode_failures: AtomicU64,
    cycles_discarded: AtomicU64,
    ticks_skipped: AtomicU64,
    stale_warnings: AtomicU64,
    bytes_fetched: AtomicU64,
    vehicles_last_cycle: AtomicU64,
    last_cycle_ms: AtomicU64,
}

impl Default for IngestionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            cycles_started: AtomicU64::new(0),
            cycles_completed: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            cycles_discarded: AtomicU64::new(0),
            ticks_skipped: AtomicU64::new(0),
            stale_warnings: AtomicU64::new(0),
            bytes_fetched: AtomicU64::new(0),
            vehicles_last_cycle: AtomicU64::new(0),
            last_cycle_ms: AtomicU64::new(0),
        }
    }

    pub fn cycle_started(&self) {
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a merged cycle.
    pub fn cycle_completed(&self, vehicles: usize, bytes: usize, duration_ms: u64) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.bytes_fetched.fetch_add(bytes as u64, Ordering::Relaxed);
        self.vehicles_last_cycle
            .store(vehicles as u64, Ordering::Relaxed);
        self.last_cycle_ms.store(duration_ms, Ordering::Relaxed);
    }

    pub fn fetch_failed(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_failed(&self, bytes: usize) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
        self.bytes_fetched.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// A cycle finished after its run was stopped; its result was dropped.
    pub fn cycle_discarded(&self) {
        self.cycles_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_skipped(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stale_detected(&self, count: usize) {
        self.stale_warnings
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of every counter.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            uptime: self.started_at.elapsed(),
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            cycles_discarded: self.cycles_discarded.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            stale_warnings: self.stale_warnings.load(Ordering::Relaxed),
            bytes_fetched: self.bytes_fetched.load(Ordering::Relaxed),
            vehicles_last_cycle: self.vehicles_last_cycle.load(Ordering::Relaxed),
            last_cycle_ms: self.last_cycle_ms.load(Ordering::Relaxed),
            camera_accepted: 0,
            camera_suppressed: 0,
        }
    }
}

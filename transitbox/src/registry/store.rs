//! The vehicle registry: latest known state per vehicle identifier.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::record::{Color, VehicleRecord};
use crate::feed::FeedSnapshot;

/// Default age after which a vehicle is hidden from render output.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(120);

/// Configuration for the vehicle registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Records at least this old are excluded from [`VehicleRegistry::list`].
    ///
    /// `None` disables the staleness policy.
    pub stale_after: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            stale_after: Some(DEFAULT_STALE_AFTER),
        }
    }
}

impl RegistryConfig {
    /// Configuration with staleness disabled.
    pub fn without_staleness() -> Self {
        Self { stale_after: None }
    }

    /// Configuration with the given staleness threshold.
    pub fn with_stale_after(stale_after: Duration) -> Self {
        Self {
            stale_after: Some(stale_after),
        }
    }
}

/// A vehicle record has outlived the freshness threshold.
///
/// Non-fatal: the record stays in the registry but is excluded from render
/// output until a fresher report arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleDataWarning {
    pub vehicle_id: String,
    /// Age of the record when it was flagged.
    pub age: Duration,
    pub threshold: Duration,
}

/// Outcome of merging one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Records inserted or replaced.
    pub upserted: usize,
    /// Records removed by deleted entities.
    pub removed: usize,
    /// Entities without a position payload.
    pub ignored: usize,
}

#[derive(Debug, Default)]
struct RegistryInner {
    records: BTreeMap<String, VehicleRecord>,
    /// Identifiers already reported as stale in the current episode.
    flagged: HashSet<String>,
    source_id: Option<String>,
    color: Color,
}

/// Authoritative store of the latest known vehicle states.
///
/// `merge` is the only mutator of the record map and `list` its only bulk
/// reader. `list` returns owned copies, so a render tick never observes a
/// merge half-way through.
#[derive(Debug)]
pub struct VehicleRegistry {
    config: RegistryConfig,
    inner: RwLock<RegistryInner>,
}

impl Default for VehicleRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl VehicleRegistry {
    /// Create an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Get the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Switch the registry to a feed source.
    ///
    /// Selecting a different source drops every record of the previous one;
    /// re-selecting the current source keeps them. Returns the number of
    /// records removed.
    pub fn begin_source(&self, source_id: &str, color: Color) -> usize {
        let mut inner = self.inner.write();
        inner.color = color;

        if inner.source_id.as_deref() == Some(source_id) {
            return 0;
        }

        let removed = inner.records.len();
        inner.records.clear();
        inner.flagged.clear();
        if let Some(previous) = inner.source_id.replace(source_id.to_string()) {
            info!(
                previous = %previous,
                source = source_id,
                removed,
                "Registry switched feed source"
            );
        }
        removed
    }

    /// Identifier of the active source, if any.
    pub fn source_id(&self) -> Option<String> {
        self.inner.read().source_id.clone()
    }

    /// Merge a decoded snapshot.
    ///
    /// Every entity with a position replaces the full record for its
    /// identifier. Entities flagged as deleted remove their record. Other
    /// entities are ignored.
    pub fn merge(&self, snapshot: &FeedSnapshot) -> MergeSummary {
        let mut summary = MergeSummary::default();
        let mut inner = self.inner.write();
        let color = inner.color;

        for entity in &snapshot.entities {
            if entity.is_deleted {
                if inner.records.remove(&entity.id).is_some() {
                    summary.removed += 1;
                }
                inner.flagged.remove(&entity.id);
                continue;
            }

            match &entity.vehicle {
                Some(report) => {
                    let record = VehicleRecord::from_report(&entity.id, report, color);
                    inner.records.insert(entity.id.clone(), record);
                    inner.flagged.remove(&entity.id);
                    summary.upserted += 1;
                }
                None => summary.ignored += 1,
            }
        }

        debug!(
            upserted = summary.upserted,
            removed = summary.removed,
            ignored = summary.ignored,
            total = inner.records.len(),
            "Merged feed snapshot"
        );
        summary
    }

    /// Render-ready records, ordered by identifier, excluding stale ones.
    pub fn list(&self) -> Vec<VehicleRecord> {
        self.list_at(now_secs())
    }

    /// Like [`list`](Self::list) with an explicit current time.
    pub fn list_at(&self, now_secs: u64) -> Vec<VehicleRecord> {
        let inner = self.inner.read();
        inner
            .records
            .values()
            .filter(|record| !self.is_stale(record, now_secs))
            .cloned()
            .collect()
    }

    /// Flag records that have become stale since the last check.
    ///
    /// Each record is reported once per stale episode; a fresher report ends
    /// the episode.
    pub fn check_staleness(&self, now_secs: u64) -> Vec<StaleDataWarning> {
        let Some(threshold) = self.config.stale_after else {
            return Vec::new();
        };

        let mut inner = self.inner.write();
        let RegistryInner {
            records, flagged, ..
        } = &mut *inner;

        let mut warnings = Vec::new();
        for record in records.values() {
            if self.is_stale(record, now_secs) && flagged.insert(record.id.clone()) {
                let age = Duration::from_secs(record.age_secs(now_secs));
                warn!(
                    vehicle = %record.id,
                    age_secs = age.as_secs(),
                    threshold_secs = threshold.as_secs(),
                    "Vehicle data is stale, hiding from render output"
                );
                warnings.push(StaleDataWarning {
                    vehicle_id: record.id.clone(),
                    age,
                    threshold,
                });
            }
        }
        warnings
    }

    /// Delete every stale record. Returns the number removed.
    pub fn purge_stale(&self, now_secs: u64) -> usize {
        let mut inner = self.inner.write();
        let before = inner.records.len();
        let stale: Vec<String> = inner
            .records
            .values()
            .filter(|record| self.is_stale(record, now_secs))
            .map(|record| record.id.clone())
            .collect();
        for id in &stale {
            inner.records.remove(id);
            inner.flagged.remove(id);
        }
        let removed = before - inner.records.len();
        if removed > 0 {
            info!(removed, "Purged stale vehicles");
        }
        removed
    }

    /// Get a record by identifier, stale or not.
    pub fn get(&self, id: &str) -> Option<VehicleRecord> {
        self.inner.read().records.get(id).cloned()
    }

    /// Number of records held, including stale ones.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Whether the registry holds no records.
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Number of records currently flagged as stale.
    pub fn flagged_count(&self) -> usize {
        self.inner.read().flagged.len()
    }

    /// Remove every record, keeping the active source.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.records.clear();
        inner.flagged.clear();
    }

    fn is_stale(&self, record: &VehicleRecord, now_secs: u64) -> bool {
        match self.config.stale_after {
            Some(threshold) => Duration::from_secs(record.age_secs(now_secs)) >= threshold,
            None => false,
        }
    }
}

/// Current wall-clock time in seconds since the Unix epoch.
pub(crate) fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

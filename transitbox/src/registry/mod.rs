//! Vehicle registry.
//!
//! Holds the latest known state of every vehicle reported by the active feed
//! source and exposes render-ready copies of it.
//!
//! # Merge Policy
//!
//! - Last snapshot wins per identifier; a record is replaced as a whole
//! - Entities without a position payload are ignored
//! - Deleted entities (differential feeds) remove their record
//! - Records older than the staleness threshold are hidden, not deleted

mod record;
mod store;

pub use record::{Color, ParseColorError, VehicleRecord};
pub use store::{
    MergeSummary, RegistryConfig, StaleDataWarning, VehicleRegistry, DEFAULT_STALE_AFTER,
};

pub(crate) use store::now_secs;

//! TransitBox - live transit vehicles on an interactive 3D map
//!
//! This library polls GTFS-Realtime vehicle position feeds, keeps the latest
//! state of every vehicle, and drives an external map renderer: vehicle
//! layers are replaced on every feed cycle, and programmatic camera moves are
//! arbitrated against the user's own gestures.
//!
//! # Components
//!
//! - [`feed`]: wire schema, decoder, fetcher and the periodic ingestion engine
//! - [`registry`]: latest state per vehicle, merge and staleness policy
//! - [`throttle`]: throttle/debounce for high-frequency renderer events
//! - [`camera`]: gesture monitoring and camera intent arbitration
//! - [`render`]: the bridge to the external renderer
//! - [`tracking`]: following a vehicle with the camera
//! - [`session`]: everything above wired into one map view

pub mod camera;
pub mod config;
pub mod feed;
pub mod logging;
pub mod registry;
pub mod render;
pub mod session;
pub mod telemetry;
pub mod throttle;
pub mod tracking;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

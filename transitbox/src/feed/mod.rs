//! Feed ingestion.
//!
//! ```text
//! FeedSource ──► FeedFetcher ──► bytes ──► FeedDecoder ──► FeedSnapshot ──► VehicleRegistry
//!                     ▲                                                          │
//!                     └────────────── FeedIngestionEngine (interval) ────────────┘
//! ```
//!
//! The wire schema is a subset of GTFS-Realtime declared with prost derives
//! in [`wire`]; everything above it works on the resolved [`FeedSnapshot`].

pub(crate) mod decoder;
mod engine;
mod error;
pub(crate) mod fetch;
mod source;
pub mod wire;

pub use decoder::{FeedDecoder, FeedSnapshot, SnapshotEntity, VehicleReport};
pub use engine::{FeedIngestionEngine, IngestionEvent, MIN_POLL_INTERVAL};
pub use error::{DecodeError, FetchError};
pub use fetch::{BoxFuture, FeedFetcher, HttpFeedFetcher, DEFAULT_FETCH_TIMEOUT};
pub use source::{FeedSource, DEFAULT_POLL_INTERVAL_MS};

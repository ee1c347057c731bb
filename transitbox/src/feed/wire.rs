//! Wire schema for the GTFS-Realtime vehicle position feed.
//!
//! Only the messages and fields this crate reads are declared. Anything else
//! in the payload (trip updates, alerts, newer extensions) is skipped by the
//! protobuf decoder as unknown fields.
//!
//! Every field is declared `optional`, including the ones the upstream schema
//! marks `required`: presence is validated by [`FeedDecoder`](super::FeedDecoder)
//! so that a missing required field surfaces as a typed error instead of a
//! silently defaulted value.

/// Top-level message of a GTFS-Realtime feed.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FeedMessage {
    #[prost(message, optional, tag = "1")]
    pub header: Option<FeedHeader>,
    #[prost(message, repeated, tag = "2")]
    pub entity: Vec<FeedEntity>,
}

/// Metadata about the feed as a whole.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FeedHeader {
    #[prost(string, optional, tag = "1")]
    pub gtfs_realtime_version: Option<String>,
    #[prost(enumeration = "Incrementality", optional, tag = "2")]
    pub incrementality: Option<i32>,
    /// POSIX seconds at which the feed content was created.
    #[prost(uint64, optional, tag = "3")]
    pub timestamp: Option<u64>,
}

/// Whether a feed carries the full dataset or only changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Incrementality {
    FullDataset = 0,
    Differential = 1,
}

/// A single reported object in the feed.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FeedEntity {
    #[prost(string, optional, tag = "1")]
    pub id: Option<String>,
    #[prost(bool, optional, tag = "2")]
    pub is_deleted: Option<bool>,
    #[prost(message, optional, tag = "4")]
    pub vehicle: Option<VehiclePosition>,
}

/// Realtime positioning information for a vehicle.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VehiclePosition {
    #[prost(message, optional, tag = "1")]
    pub trip: Option<TripDescriptor>,
    #[prost(message, optional, tag = "2")]
    pub position: Option<Position>,
    #[prost(uint32, optional, tag = "3")]
    pub current_stop_sequence: Option<u32>,
    #[prost(enumeration = "VehicleStopStatus", optional, tag = "4")]
    pub current_status: Option<i32>,
    /// POSIX seconds at which the position was measured.
    #[prost(uint64, optional, tag = "5")]
    pub timestamp: Option<u64>,
    #[prost(string, optional, tag = "7")]
    pub stop_id: Option<String>,
    #[prost(message, optional, tag = "8")]
    pub vehicle: Option<VehicleDescriptor>,
}

/// Stop status of a vehicle relative to its current stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum VehicleStopStatus {
    IncomingAt = 0,
    StoppedAt = 1,
    InTransitTo = 2,
}

/// Identifies the trip a vehicle is serving.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TripDescriptor {
    #[prost(string, optional, tag = "1")]
    pub trip_id: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub start_time: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub start_date: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub route_id: Option<String>,
    #[prost(uint32, optional, tag = "6")]
    pub direction_id: Option<u32>,
}

/// Identification of the physical vehicle.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VehicleDescriptor {
    #[prost(string, optional, tag = "1")]
    pub id: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub label: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub license_plate: Option<String>,
}

/// Geographic position of a vehicle.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Position {
    /// Degrees North, WGS-84.
    #[prost(float, optional, tag = "1")]
    pub latitude: Option<f32>,
    /// Degrees East, WGS-84.
    #[prost(float, optional, tag = "2")]
    pub longitude: Option<f32>,
    /// Degrees clockwise from true North.
    #[prost(float, optional, tag = "3")]
    pub bearing: Option<f32>,
    /// Metres travelled.
    #[prost(double, optional, tag = "4")]
    pub odometer: Option<f64>,
    /// Metres per second.
    #[prost(float, optional, tag = "5")]
    pub speed: Option<f32>,
}

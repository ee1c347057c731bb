//! Decoding of raw feed payloads into typed snapshots.
//!
//! Decoding is pure: the only input besides the bytes is the wall-clock time
//! used as the last-resort observation timestamp, and [`FeedDecoder::decode_at`]
//! lets callers pin it.

use prost::Message;
use tracing::debug;

use super::error::DecodeError;
use super::wire::{self, FeedMessage, Incrementality};

/// A decoded, immutable view of one poll result.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    /// GTFS-Realtime version reported by the producer (may be empty).
    pub version: String,
    /// Whether the snapshot is a full dataset or a differential update.
    pub incrementality: Incrementality,
    /// Header timestamp, or wall-clock time if the header carried none.
    pub timestamp: u64,
    /// Entities in feed order.
    pub entities: Vec<SnapshotEntity>,
    /// Positions dropped because their coordinates were unusable.
    pub rejected_positions: usize,
}

impl FeedSnapshot {
    /// Iterate over entities that carry a vehicle position.
    pub fn vehicles(&self) -> impl Iterator<Item = (&str, &VehicleReport)> {
        self.entities
            .iter()
            .filter_map(|e| e.vehicle.as_ref().map(|v| (e.id.as_str(), v)))
    }

    /// Number of entities carrying a vehicle position.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles().count()
    }
}

/// One entity of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntity {
    /// Feed entity identifier, used as the vehicle key.
    pub id: String,
    /// Set by differential feeds to retract an entity.
    pub is_deleted: bool,
    /// Position payload, absent for pure trip-update or alert entities.
    pub vehicle: Option<VehicleReport>,
}

/// A vehicle position with every fallback already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleReport {
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees clockwise from North.
    pub bearing: Option<f32>,
    /// Metres per second.
    pub speed: Option<f32>,
    pub route_id: Option<String>,
    pub trip_id: Option<String>,
    /// Vehicle label, else vehicle id, else entity id.
    pub label: String,
    /// Entity timestamp, else header timestamp, else wall clock.
    pub timestamp: u64,
}

/// Stateless decoder for GTFS-Realtime vehicle position payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedDecoder;

impl FeedDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self
    }

    /// Decode a bare `FeedMessage`, falling back to the current time for
    /// missing timestamps.
    pub fn decode(&self, bytes: &[u8]) -> Result<FeedSnapshot, DecodeError> {
        self.decode_at(bytes, wall_clock_secs())
    }

    /// Decode a bare `FeedMessage` with an explicit wall-clock fallback.
    pub fn decode_at(&self, bytes: &[u8], now_secs: u64) -> Result<FeedSnapshot, DecodeError> {
        let message = FeedMessage::decode(bytes)?;
        build_snapshot(message, now_secs)
    }

    /// Decode a `FeedMessage` preceded by its varint length, as written by
    /// feed recorders.
    pub fn decode_length_delimited(&self, bytes: &[u8]) -> Result<FeedSnapshot, DecodeError> {
        let message = FeedMessage::decode_length_delimited(bytes)?;
        build_snapshot(message, wall_clock_secs())
    }
}

fn wall_clock_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Zero and empty values count as absent, matching how feed producers
/// leave fields unset in practice.
fn present_u64(value: Option<u64>) -> Option<u64> {
    value.filter(|v| *v > 0)
}

fn present_str(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn build_snapshot(message: FeedMessage, now_secs: u64) -> Result<FeedSnapshot, DecodeError> {
    let header = message
        .header
        .ok_or(DecodeError::MissingField { field: "header" })?;

    let incrementality = header
        .incrementality
        .and_then(|v| Incrementality::try_from(v).ok())
        .unwrap_or(Incrementality::FullDataset);
    let timestamp = present_u64(header.timestamp).unwrap_or(now_secs);

    let mut rejected_positions = 0;
    let mut entities = Vec::with_capacity(message.entity.len());

    for entity in message.entity {
        let id = present_str(entity.id).ok_or(DecodeError::MissingField { field: "entity.id" })?;

        let vehicle = match entity.vehicle {
            Some(vp) if vp.position.is_some() => {
                let report = resolve_vehicle(&id, vp, timestamp)?;
                if report.is_none() {
                    rejected_positions += 1;
                }
                report
            }
            _ => None,
        };

        entities.push(SnapshotEntity {
            id,
            is_deleted: entity.is_deleted.unwrap_or(false),
            vehicle,
        });
    }

    Ok(FeedSnapshot {
        version: header.gtfs_realtime_version.unwrap_or_default(),
        incrementality,
        timestamp,
        entities,
        rejected_positions,
    })
}

/// Resolve a vehicle position payload.
///
/// Returns `Ok(None)` when the coordinates are not finite or fall outside
/// WGS-84 bounds.
fn resolve_vehicle(
    entity_id: &str,
    vp: wire::VehiclePosition,
    header_timestamp: u64,
) -> Result<Option<VehicleReport>, DecodeError> {
    let Some(position) = vp.position else {
        return Ok(None);
    };

    let latitude = position.latitude.ok_or(DecodeError::MissingField {
        field: "position.latitude",
    })?;
    let longitude = position.longitude.ok_or(DecodeError::MissingField {
        field: "position.longitude",
    })?;

    if !valid_coordinate(latitude, 90.0) || !valid_coordinate(longitude, 180.0) {
        debug!(
            entity = entity_id,
            latitude, longitude, "Dropping vehicle position with unusable coordinates"
        );
        return Ok(None);
    }

    let descriptor = vp.vehicle.unwrap_or_default();
    let trip = vp.trip.unwrap_or_default();

    let label = present_str(descriptor.label)
        .or_else(|| present_str(descriptor.id))
        .unwrap_or_else(|| entity_id.to_string());

    Ok(Some(VehicleReport {
        latitude: f64::from(latitude),
        longitude: f64::from(longitude),
        bearing: position.bearing.filter(|b| b.is_finite()),
        speed: position.speed.filter(|s| s.is_finite() && *s >= 0.0),
        route_id: present_str(trip.route_id),
        trip_id: present_str(trip.trip_id),
        label,
        timestamp: present_u64(vp.timestamp).unwrap_or(header_timestamp),
    }))
}

fn valid_coordinate(value: f32, limit: f32) -> bool {
    value.is_finite() && value.abs() <= limit
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::feed::wire::{FeedEntity, FeedHeader, Position, TripDescriptor, VehicleDescriptor};

    const NOW: u64 = 1_700_000_000;

    /// Build a vehicle entity at the given coordinates.
    pub(crate) fn vehicle_entity(id: &str, lat: f32, lon: f32) -> FeedEntity {
        FeedEntity {
            id: Some(id.to_string()),
            is_deleted: None,
            vehicle: Some(wire::VehiclePosition {
                position: Some(Position {
                    latitude: Some(lat),
                    longitude: Some(lon),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        }
    }

    /// Encode a feed message with the given header timestamp and entities.
    pub(crate) fn encode_feed(timestamp: Option<u64>, entities: Vec<FeedEntity>) -> Vec<u8> {
        FeedMessage {
            header: Some(FeedHeader {
                gtfs_realtime_version: Some("2.0".to_string()),
                incrementality: Some(Incrementality::FullDataset as i32),
                timestamp,
            }),
            entity: entities,
        }
        .encode_to_vec()
    }

    #[test]
    fn test_decode_vehicle_position() {
        let mut entity = vehicle_entity("V1", 35.0, 139.0);
        if let Some(vp) = entity.vehicle.as_mut() {
            vp.timestamp = Some(NOW - 5);
            vp.trip = Some(TripDescriptor {
                trip_id: Some("T9".to_string()),
                route_id: Some("R1".to_string()),
                ..Default::default()
            });
            vp.vehicle = Some(VehicleDescriptor {
                id: Some("bus-17".to_string()),
                label: Some("17".to_string()),
                license_plate: None,
            });
            if let Some(pos) = vp.position.as_mut() {
                pos.bearing = Some(90.0);
                pos.speed = Some(12.5);
            }
        }
        let bytes = encode_feed(Some(NOW), vec![entity]);

        let snapshot = FeedDecoder::new().decode_at(&bytes, NOW + 100).unwrap();

        assert_eq!(snapshot.version, "2.0");
        assert_eq!(snapshot.timestamp, NOW);
        assert_eq!(snapshot.entities.len(), 1);
        let report = snapshot.entities[0].vehicle.as_ref().unwrap();
        assert_eq!(report.latitude, 35.0);
        assert_eq!(report.longitude, 139.0);
        assert_eq!(report.bearing, Some(90.0));
        assert_eq!(report.speed, Some(12.5));
        assert_eq!(report.route_id.as_deref(), Some("R1"));
        assert_eq!(report.trip_id.as_deref(), Some("T9"));
        assert_eq!(report.label, "17");
        assert_eq!(report.timestamp, NOW - 5);
    }

    #[test]
    fn test_timestamp_falls_back_to_header_then_wall_clock() {
        let bytes = encode_feed(Some(NOW), vec![vehicle_entity("V1", 1.0, 2.0)]);
        let snapshot = FeedDecoder::new().decode_at(&bytes, NOW + 100).unwrap();
        assert_eq!(snapshot.entities[0].vehicle.as_ref().unwrap().timestamp, NOW);

        let bytes = encode_feed(None, vec![vehicle_entity("V1", 1.0, 2.0)]);
        let snapshot = FeedDecoder::new().decode_at(&bytes, NOW + 100).unwrap();
        assert_eq!(snapshot.timestamp, NOW + 100);
        assert_eq!(
            snapshot.entities[0].vehicle.as_ref().unwrap().timestamp,
            NOW + 100
        );
    }

    #[test]
    fn test_zero_timestamp_counts_as_absent() {
        let mut entity = vehicle_entity("V1", 1.0, 2.0);
        entity.vehicle.as_mut().unwrap().timestamp = Some(0);
        let bytes = encode_feed(Some(0), vec![entity]);

        let snapshot = FeedDecoder::new().decode_at(&bytes, NOW).unwrap();
        assert_eq!(snapshot.entities[0].vehicle.as_ref().unwrap().timestamp, NOW);
    }

    #[test]
    fn test_label_falls_back_to_vehicle_id_then_entity_id() {
        let mut with_id = vehicle_entity("E1", 1.0, 2.0);
        with_id.vehicle.as_mut().unwrap().vehicle = Some(VehicleDescriptor {
            id: Some("bus-1".to_string()),
            label: Some(String::new()),
            license_plate: None,
        });
        let bare = vehicle_entity("E2", 1.0, 2.0);
        let bytes = encode_feed(Some(NOW), vec![with_id, bare]);

        let snapshot = FeedDecoder::new().decode_at(&bytes, NOW).unwrap();
        assert_eq!(snapshot.entities[0].vehicle.as_ref().unwrap().label, "bus-1");
        assert_eq!(snapshot.entities[1].vehicle.as_ref().unwrap().label, "E2");
    }

    #[test]
    fn test_entity_without_position_has_no_vehicle() {
        let trip_only = FeedEntity {
            id: Some("trip-update-1".to_string()),
            is_deleted: None,
            vehicle: None,
        };
        let bytes = encode_feed(Some(NOW), vec![trip_only]);

        let snapshot = FeedDecoder::new().decode_at(&bytes, NOW).unwrap();
        assert_eq!(snapshot.entities.len(), 1);
        assert!(snapshot.entities[0].vehicle.is_none());
        assert_eq!(snapshot.vehicle_count(), 0);
        assert_eq!(snapshot.rejected_positions, 0);
    }

    #[test]
    fn test_missing_header_is_error() {
        let bytes = FeedMessage {
            header: None,
            entity: vec![vehicle_entity("V1", 1.0, 2.0)],
        }
        .encode_to_vec();

        let err = FeedDecoder::new().decode_at(&bytes, NOW).unwrap_err();
        assert_eq!(err, DecodeError::MissingField { field: "header" });
    }

    #[test]
    fn test_empty_payload_is_error() {
        let err = FeedDecoder::new().decode_at(&[], NOW).unwrap_err();
        assert_eq!(err, DecodeError::MissingField { field: "header" });
    }

    #[test]
    fn test_missing_entity_id_is_error() {
        let mut entity = vehicle_entity("V1", 1.0, 2.0);
        entity.id = None;
        let bytes = encode_feed(Some(NOW), vec![entity]);

        let err = FeedDecoder::new().decode_at(&bytes, NOW).unwrap_err();
        assert_eq!(err, DecodeError::MissingField { field: "entity.id" });
    }

    #[test]
    fn test_missing_latitude_is_error() {
        let mut entity = vehicle_entity("V1", 1.0, 2.0);
        entity
            .vehicle
            .as_mut()
            .unwrap()
            .position
            .as_mut()
            .unwrap()
            .latitude = None;
        let bytes = encode_feed(Some(NOW), vec![entity]);

        let err = FeedDecoder::new().decode_at(&bytes, NOW).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                field: "position.latitude"
            }
        );
    }

    #[test]
    fn test_truncated_payload_is_malformed() {
        let bytes = encode_feed(Some(NOW), vec![vehicle_entity("V1", 1.0, 2.0)]);
        let truncated = &bytes[..bytes.len() - 3];

        let err = FeedDecoder::new().decode_at(truncated, NOW).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_wrong_wire_type_is_malformed() {
        // Field 1 (header) encoded as a varint instead of a message.
        let bytes = [0x08, 0x01];
        let err = FeedDecoder::new().decode_at(&bytes, NOW).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let mut bytes = encode_feed(Some(NOW), vec![vehicle_entity("V1", 1.0, 2.0)]);
        // Field 1000, varint wire type, value 7.
        bytes.extend_from_slice(&[0xC0, 0x3E, 0x07]);

        let snapshot = FeedDecoder::new().decode_at(&bytes, NOW).unwrap();
        assert_eq!(snapshot.vehicle_count(), 1);
    }

    #[test]
    fn test_out_of_range_coordinates_are_rejected() {
        let bytes = encode_feed(
            Some(NOW),
            vec![
                vehicle_entity("bad-lat", 91.0, 0.0),
                vehicle_entity("nan-lon", 0.0, f32::NAN),
                vehicle_entity("ok", 10.0, 20.0),
            ],
        );

        let snapshot = FeedDecoder::new().decode_at(&bytes, NOW).unwrap();
        assert_eq!(snapshot.rejected_positions, 2);
        assert_eq!(snapshot.vehicle_count(), 1);
        assert_eq!(snapshot.vehicles().next().unwrap().0, "ok");
    }

    #[test]
    fn test_negative_speed_is_dropped() {
        let mut entity = vehicle_entity("V1", 1.0, 2.0);
        entity
            .vehicle
            .as_mut()
            .unwrap()
            .position
            .as_mut()
            .unwrap()
            .speed = Some(-1.0);
        let bytes = encode_feed(Some(NOW), vec![entity]);

        let snapshot = FeedDecoder::new().decode_at(&bytes, NOW).unwrap();
        assert_eq!(snapshot.entities[0].vehicle.as_ref().unwrap().speed, None);
    }

    #[test]
    fn test_deleted_flag_is_preserved() {
        let mut entity = vehicle_entity("V1", 1.0, 2.0);
        entity.is_deleted = Some(true);
        let bytes = encode_feed(Some(NOW), vec![entity]);

        let snapshot = FeedDecoder::new().decode_at(&bytes, NOW).unwrap();
        assert!(snapshot.entities[0].is_deleted);
    }

    #[test]
    fn test_length_delimited_framing() {
        let message = FeedMessage {
            header: Some(FeedHeader {
                gtfs_realtime_version: Some("2.0".to_string()),
                incrementality: Some(Incrementality::Differential as i32),
                timestamp: Some(NOW),
            }),
            entity: vec![vehicle_entity("V1", 1.0, 2.0)],
        };
        let bytes = message.encode_length_delimited_to_vec();

        let snapshot = FeedDecoder::new().decode_length_delimited(&bytes).unwrap();
        assert_eq!(snapshot.incrementality, Incrementality::Differential);
        assert_eq!(snapshot.vehicle_count(), 1);
    }
}

//! GeoJSON point features for vehicle layers.

use serde::Serialize;

use crate::registry::{Color, VehicleRecord};

/// A GeoJSON `FeatureCollection` of vehicle points.
///
/// Published as a whole on every update; the renderer replaces its source
/// data instead of diffing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<VehicleFeature>,
}

/// One vehicle as a GeoJSON `Feature`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct VehicleFeature {
    pub id: String,
    pub geometry: PointGeometry,
    pub properties: VehicleProperties,
}

/// GeoJSON `Point`, coordinates in longitude, latitude order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename = "Point")]
pub struct PointGeometry {
    pub coordinates: [f64; 2],
}

/// Properties consumed by the vehicle layer's paint and label rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleProperties {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearing: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    pub timestamp: u64,
    pub color: Color,
}

impl From<&VehicleRecord> for VehicleFeature {
    fn from(record: &VehicleRecord) -> Self {
        Self {
            id: record.id.clone(),
            geometry: PointGeometry {
                coordinates: [record.longitude, record.latitude],
            },
            properties: VehicleProperties {
                id: record.id.clone(),
                label: record.label.clone(),
                route: record.route_id.clone(),
                trip: record.trip_id.clone(),
                bearing: record.heading,
                speed: record.speed,
                timestamp: record.observed_at,
                color: record.color,
            },
        }
    }
}

impl FeatureCollection {
    /// Build a collection from registry records, preserving their order.
    pub fn from_records(records: &[VehicleRecord]) -> Self {
        Self {
            features: records.iter().map(VehicleFeature::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Serialize as GeoJSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

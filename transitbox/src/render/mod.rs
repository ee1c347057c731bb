//! Output to the external map renderer.

mod bridge;
mod features;

pub use bridge::{MapRenderer, RenderBridge};
pub use features::{FeatureCollection, PointGeometry, VehicleFeature, VehicleProperties};

#[cfg(test)]
pub(crate) use bridge::tests::{bridge as recording_bridge, RecordingRenderer};

//! Integer id spaces and sentinels shared by the graph stages

use serde::{Deserialize, Serialize};

/// Node-based graph node (intersection or shape point)
pub type NodeId = u32;
/// Node-based graph edge
pub type EdgeId = u32;
pub type EdgeWeight = i32;
pub type EdgeDuration = i32;
/// Scaled turn penalty (weight units or deciseconds)
pub type TurnPenalty = i16;
pub type OsmNodeId = i64;
pub type OsmWayId = i64;
pub type AnnotationId = u32;
pub type BearingClassId = u32;
pub type EntryClassId = u32;
pub type LaneDataId = u16;

pub const SPECIAL_NODE_ID: NodeId = NodeId::MAX;
pub const SPECIAL_EDGE_ID: EdgeId = EdgeId::MAX;
pub const INVALID_EDGE_WEIGHT: EdgeWeight = EdgeWeight::MAX;
pub const INVALID_LANE_DATA_ID: LaneDataId = LaneDataId::MAX;
pub const INVALID_BEARING_CLASS_ID: BearingClassId = BearingClassId::MAX;
pub const SPECIAL_OSM_WAY_ID: OsmWayId = OsmWayId::MAX;

/// Fixed-point precision of [`Coordinate`] (1e-6 degrees)
pub const COORDINATE_PRECISION: f64 = 1e6;

/// WGS84 position stored as fixed-point micro-degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: i32,
    pub lat: i32,
}

impl Coordinate {
    pub fn from_degrees(lon: f64, lat: f64) -> Self {
        Self {
            lon: (lon * COORDINATE_PRECISION).round() as i32,
            lat: (lat * COORDINATE_PRECISION).round() as i32,
        }
    }

    pub fn lon_deg(&self) -> f64 {
        self.lon as f64 / COORDINATE_PRECISION
    }

    pub fn lat_deg(&self) -> f64 {
        self.lat as f64 / COORDINATE_PRECISION
    }

    /// Initial bearing towards `other` in degrees [0, 360), 0 = North
    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.lat_deg().to_radians();
        let lat2 = other.lat_deg().to_radians();
        let delta_lon = (other.lon_deg() - self.lon_deg()).to_radians();

        let y = delta_lon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
        let bearing_deg = y.atan2(x).to_degrees();
        (bearing_deg + 360.0) % 360.0
    }
}

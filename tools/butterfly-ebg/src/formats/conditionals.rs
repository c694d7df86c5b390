//! ebg.conditionals format - time-dependent turn restrictions resolved to
//! turn ids

use anyhow::Result;
use butterfly_common::{Coordinate, EdgeId, SPECIAL_EDGE_ID};

use super::records::{put_str, Decoder, Record};

pub const MAGIC: u32 = 0x45424343; // "EBCC"

/// A turn that is forbidden while `condition` holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalTurnPenalty {
    pub turn_id: EdgeId,
    /// Location of the intersection
    pub location: Coordinate,
    /// Opening-hours style condition, e.g. `Mo-Fr 07:00-09:00`
    pub condition: String,
}

impl ConditionalTurnPenalty {
    /// Penalty whose turn id is assigned once the turn edges are final
    pub fn unassigned(location: Coordinate, condition: String) -> Self {
        Self {
            turn_id: SPECIAL_EDGE_ID,
            location,
            condition,
        }
    }
}

impl Record for ConditionalTurnPenalty {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.turn_id.to_le_bytes());
        out.extend_from_slice(&self.location.lon.to_le_bytes());
        out.extend_from_slice(&self.location.lat.to_le_bytes());
        put_str(out, &self.condition);
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            turn_id: input.u32()?,
            location: Coordinate {
                lon: input.i32()?,
                lat: input.i32()?,
            },
            condition: input.string()?,
        })
    }
}

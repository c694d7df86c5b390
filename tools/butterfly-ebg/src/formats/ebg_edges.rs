//! ebg.edges format - turn edges between turn vertices

use anyhow::Result;
use butterfly_common::{EdgeDuration, EdgeId, EdgeWeight, NodeId, SPECIAL_EDGE_ID};

use super::records::{Decoder, Record};

pub const MAGIC: u32 = 0x45424745; // "EBGE"

/// A turn: leaving turn vertex `source` onto turn vertex `target`.
///
/// `weight` and `duration` are the cost of traversing the source segment
/// plus the turn penalty. `turn_id` indexes the turn data and penalty
/// tables and equals the edge's position once the graph is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeBasedEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub turn_id: EdgeId,
    pub weight: EdgeWeight,
    pub duration: EdgeDuration,
    pub forward: bool,
    pub backward: bool,
}

impl EdgeBasedEdge {
    /// Forward-only edge with its turn id still unassigned
    pub fn new(source: NodeId, target: NodeId, weight: EdgeWeight, duration: EdgeDuration) -> Self {
        Self {
            source,
            target,
            turn_id: SPECIAL_EDGE_ID,
            weight,
            duration,
            forward: true,
            backward: false,
        }
    }
}

impl Record for EdgeBasedEdge {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.source.to_le_bytes());
        out.extend_from_slice(&self.target.to_le_bytes());
        out.extend_from_slice(&self.turn_id.to_le_bytes());
        out.extend_from_slice(&self.weight.to_le_bytes());
        out.extend_from_slice(&self.duration.to_le_bytes());
        out.push(u8::from(self.forward) | u8::from(self.backward) << 1);
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        let source = input.u32()?;
        let target = input.u32()?;
        let turn_id = input.u32()?;
        let weight = input.i32()?;
        let duration = input.i32()?;
        let flags = input.u8()?;
        anyhow::ensure!(flags & !0b11 == 0, "invalid edge direction flags 0x{flags:02X}");
        Ok(Self {
            source,
            target,
            turn_id,
            weight,
            duration,
            forward: flags & 0b01 != 0,
            backward: flags & 0b10 != 0,
        })
    }
}

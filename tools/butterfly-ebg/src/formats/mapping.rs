//! ebg.cnbg_to_ebg / ebg.geometry_info formats - how node-based edges map
//! onto turn vertices, and the OSM nodes each turn vertex covers

use anyhow::Result;
use butterfly_common::{NodeId, OsmNodeId, OsmWayId, SPECIAL_NODE_ID};

use super::records::{Decoder, Record};

pub const NBG_TO_EBG_MAGIC: u32 = 0x45424D50; // "EBMP"
pub const GEOMETRY_INFO_MAGIC: u32 = 0x45424749; // "EBGI"

/// Undirected node-based edge `u - v` with its two turn vertices.
/// A direction that cannot be driven has `SPECIAL_NODE_ID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NbgToEbg {
    pub u: NodeId,
    pub v: NodeId,
    pub forward_ebg_node: NodeId,
    pub backward_ebg_node: NodeId,
}

impl NbgToEbg {
    pub fn has_backward(&self) -> bool {
        self.backward_ebg_node != SPECIAL_NODE_ID
    }
}

impl Record for NbgToEbg {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.u.to_le_bytes());
        out.extend_from_slice(&self.v.to_le_bytes());
        out.extend_from_slice(&self.forward_ebg_node.to_le_bytes());
        out.extend_from_slice(&self.backward_ebg_node.to_le_bytes());
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            u: input.u32()?,
            v: input.u32()?,
            forward_ebg_node: input.u32()?,
            backward_ebg_node: input.u32()?,
        })
    }
}

/// OSM way of a turn vertex and the OSM nodes it passes, in driving order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeometryInfo {
    pub osm_way_id: OsmWayId,
    pub nodes: Vec<OsmNodeId>,
}

impl Record for GeometryInfo {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.osm_way_id.to_le_bytes());
        out.extend_from_slice(&(self.nodes.len() as u32).to_le_bytes());
        for node in &self.nodes {
            out.extend_from_slice(&node.to_le_bytes());
        }
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        let osm_way_id = input.i64()?;
        let len = input.u32()?;
        let nodes = (0..len).map(|_| input.i64()).collect::<Result<Vec<_>>>()?;
        Ok(Self { osm_way_id, nodes })
    }
}

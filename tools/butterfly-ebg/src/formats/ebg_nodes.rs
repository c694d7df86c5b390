//! ebg.nodes / ebg.segments formats - turn vertex table and the
//! sub-segments covering each vertex

use anyhow::Result;
use butterfly_common::{AnnotationId, NodeId, SPECIAL_NODE_ID};

use super::records::{Decoder, Record};
use crate::graph::GeometryId;

pub const NODES_MAGIC: u32 = 0x4542474E; // "EBGN"
pub const SEGMENTS_MAGIC: u32 = 0x45424753; // "EBGS"

/// Attributes of one turn vertex (a directed, drivable road segment)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeBasedNode {
    pub geometry_id: GeometryId,
    pub annotation_id: AnnotationId,
    /// Part of a dual carriageway
    pub segregated: bool,
}

impl Record for EdgeBasedNode {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.geometry_id.id.to_le_bytes());
        out.push(u8::from(self.geometry_id.forward));
        out.extend_from_slice(&self.annotation_id.to_le_bytes());
        out.push(u8::from(self.segregated));
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            geometry_id: GeometryId {
                id: input.u32()?,
                forward: input.bool()?,
            },
            annotation_id: input.u32()?,
            segregated: input.bool()?,
        })
    }
}

/// Turn vertex reference of a segment, disabled when that direction cannot
/// be driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentId {
    pub id: NodeId,
    pub enabled: bool,
}

impl SegmentId {
    pub fn from_vertex(vertex: Option<NodeId>) -> Self {
        match vertex {
            Some(id) => Self { id, enabled: true },
            None => Self {
                id: SPECIAL_NODE_ID,
                enabled: false,
            },
        }
    }
}

/// One uncompressed piece `u -> v` of a turn vertex, used for snapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeBasedNodeSegment {
    pub forward_segment_id: SegmentId,
    pub reverse_segment_id: SegmentId,
    pub u: NodeId,
    pub v: NodeId,
    /// Position of the piece within its compressed chain
    pub fwd_segment_position: u32,
}

impl Record for EdgeBasedNodeSegment {
    fn encode(&self, out: &mut Vec<u8>) {
        for segment in [self.forward_segment_id, self.reverse_segment_id] {
            out.extend_from_slice(&segment.id.to_le_bytes());
            out.push(u8::from(segment.enabled));
        }
        out.extend_from_slice(&self.u.to_le_bytes());
        out.extend_from_slice(&self.v.to_le_bytes());
        out.extend_from_slice(&self.fwd_segment_position.to_le_bytes());
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        let mut segment = || -> Result<SegmentId> {
            Ok(SegmentId {
                id: input.u32()?,
                enabled: input.bool()?,
            })
        };
        let forward_segment_id = segment()?;
        let reverse_segment_id = segment()?;
        Ok(Self {
            forward_segment_id,
            reverse_segment_id,
            u: input.u32()?,
            v: input.u32()?,
            fwd_segment_position: input.u32()?,
        })
    }
}

//! Compressed node-based graph (NBG) consumed by the turn expansion
//!
//! Every road is stored in both directions. The copy that may not be driven
//! carries `reversed = true`; only non-reversed edges become turn vertices.

use butterfly_common::{
    AnnotationId, EdgeDuration, EdgeId, EdgeWeight, NodeId, OsmWayId, SPECIAL_EDGE_ID,
};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::{EbgError, Result};

/// Reference into the packed geometry store, tagged with its direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeometryId {
    pub id: u32,
    pub forward: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TravelMode {
    Inaccessible = 0,
    #[default]
    Driving = 1,
    Cycling = 2,
    Walking = 3,
    Ferry = 4,
    Train = 5,
}

impl TravelMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(TravelMode::Inaccessible),
            1 => Some(TravelMode::Driving),
            2 => Some(TravelMode::Cycling),
            3 => Some(TravelMode::Walking),
            4 => Some(TravelMode::Ferry),
            5 => Some(TravelMode::Train),
            _ => None,
        }
    }
}

/// Per-way data shared by all segments of a way
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAnnotation {
    pub name_id: u32,
    #[serde(default)]
    pub classes: u8,
    #[serde(default)]
    pub travel_mode: TravelMode,
    #[serde(default)]
    pub is_left_hand_driving: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeData {
    pub weight: EdgeWeight,
    pub duration: EdgeDuration,
    pub geometry_id: GeometryId,
    pub annotation_id: AnnotationId,
    pub osm_way_id: OsmWayId,
    pub reversed: bool,
    /// Segment may be used to snap route start/end points
    pub startpoint: bool,
    /// Access-restricted (e.g. destination-only)
    pub restricted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeBasedEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub data: EdgeData,
}

/// Adjacency in CSR layout; edge ids are positions in the sorted edge list.
#[derive(Debug, Clone)]
pub struct NodeBasedGraph {
    offsets: Vec<EdgeId>,
    heads: Vec<NodeId>,
    data: Vec<EdgeData>,
}

impl NodeBasedGraph {
    /// Builds the adjacency from directed edges. Edges keep their input
    /// order within a source node.
    pub fn from_edges(n_nodes: u32, mut edges: Vec<NodeBasedEdge>) -> Result<Self> {
        if edges.len() >= SPECIAL_EDGE_ID as usize {
            return Err(EbgError::InvalidGraph(format!(
                "{} edges exceed the edge id space",
                edges.len()
            )));
        }
        for edge in &edges {
            if edge.source >= n_nodes || edge.target >= n_nodes {
                return Err(EbgError::InvalidGraph(format!(
                    "edge {} -> {} references a node outside 0..{}",
                    edge.source, edge.target, n_nodes
                )));
            }
            if edge.source == edge.target {
                return Err(EbgError::InvalidGraph(format!(
                    "self loop at node {}",
                    edge.source
                )));
            }
        }

        edges.sort_by_key(|e| e.source);

        let mut offsets = vec![0 as EdgeId; n_nodes as usize + 1];
        for edge in &edges {
            offsets[edge.source as usize + 1] += 1;
        }
        for i in 0..n_nodes as usize {
            offsets[i + 1] += offsets[i];
        }

        let heads = edges.iter().map(|e| e.target).collect();
        let data = edges.iter().map(|e| e.data).collect();

        Ok(Self {
            offsets,
            heads,
            data,
        })
    }

    pub fn number_of_nodes(&self) -> u32 {
        (self.offsets.len() - 1) as u32
    }

    pub fn number_of_edges(&self) -> u32 {
        self.heads.len() as u32
    }

    pub fn adjacent_edges(&self, node: NodeId) -> Range<EdgeId> {
        self.offsets[node as usize]..self.offsets[node as usize + 1]
    }

    pub fn out_degree(&self, node: NodeId) -> u32 {
        let range = self.adjacent_edges(node);
        range.end - range.start
    }

    pub fn target(&self, edge: EdgeId) -> NodeId {
        self.heads[edge as usize]
    }

    pub fn edge_data(&self, edge: EdgeId) -> &EdgeData {
        &self.data[edge as usize]
    }

    pub fn source(&self, edge: EdgeId) -> NodeId {
        (self.offsets.partition_point(|&offset| offset <= edge) - 1) as NodeId
    }

    /// First edge `from -> to` in adjacency order.
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.adjacent_edges(from).find(|&e| self.target(e) == to)
    }

    /// The twin `v -> u` of `u -> v`. Parallel roads pair up by rank: the
    /// k-th `u -> v` edge maps to the k-th `v -> u` edge.
    pub fn reverse_edge(&self, edge: EdgeId) -> Option<EdgeId> {
        let from = self.source(edge);
        let to = self.target(edge);
        let rank = self
            .adjacent_edges(from)
            .take_while(|&e| e != edge)
            .filter(|&e| self.target(e) == to)
            .count();
        self.adjacent_edges(to)
            .filter(|&e| self.target(e) == from)
            .nth(rank)
    }
}

/// One point of a compressed chain: the node reached and the cost to reach it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedNode {
    pub node_id: NodeId,
    pub weight: EdgeWeight,
    pub duration: EdgeDuration,
}

/// Shape points removed by graph compression, per node-based edge.
///
/// A bucket lists the chain after the edge source and always ends with the
/// edge target, so an uncompressed edge has a single-entry (trivial) bucket.
#[derive(Debug, Clone, Default)]
pub struct CompressedGeometry {
    buckets: FxHashMap<EdgeId, Vec<CompressedNode>>,
}

impl CompressedGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, edge: EdgeId, bucket: Vec<CompressedNode>) {
        self.buckets.insert(edge, bucket);
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn has_entry(&self, edge: EdgeId) -> bool {
        self.buckets.contains_key(&edge)
    }

    pub fn bucket(&self, edge: EdgeId) -> Result<&[CompressedNode]> {
        match self.buckets.get(&edge) {
            Some(bucket) if !bucket.is_empty() => Ok(bucket),
            _ => Err(EbgError::MissingGeometry { edge }),
        }
    }

    pub fn is_trivial(&self, edge: EdgeId) -> Result<bool> {
        Ok(self.bucket(edge)?.len() == 1)
    }

    /// Node right before the edge target.
    pub fn last_edge_source(&self, edge: EdgeId) -> Result<NodeId> {
        let bucket = self.bucket(edge)?;
        bucket
            .len()
            .checked_sub(2)
            .map(|i| bucket[i].node_id)
            .ok_or(EbgError::MissingGeometry { edge })
    }

    /// Node right after the edge source.
    pub fn first_edge_target(&self, edge: EdgeId) -> Result<NodeId> {
        Ok(self.bucket(edge)?[0].node_id)
    }
}

/// Directed `(from, to)` pairs of the graph before compression
pub type UncompressedSegments = FxHashSet<(NodeId, NodeId)>;

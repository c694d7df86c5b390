//! Dense numbering of the drivable segments

use butterfly_common::{EdgeId, EdgeWeight, NodeId, SPECIAL_NODE_ID};
use tracing::warn;

use super::NetworkInputs;
use crate::error::{EbgError, Result};
use crate::formats::GeometryInfo;

/// Turn vertex labels of the node-based edges.
///
/// `weights` and `geometry_info` are indexed by turn vertex; the node
/// expansion appends the via-way duplicates to both.
pub(crate) struct SegmentLabels {
    mapping: Vec<NodeId>,
    pub weights: Vec<EdgeWeight>,
    pub geometry_info: Vec<GeometryInfo>,
    /// Ordinary turn vertices
    pub count: u32,
}

impl SegmentLabels {
    /// Turn vertex of `edge`, `None` when the edge is a reversed copy.
    pub fn vertex(&self, edge: EdgeId) -> Option<NodeId> {
        match self.mapping[edge as usize] {
            SPECIAL_NODE_ID => None,
            id => Some(id),
        }
    }

    pub fn require(&self, edge: EdgeId, from: NodeId, to: NodeId) -> Result<NodeId> {
        self.vertex(edge).ok_or(EbgError::MissingSegment { from, to })
    }
}

/// Labels every non-reversed edge with consecutive ids in adjacency order.
pub(crate) fn label_segments(network: &NetworkInputs<'_>) -> Result<SegmentLabels> {
    let graph = network.graph;
    let mut labels = SegmentLabels {
        mapping: vec![SPECIAL_NODE_ID; graph.number_of_edges() as usize],
        weights: Vec::with_capacity(graph.number_of_edges() as usize),
        geometry_info: Vec::with_capacity(graph.number_of_edges() as usize),
        count: 0,
    };

    for node in 0..graph.number_of_nodes() {
        for edge in graph.adjacent_edges(node) {
            let data = graph.edge_data(edge);
            if data.reversed {
                continue;
            }
            labels.weights.push(data.weight);
            labels.geometry_info.push(geometry_info(network, node, edge)?);
            labels.mapping[edge as usize] = labels.count;
            labels.count += 1;
        }
    }

    Ok(labels)
}

/// OSM way and OSM nodes passed along `start -> edge`.
pub(crate) fn geometry_info(
    network: &NetworkInputs<'_>,
    start: NodeId,
    edge: EdgeId,
) -> Result<GeometryInfo> {
    let graph = network.graph;
    let target = graph.target(edge);

    let mut nodes = vec![start];
    if network.geometry.has_entry(edge) {
        for point in network.geometry.bucket(edge)? {
            if nodes.last() != Some(&point.node_id) {
                nodes.push(point.node_id);
            }
        }
    }
    if nodes.last() != Some(&target) {
        nodes.push(target);
    }

    if let Some(uncompressed) = network.uncompressed {
        for pair in nodes.windows(2) {
            if !uncompressed.contains(&(pair[0], pair[1])) {
                warn!(from = pair[0], to = pair[1], edge, "compressed chain has no uncompressed segment");
                return Err(EbgError::MissingSegment {
                    from: pair[0],
                    to: pair[1],
                });
            }
        }
    }

    let osm_nodes = nodes
        .iter()
        .map(|&node| {
            network
                .osm_node_ids
                .get(node as usize)
                .copied()
                .ok_or(EbgError::UnknownNode {
                    node,
                    table: "OSM node id",
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(GeometryInfo {
        osm_way_id: graph.edge_data(edge).osm_way_id,
        nodes: osm_nodes,
    })
}

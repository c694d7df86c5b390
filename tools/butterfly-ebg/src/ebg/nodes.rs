//! Turn vertex attributes, snapping segments and the via-way duplicates

use butterfly_common::{EdgeId, NodeId, INVALID_EDGE_WEIGHT, SPECIAL_NODE_ID};
use tracing::debug;

use super::labeling::SegmentLabels;
use super::NetworkInputs;
use crate::error::{EbgError, Result};
use crate::formats::{EdgeBasedNode, EdgeBasedNodeSegment, NbgToEbg, SegmentId};
use crate::restrictions::WayRestrictionMap;

pub(crate) struct ExpandedNodes {
    pub nodes: Vec<EdgeBasedNode>,
    pub segments: Vec<EdgeBasedNodeSegment>,
    pub startpoints: Vec<bool>,
    pub nbg_to_ebg: Vec<NbgToEbg>,
}

/// Fills the attributes of every turn vertex, emits the snapping segments of
/// each undirected node-based edge, then appends one copy per via-way
/// duplicate.
pub(crate) fn generate_edge_expanded_nodes(
    network: &NetworkInputs<'_>,
    way_restrictions: &WayRestrictionMap,
    labels: &mut SegmentLabels,
) -> Result<ExpandedNodes> {
    let graph = network.graph;
    let mut expanded = ExpandedNodes {
        nodes: vec![EdgeBasedNode::default(); labels.count as usize],
        segments: Vec::new(),
        startpoints: Vec::new(),
        nbg_to_ebg: Vec::new(),
    };

    for u in 0..graph.number_of_nodes() {
        for edge in graph.adjacent_edges(u) {
            let v = graph.target(edge);
            if u >= v {
                continue;
            }

            let twin = graph
                .reverse_edge(edge)
                .ok_or(EbgError::MissingSegment { from: v, to: u })?;

            let mapping = if labels.vertex(edge).is_some() {
                insert_edge_based_node(network, labels, &mut expanded, u, edge, twin)?
            } else {
                insert_edge_based_node(network, labels, &mut expanded, v, twin, edge)?
            };
            expanded.nbg_to_ebg.push(mapping);
        }
    }

    append_duplicates(network, way_restrictions, labels, &mut expanded)?;

    debug!(
        vertices = expanded.nodes.len(),
        segments = expanded.segments.len(),
        mappings = expanded.nbg_to_ebg.len(),
        "turn vertices expanded"
    );
    Ok(expanded)
}

/// `forward` runs `source -> target`, `reverse` is its twin. Only `forward`
/// must be drivable.
fn insert_edge_based_node(
    network: &NetworkInputs<'_>,
    labels: &mut SegmentLabels,
    expanded: &mut ExpandedNodes,
    source: NodeId,
    forward: EdgeId,
    reverse: EdgeId,
) -> Result<NbgToEbg> {
    let graph = network.graph;
    let target = graph.target(forward);
    let forward_data = graph.edge_data(forward);
    let reverse_data = graph.edge_data(reverse);

    let Some(forward_vertex) = labels.vertex(forward) else {
        // Neither direction can be driven
        return Ok(NbgToEbg {
            u: source,
            v: target,
            forward_ebg_node: SPECIAL_NODE_ID,
            backward_ebg_node: SPECIAL_NODE_ID,
        });
    };
    let reverse_vertex = labels.vertex(reverse);

    expanded.nodes[forward_vertex as usize] = EdgeBasedNode {
        geometry_id: forward_data.geometry_id,
        annotation_id: forward_data.annotation_id,
        segregated: network.segregated_edges.contains(&forward),
    };
    match reverse_vertex {
        Some(reverse_vertex) => {
            expanded.nodes[reverse_vertex as usize] = EdgeBasedNode {
                geometry_id: reverse_data.geometry_id,
                annotation_id: reverse_data.annotation_id,
                segregated: network.segregated_edges.contains(&reverse),
            };
        }
        // One-way: the vertex is only usable through turns
        None => labels.weights[forward_vertex as usize] = INVALID_EDGE_WEIGHT,
    }

    let forward_geometry = network.geometry.bucket(forward)?;
    let reverse_geometry = network.geometry.bucket(reverse)?;
    if forward_geometry.len() != reverse_geometry.len() {
        return Err(EbgError::MismatchedGeometry {
            u: source,
            v: target,
            forward: forward_geometry.len(),
            reverse: reverse_geometry.len(),
        });
    }

    let forward_segment_id = SegmentId::from_vertex(Some(forward_vertex));
    let reverse_segment_id = SegmentId::from_vertex(reverse_vertex);
    let startpoint = forward_data.startpoint || reverse_data.startpoint;

    let mut current = source;
    for (position, point) in forward_geometry.iter().enumerate() {
        // Zero-length pieces only carry penalties
        if point.node_id == current {
            continue;
        }
        expanded.segments.push(EdgeBasedNodeSegment {
            forward_segment_id,
            reverse_segment_id,
            u: current,
            v: point.node_id,
            fwd_segment_position: position as u32,
        });
        expanded.startpoints.push(startpoint);
        current = point.node_id;
    }

    Ok(NbgToEbg {
        u: source,
        v: target,
        forward_ebg_node: forward_vertex,
        backward_ebg_node: reverse_vertex.unwrap_or(SPECIAL_NODE_ID),
    })
}

fn append_duplicates(
    network: &NetworkInputs<'_>,
    way_restrictions: &WayRestrictionMap,
    labels: &mut SegmentLabels,
    expanded: &mut ExpandedNodes,
) -> Result<()> {
    let graph = network.graph;

    for via_way in way_restrictions.duplicated_node_representatives() {
        let edge = graph
            .find_edge(via_way.from, via_way.to)
            .ok_or(EbgError::MissingSegment {
                from: via_way.from,
                to: via_way.to,
            })?;
        let base = labels.require(edge, via_way.from, via_way.to)?;
        let data = graph.edge_data(edge);

        expanded.nodes.push(EdgeBasedNode {
            geometry_id: data.geometry_id,
            annotation_id: data.annotation_id,
            segregated: network.segregated_edges.contains(&edge),
        });
        let weight = labels.weights[base as usize];
        labels.weights.push(weight);
        let info = labels.geometry_info[base as usize].clone();
        labels.geometry_info.push(info);
    }

    let expected = labels.count as usize + way_restrictions.number_of_duplicated_nodes();
    if expanded.nodes.len() != expected || labels.weights.len() != expected {
        return Err(EbgError::DuplicateCountMismatch {
            expected,
            actual: expanded.nodes.len(),
            segments: labels.count as usize,
            duplicates: way_restrictions.number_of_duplicated_nodes(),
        });
    }
    Ok(())
}

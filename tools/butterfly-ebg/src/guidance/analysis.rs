//! Turn analysis service: the intersection view of an approach and the
//! legality of each turn

use butterfly_common::{Coordinate, EdgeId, NodeId, INVALID_LANE_DATA_ID};
use rustc_hash::FxHashSet;

use super::{ConnectedRoad, DirectionModifier, TurnInstruction, TurnType};
use crate::error::{EbgError, Result};
use crate::graph::{CompressedGeometry, NodeBasedGraph};
use crate::restrictions::RestrictionMap;

/// Segment entering an intersection: `node -> intersection` along `edge`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingEdge {
    pub node: NodeId,
    pub edge: EdgeId,
}

/// Segment leaving an intersection: `node` is the intersection itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutgoingEdge {
    pub node: NodeId,
    pub edge: EdgeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnVerdict {
    Allowed,
    /// U-turn away from a dead end
    UTurn,
    /// Crossing a barrier node
    Barrier,
    /// Forbidden by an unconditional node restriction
    Restricted,
}

/// Every segment that can be driven into `intersection`, in adjacency order.
pub fn incoming_edges(graph: &NodeBasedGraph, intersection: NodeId) -> Result<Vec<IncomingEdge>> {
    let mut incoming = Vec::new();
    for edge in graph.adjacent_edges(intersection) {
        let node = graph.target(edge);
        let twin = graph.reverse_edge(edge).ok_or(EbgError::MissingSegment {
            from: node,
            to: intersection,
        })?;
        if !graph.edge_data(twin).reversed {
            incoming.push(IncomingEdge { node, edge: twin });
        }
    }
    Ok(incoming)
}

/// Every segment that can be driven out of `intersection`, in adjacency order.
pub fn outgoing_edges(graph: &NodeBasedGraph, intersection: NodeId) -> Vec<OutgoingEdge> {
    graph
        .adjacent_edges(intersection)
        .filter(|&edge| !graph.edge_data(edge).reversed)
        .map(|edge| OutgoingEdge {
            node: intersection,
            edge,
        })
        .collect()
}

/// Guidance and legality decisions consumed by the turn expansion.
pub trait TurnAnalysis: Sync {
    /// All roads at `intersection` seen when arriving over `incoming`,
    /// ordered by turn angle with the road back first. Every outgoing
    /// segment must appear.
    fn intersection(&self, intersection: NodeId, incoming: &IncomingEdge)
        -> Result<Vec<ConnectedRoad>>;

    /// Whether `incoming -> outgoing` may be taken at `intersection`.
    fn verdict(
        &self,
        intersection: NodeId,
        incoming: &IncomingEdge,
        outgoing: &OutgoingEdge,
    ) -> TurnVerdict;
}

/// Analysis from road geometry alone: bearings from coordinates,
/// angle-bucket instructions, no lane data.
///
/// U-turns are only allowed at dead ends and barriers, barriers only allow
/// u-turns, and unconditional node restrictions apply.
pub struct GeometricTurnAnalysis<'a> {
    graph: &'a NodeBasedGraph,
    geometry: &'a CompressedGeometry,
    coordinates: &'a [Coordinate],
    restrictions: &'a RestrictionMap,
    barrier_nodes: &'a FxHashSet<NodeId>,
}

impl<'a> GeometricTurnAnalysis<'a> {
    pub fn new(
        graph: &'a NodeBasedGraph,
        geometry: &'a CompressedGeometry,
        coordinates: &'a [Coordinate],
        restrictions: &'a RestrictionMap,
        barrier_nodes: &'a FxHashSet<NodeId>,
    ) -> Self {
        Self {
            graph,
            geometry,
            coordinates,
            restrictions,
            barrier_nodes,
        }
    }

    fn coordinate(&self, node: NodeId) -> Result<&Coordinate> {
        self.coordinates.get(node as usize).ok_or(EbgError::UnknownNode {
            node,
            table: "coordinate",
        })
    }

    /// Bearing of `edge` leaving `intersection`, measured towards its first
    /// shape point.
    fn edge_bearing(&self, intersection: NodeId, edge: EdgeId) -> Result<f64> {
        let first = if self.geometry.has_entry(edge) {
            self.geometry.first_edge_target(edge)?
        } else {
            self.graph.target(edge)
        };
        Ok(self
            .coordinate(intersection)?
            .bearing_to(self.coordinate(first)?))
    }
}

impl TurnAnalysis for GeometricTurnAnalysis<'_> {
    fn intersection(
        &self,
        intersection: NodeId,
        incoming: &IncomingEdge,
    ) -> Result<Vec<ConnectedRoad>> {
        let road_back = self
            .graph
            .reverse_edge(incoming.edge)
            .ok_or(EbgError::MissingSegment {
                from: intersection,
                to: incoming.node,
            })?;
        let back_bearing = self.edge_bearing(intersection, road_back)?;
        let has_choice = self.graph.out_degree(intersection) > 2;

        let mut roads = Vec::with_capacity(self.graph.out_degree(intersection) as usize);
        for edge in self.graph.adjacent_edges(intersection) {
            let bearing = self.edge_bearing(intersection, edge)?;
            let is_back = edge == road_back;
            let angle = if is_back {
                0.0
            } else {
                (back_bearing - bearing).rem_euclid(360.0)
            };

            let direction_modifier = DirectionModifier::from_angle(angle);
            let turn_type = if is_back || direction_modifier == DirectionModifier::UTurn {
                TurnType::Continue
            } else if !has_choice {
                TurnType::NoTurn
            } else if direction_modifier == DirectionModifier::Straight {
                TurnType::Continue
            } else {
                TurnType::Turn
            };

            let outgoing = OutgoingEdge {
                node: intersection,
                edge,
            };
            let entry_allowed = !self.graph.edge_data(edge).reversed
                && self.verdict(intersection, incoming, &outgoing) == TurnVerdict::Allowed;

            roads.push(ConnectedRoad {
                eid: edge,
                entry_allowed,
                bearing,
                angle,
                instruction: TurnInstruction::new(turn_type, direction_modifier),
                lane_data_id: INVALID_LANE_DATA_ID,
            });
        }

        roads.sort_by(|a, b| {
            (a.eid != road_back)
                .cmp(&(b.eid != road_back))
                .then(a.angle.total_cmp(&b.angle))
        });
        Ok(roads)
    }

    fn verdict(
        &self,
        intersection: NodeId,
        incoming: &IncomingEdge,
        outgoing: &OutgoingEdge,
    ) -> TurnVerdict {
        let to = self.graph.target(outgoing.edge);
        let is_uturn = to == incoming.node;
        let is_barrier = self.barrier_nodes.contains(&intersection);

        if is_barrier && !is_uturn {
            return TurnVerdict::Barrier;
        }
        if is_uturn && !is_barrier && self.graph.out_degree(intersection) > 1 {
            return TurnVerdict::UTurn;
        }
        if self.restrictions.is_restricted(incoming.node, intersection, to) {
            return TurnVerdict::Restricted;
        }
        TurnVerdict::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeData, GeometryId, NodeBasedEdge};
    use crate::restrictions::NodeRestriction;

    fn both_ways(a: NodeId, b: NodeId) -> Vec<NodeBasedEdge> {
        let data = EdgeData {
            weight: 10,
            duration: 10,
            geometry_id: GeometryId::default(),
            annotation_id: 0,
            osm_way_id: 1,
            reversed: false,
            startpoint: true,
            restricted: false,
        };
        vec![
            NodeBasedEdge {
                source: a,
                target: b,
                data,
            },
            NodeBasedEdge {
                source: b,
                target: a,
                data,
            },
        ]
    }

    /// Center 0 with arms north (1), east (2), south (3), west (4).
    fn plus_sign() -> (NodeBasedGraph, Vec<Coordinate>) {
        let edges = [1, 2, 3, 4].iter().flat_map(|&arm| both_ways(0, arm)).collect();
        let graph = NodeBasedGraph::from_edges(5, edges).unwrap();
        let coordinates = vec![
            Coordinate::from_degrees(0.0, 0.0),
            Coordinate::from_degrees(0.0, 0.001),
            Coordinate::from_degrees(0.001, 0.0),
            Coordinate::from_degrees(0.0, -0.001),
            Coordinate::from_degrees(-0.001, 0.0),
        ];
        (graph, coordinates)
    }

    #[test]
    fn test_roads_ordered_by_turn_angle() {
        let (graph, coordinates) = plus_sign();
        let geometry = CompressedGeometry::new();
        let restrictions = RestrictionMap::default();
        let barriers = FxHashSet::default();
        let analysis =
            GeometricTurnAnalysis::new(&graph, &geometry, &coordinates, &restrictions, &barriers);

        // Arriving from the south arm, heading north
        let incoming = incoming_edges(&graph, 0)
            .unwrap()
            .into_iter()
            .find(|i| i.node == 3)
            .unwrap();
        let roads = analysis.intersection(0, &incoming).unwrap();

        let targets: Vec<NodeId> = roads.iter().map(|r| graph.target(r.eid)).collect();
        // back (south), right (east), straight (north), left (west)
        assert_eq!(targets, vec![3, 2, 1, 4]);
        assert!(!roads[0].entry_allowed);
        assert!(roads[1..].iter().all(|r| r.entry_allowed));
        assert_eq!(roads[1].instruction.direction_modifier, DirectionModifier::Right);
        assert_eq!(roads[2].instruction.turn_type, TurnType::Continue);
        assert_eq!(roads[3].instruction.direction_modifier, DirectionModifier::Left);
        assert!((roads[1].angle - 90.0).abs() < 0.5);
    }

    #[test]
    fn test_verdicts() {
        let (graph, coordinates) = plus_sign();
        let geometry = CompressedGeometry::new();
        let restrictions = RestrictionMap::new(vec![NodeRestriction {
            from: 3,
            via: 0,
            to: 4,
            is_only: false,
            condition: None,
        }]);
        let mut barriers = FxHashSet::default();
        let analysis =
            GeometricTurnAnalysis::new(&graph, &geometry, &coordinates, &restrictions, &barriers);

        let incoming = incoming_edges(&graph, 0)
            .unwrap()
            .into_iter()
            .find(|i| i.node == 3)
            .unwrap();
        let towards = |to: NodeId| OutgoingEdge {
            node: 0,
            edge: graph.find_edge(0, to).unwrap(),
        };

        assert_eq!(analysis.verdict(0, &incoming, &towards(1)), TurnVerdict::Allowed);
        assert_eq!(analysis.verdict(0, &incoming, &towards(3)), TurnVerdict::UTurn);
        assert_eq!(analysis.verdict(0, &incoming, &towards(4)), TurnVerdict::Restricted);

        barriers.insert(0);
        let analysis =
            GeometricTurnAnalysis::new(&graph, &geometry, &coordinates, &restrictions, &barriers);
        assert_eq!(analysis.verdict(0, &incoming, &towards(1)), TurnVerdict::Barrier);
        assert_eq!(analysis.verdict(0, &incoming, &towards(3)), TurnVerdict::Allowed);
    }

    #[test]
    fn test_dead_end_allows_uturn() {
        let (graph, coordinates) = plus_sign();
        let geometry = CompressedGeometry::new();
        let restrictions = RestrictionMap::default();
        let barriers = FxHashSet::default();
        let analysis =
            GeometricTurnAnalysis::new(&graph, &geometry, &coordinates, &restrictions, &barriers);

        let incoming = incoming_edges(&graph, 1).unwrap();
        assert_eq!(incoming, vec![IncomingEdge { node: 0, edge: graph.find_edge(0, 1).unwrap() }]);
        let outgoing = outgoing_edges(&graph, 1);
        assert_eq!(
            analysis.verdict(1, &incoming[0], &outgoing[0]),
            TurnVerdict::Allowed
        );
    }
}

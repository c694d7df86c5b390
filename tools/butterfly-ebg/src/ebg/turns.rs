//! Turn generation: every allowed movement through every intersection
//! becomes an edge between turn vertices.

use butterfly_common::{
    BearingClassId, Coordinate, EdgeId, EntryClassId, NodeId, TurnPenalty, INVALID_BEARING_CLASS_ID,
};
use std::ops::Range;
use tracing::{debug, warn};

use super::conditionals::PendingConditional;
use super::labeling::SegmentLabels;
use super::pipeline::{self, WINDOW_PER_THREAD};
use super::{
    FactoryConfig, NetworkInputs, RestrictionInputs, TurnContext, TurnCostEvaluator, TurnStats,
    TurnVertex,
};
use crate::error::{EbgError, PenaltyKind, Result};
use crate::formats::{
    ConditionalTurnPenalty, EdgeBasedEdge, TurnData, TurnIndexBlock, TurnIndexSink,
};
use crate::graph::NodeAnnotation;
use crate::guidance::analysis::{incoming_edges, outgoing_edges};
use crate::guidance::{
    classify_intersection, BearingClass, ConcurrentIdMap, ConnectedRoad, EntryClass,
    IncomingEdge, OutgoingEdge, TurnAnalysis, TurnBearing, TurnVerdict,
};

/// Everything recorded for one generated turn
#[derive(Debug, Clone)]
struct EdgeWithData {
    edge: EdgeBasedEdge,
    turn_index: TurnIndexBlock,
    weight_penalty: TurnPenalty,
    duration_penalty: TurnPenalty,
    turn_data: TurnData,
}

/// Output of one batch of intersections
#[derive(Debug, Default)]
struct PipelineBuffer {
    bearing_class_ids: Vec<(NodeId, BearingClassId)>,
    continuous: Vec<EdgeWithData>,
    /// Turns leaving via-way duplicates, appended after all others
    delayed: Vec<EdgeWithData>,
    conditionals: Vec<PendingConditional>,
    stats: TurnStats,
}

/// Turn tables in final order, before turn ids are assigned
#[derive(Debug, Default)]
pub(crate) struct GeneratedTurns {
    pub edges: Vec<EdgeBasedEdge>,
    pub turn_data: Vec<TurnData>,
    pub turn_weight_penalties: Vec<TurnPenalty>,
    pub turn_duration_penalties: Vec<TurnPenalty>,
    pub conditionals: Vec<PendingConditional>,
    pub bearing_classes: Vec<BearingClass>,
    pub entry_classes: Vec<EntryClass>,
    pub bearing_class_ids: Vec<BearingClassId>,
    pub stats: TurnStats,
}

impl GeneratedTurns {
    fn push(&mut self, turn: EdgeWithData) -> TurnIndexBlock {
        self.edges.push(turn.edge);
        self.turn_data.push(turn.turn_data);
        self.turn_weight_penalties.push(turn.weight_penalty);
        self.turn_duration_penalties.push(turn.duration_penalty);
        turn.turn_index
    }
}

/// Holds turn index blocks back until `capacity` are collected.
struct TurnIndexBuffer<'s> {
    sink: &'s mut dyn TurnIndexSink,
    blocks: Vec<TurnIndexBlock>,
    capacity: usize,
}

impl<'s> TurnIndexBuffer<'s> {
    fn new(sink: &'s mut dyn TurnIndexSink, capacity: usize) -> Self {
        Self {
            sink,
            blocks: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, block: TurnIndexBlock) -> Result<()> {
        self.blocks.push(block);
        if self.blocks.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.blocks.is_empty() {
            return Ok(());
        }
        self.sink.append(&self.blocks).map_err(EbgError::Sink)?;
        debug!(blocks = self.blocks.len(), "flushed turn index");
        self.blocks.clear();
        Ok(())
    }
}

/// Converts a scaled penalty to 16 bits, truncating towards zero.
pub(crate) fn scale_penalty(value: f64, kind: PenaltyKind, intersection: NodeId) -> Result<TurnPenalty> {
    if value > f64::from(TurnPenalty::MIN) - 1.0 && value < f64::from(TurnPenalty::MAX) + 1.0 {
        Ok(value.trunc() as TurnPenalty)
    } else {
        Err(EbgError::PenaltyOutOfRange {
            kind,
            value,
            intersection,
        })
    }
}

struct TurnGenerator<'a> {
    network: &'a NetworkInputs<'a>,
    restrictions: RestrictionInputs<'a>,
    analysis: &'a dyn TurnAnalysis,
    evaluator: &'a dyn TurnCostEvaluator,
    labels: &'a SegmentLabels,
    weight_multiplier: f64,
    entry_classes: &'a ConcurrentIdMap<EntryClass>,
    bearing_classes: &'a ConcurrentIdMap<BearingClass>,
}

impl TurnGenerator<'_> {
    fn process_batch(&self, intersections: Range<NodeId>) -> Result<PipelineBuffer> {
        let mut buffer = PipelineBuffer::default();
        for intersection in intersections {
            self.process_intersection(intersection, &mut buffer)?;
        }
        Ok(buffer)
    }

    fn coordinate(&self, node: NodeId) -> Result<Coordinate> {
        self.network
            .coordinates
            .get(node as usize)
            .copied()
            .ok_or(EbgError::UnknownNode {
                node,
                table: "coordinate",
            })
    }

    fn annotation(&self, node: NodeId, id: u32) -> Result<&NodeAnnotation> {
        self.network
            .annotations
            .get(id as usize)
            .ok_or(EbgError::UnknownNode {
                node,
                table: "annotation",
            })
    }

    fn process_intersection(&self, intersection: NodeId, buffer: &mut PipelineBuffer) -> Result<()> {
        let graph = self.network.graph;
        let way = self.restrictions.way;

        let incoming_edges = incoming_edges(graph, intersection)?;
        if incoming_edges.is_empty() {
            return Ok(());
        }
        let outgoing_edges = outgoing_edges(graph, intersection);

        for incoming in &incoming_edges {
            buffer.stats.node_based_edges += 1;
            let from_vertex = self.labels.require(incoming.edge, incoming.node, intersection)?;

            let roads = self.analysis.intersection(intersection, incoming)?;
            if roads.len() > EntryClass::MAX_ROADS {
                warn!(
                    intersection,
                    roads = roads.len(),
                    "intersection has more roads than an entry class can describe"
                );
            }

            // The entry class depends on the approach, so classify per incoming edge
            let (entry_class, bearing_class) = classify_intersection(&roads);
            let entry_class_id = self.entry_classes.find_or_add(&entry_class);
            let bearing_class_id = self.bearing_classes.find_or_add(&bearing_class);
            buffer.bearing_class_ids.push((intersection, bearing_class_id));

            let turning_off_via_way = way.is_via_way(incoming.node, intersection);

            let road_back = graph
                .reverse_edge(incoming.edge)
                .ok_or(EbgError::MissingSegment {
                    from: intersection,
                    to: incoming.node,
                })?;
            let incoming_bearing = find_road(&roads, intersection, road_back)
                .map(|road| TurnBearing::from_degrees(road.bearing).reverse())?;

            for outgoing in &outgoing_edges {
                match self.analysis.verdict(intersection, incoming, outgoing) {
                    TurnVerdict::Allowed => {}
                    TurnVerdict::UTurn => {
                        buffer.stats.skipped_uturns += 1;
                        continue;
                    }
                    TurnVerdict::Barrier => {
                        buffer.stats.skipped_barrier_turns += 1;
                        continue;
                    }
                    TurnVerdict::Restricted => {
                        buffer.stats.restricted_turns += 1;
                        continue;
                    }
                }

                let road = find_road(&roads, intersection, outgoing.edge)?;
                let to_node = graph.target(outgoing.edge);
                let to_vertex = self.labels.require(outgoing.edge, intersection, to_node)?;

                // Entering a via way from its restriction's approach lands on the duplicate
                let target = way
                    .remap_if_restricted(
                        TurnVertex::Ordinary(to_vertex),
                        incoming.node,
                        intersection,
                        to_node,
                    )
                    .to_dense(self.labels.count);

                let (turn, conditional) = self.generate_edge(
                    from_vertex,
                    target,
                    incoming,
                    intersection,
                    outgoing,
                    incoming_bearing,
                    road,
                    entry_class_id,
                )?;
                buffer.continuous.push(turn);
                buffer.conditionals.extend(conditional);

                if !turning_off_via_way {
                    continue;
                }

                for &duplicate_index in way.duplicated_node_ids(incoming.node, intersection) {
                    let duplicate = TurnVertex::ViaDuplicate {
                        base: from_vertex,
                        duplicate_index,
                    }
                    .to_dense(self.labels.count);

                    let way_condition = match way.get_restriction(duplicate_index, to_node) {
                        Some(restriction) => match &restriction.condition {
                            Some(condition) => Some(condition.clone()),
                            None => {
                                buffer.stats.restricted_turns += 1;
                                continue;
                            }
                        },
                        None => None,
                    };

                    let (turn, conditional) = self.generate_edge(
                        duplicate,
                        to_vertex,
                        incoming,
                        intersection,
                        outgoing,
                        incoming_bearing,
                        road,
                        entry_class_id,
                    )?;
                    buffer.delayed.push(turn);
                    buffer.conditionals.extend(conditional);
                    buffer.stats.via_way_turns += 1;

                    if let Some(condition) = way_condition {
                        buffer.conditionals.push(PendingConditional {
                            from: duplicate,
                            to: to_vertex,
                            penalty: ConditionalTurnPenalty::unassigned(
                                self.coordinate(intersection)?,
                                condition,
                            ),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_edge(
        &self,
        from: NodeId,
        to: NodeId,
        incoming: &IncomingEdge,
        intersection: NodeId,
        outgoing: &OutgoingEdge,
        incoming_bearing: TurnBearing,
        road: &ConnectedRoad,
        entry_class_id: EntryClassId,
    ) -> Result<(EdgeWithData, Option<PendingConditional>)> {
        let graph = self.network.graph;
        let geometry = self.network.geometry;
        let to_node = graph.target(outgoing.edge);

        let conditional = match self
            .restrictions
            .conditional
            .restriction_for(incoming.node, intersection, to_node)
            .and_then(|restriction| restriction.condition.clone())
        {
            Some(condition) => Some(PendingConditional {
                from,
                to,
                penalty: ConditionalTurnPenalty::unassigned(self.coordinate(intersection)?, condition),
            }),
            None => None,
        };

        let source = graph.edge_data(incoming.edge);
        let target = graph.edge_data(outgoing.edge);
        let source_annotation = self.annotation(incoming.node, source.annotation_id)?;
        let target_annotation = self.annotation(intersection, target.annotation_id)?;

        let context = TurnContext {
            angle: TurnContext::signed_angle(road.angle),
            number_of_roads: graph.out_degree(intersection),
            is_u_turn: road.instruction.is_uturn(),
            has_traffic_light: self.network.traffic_lights.contains(&intersection),
            source_restricted: source.restricted,
            target_restricted: target.restricted,
            is_left_hand_driving: source_annotation.is_left_hand_driving,
            source_mode: source_annotation.travel_mode,
            target_mode: target_annotation.travel_mode,
        };
        let cost = self.evaluator.evaluate(&context);

        // 16-bit penalties: weight units and deciseconds
        let weight_penalty = scale_penalty(
            cost.weight * self.weight_multiplier,
            PenaltyKind::Weight,
            intersection,
        )?;
        let duration_penalty =
            scale_penalty(cost.duration * 10.0, PenaltyKind::Duration, intersection)?;

        let weight = source
            .weight
            .checked_add(i32::from(weight_penalty))
            .ok_or(EbgError::WeightOverflow {
                kind: PenaltyKind::Weight,
                intersection,
            })?;
        let duration = source
            .duration
            .checked_add(i32::from(duration_penalty))
            .ok_or(EbgError::WeightOverflow {
                kind: PenaltyKind::Duration,
                intersection,
            })?;

        let turn_from = if geometry.is_trivial(incoming.edge)? {
            incoming.node
        } else {
            geometry.last_edge_source(incoming.edge)?
        };
        let turn_index = TurnIndexBlock {
            from: turn_from,
            via: intersection,
            to: geometry.first_edge_target(outgoing.edge)?,
        };

        let turn_data = TurnData {
            instruction: road.instruction,
            lane_data_id: road.lane_data_id,
            entry_class_id,
            pre_turn_bearing: incoming_bearing,
            post_turn_bearing: TurnBearing::from_degrees(road.bearing),
        };

        Ok((
            EdgeWithData {
                edge: EdgeBasedEdge::new(from, to, weight, duration),
                turn_index,
                weight_penalty,
                duration_penalty,
                turn_data,
            },
            conditional,
        ))
    }
}

fn find_road(roads: &[ConnectedRoad], intersection: NodeId, edge: EdgeId) -> Result<&ConnectedRoad> {
    roads
        .iter()
        .find(|road| road.eid == edge)
        .ok_or(EbgError::MissingRoad { intersection, edge })
}

/// Generates all turns in batches on `pool`, streaming the turn index to
/// `sink`. Turns leaving via-way duplicates follow all others, sorted by
/// source vertex.
#[allow(clippy::too_many_arguments)]
pub(crate) fn generate_edge_expanded_edges(
    network: &NetworkInputs<'_>,
    restrictions: RestrictionInputs<'_>,
    analysis: &dyn TurnAnalysis,
    evaluator: &dyn TurnCostEvaluator,
    labels: &SegmentLabels,
    config: &FactoryConfig,
    pool: &rayon::ThreadPool,
    sink: &mut dyn TurnIndexSink,
) -> Result<GeneratedTurns> {
    let graph = network.graph;
    let entry_classes = ConcurrentIdMap::new();
    let bearing_classes = ConcurrentIdMap::new();
    let generator = TurnGenerator {
        network,
        restrictions,
        analysis,
        evaluator,
        labels,
        weight_multiplier: config.weight_multiplier,
        entry_classes: &entry_classes,
        bearing_classes: &bearing_classes,
    };

    let mut generated = GeneratedTurns {
        bearing_class_ids: vec![INVALID_BEARING_CLASS_ID; graph.number_of_nodes() as usize],
        ..GeneratedTurns::default()
    };
    let mut turn_indexes = TurnIndexBuffer::new(sink, config.turn_index_buffer);
    let mut delayed = Vec::new();

    pipeline::run_ordered(
        pool,
        graph.number_of_nodes(),
        config.batch_size,
        pool.current_num_threads() * WINDOW_PER_THREAD,
        |intersections| generator.process_batch(intersections),
        |buffer| {
            for (node, id) in buffer.bearing_class_ids {
                generated.bearing_class_ids[node as usize] = id;
            }
            for turn in buffer.continuous {
                let block = generated.push(turn);
                turn_indexes.push(block)?;
            }
            delayed.extend(buffer.delayed);
            generated.conditionals.extend(buffer.conditionals);
            generated.stats.merge(&buffer.stats);
            Ok(())
        },
    )?;

    delayed.sort_by_key(|turn: &EdgeWithData| turn.edge.source);
    debug!(turns = delayed.len(), "appending via-way turns");
    for turn in delayed {
        let block = generated.push(turn);
        turn_indexes.push(block)?;
    }
    turn_indexes.flush()?;

    generated.entry_classes = entry_classes.into_values();
    generated.bearing_classes = bearing_classes.into_values();
    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalty_cast_truncates_and_bounds() {
        let at = 3;
        assert_eq!(scale_penalty(12.9, PenaltyKind::Weight, at).unwrap(), 12);
        assert_eq!(scale_penalty(-12.9, PenaltyKind::Weight, at).unwrap(), -12);
        assert_eq!(scale_penalty(32767.9, PenaltyKind::Weight, at).unwrap(), 32767);
        assert_eq!(scale_penalty(-32768.5, PenaltyKind::Weight, at).unwrap(), -32768);

        for value in [32768.0, -32769.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                scale_penalty(value, PenaltyKind::Duration, at),
                Err(EbgError::PenaltyOutOfRange {
                    kind: PenaltyKind::Duration,
                    intersection: 3,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_turn_index_buffer_flushes_at_capacity() {
        let mut sink: Vec<TurnIndexBlock> = Vec::new();
        {
            let mut buffer = TurnIndexBuffer::new(&mut sink, 2);
            for via in 0..5 {
                buffer.push(TurnIndexBlock { from: 0, via, to: 1 }).unwrap();
            }
            assert_eq!(buffer.blocks.len(), 1);
            buffer.flush().unwrap();
        }
        let vias: Vec<NodeId> = sink.iter().map(|b| b.via).collect();
        assert_eq!(vias, vec![0, 1, 2, 3, 4]);
    }
}

///! Edge-based graph (EBG) construction
///!
///! Builds a turn-expanded graph where:
///! - Nodes = drivable directed segments of the compressed node-based graph,
///!   plus one duplicate per via-way restriction approach
///! - Edges = turns allowed at intersections, weighted with the cost of the
///!   source segment plus the turn penalty
///!
///! Stages: label segments, expand nodes, generate turns in parallel
///! batches, assign turn ids, index conditional penalties.

use butterfly_common::{
    BearingClassId, Coordinate, EdgeId, EdgeWeight, NodeId, OsmNodeId, TurnPenalty,
};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::error::{EbgError, Result};
use crate::formats::{
    ConditionalTurnPenalty, EdgeBasedEdge, EdgeBasedNode, EdgeBasedNodeSegment, GeometryInfo,
    NbgToEbg, TurnData, TurnIndexSink,
};
use crate::graph::{CompressedGeometry, NodeAnnotation, NodeBasedGraph, UncompressedSegments};
use crate::guidance::{BearingClass, EntryClass, TurnAnalysis};
use crate::restrictions::{DuplicatedNodeId, RestrictionMap, WayRestrictionMap};

pub mod conditionals;
pub mod labeling;
pub mod nodes;
pub mod pipeline;
pub mod turn_penalty;
pub mod turns;

pub use turn_penalty::{
    SigmoidTurnCost, TurnContext, TurnCost, TurnCostEvaluator, TurnPenaltyConfig,
};

/// A turn vertex: an ordinary segment, or the copy of a via-way segment
/// entered from a restricted approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnVertex {
    Ordinary(NodeId),
    ViaDuplicate {
        base: NodeId,
        duplicate_index: DuplicatedNodeId,
    },
}

impl TurnVertex {
    /// Dense id: ordinary vertices keep their label, duplicates follow the
    /// `number_of_segments` ordinary ones.
    pub fn to_dense(self, number_of_segments: u32) -> NodeId {
        match self {
            TurnVertex::Ordinary(id) => id,
            TurnVertex::ViaDuplicate {
                duplicate_index, ..
            } => number_of_segments + duplicate_index,
        }
    }
}

/// Read-only view of the compressed network the factory expands
#[derive(Clone, Copy)]
pub struct NetworkInputs<'a> {
    pub graph: &'a NodeBasedGraph,
    pub geometry: &'a CompressedGeometry,
    pub annotations: &'a [NodeAnnotation],
    pub coordinates: &'a [Coordinate],
    pub osm_node_ids: &'a [OsmNodeId],
    pub traffic_lights: &'a FxHashSet<NodeId>,
    /// Node-based edges that belong to dual carriageways
    pub segregated_edges: &'a FxHashSet<EdgeId>,
    /// When present, every piece of a compressed chain must be one of these
    pub uncompressed: Option<&'a UncompressedSegments>,
}

/// Restrictions the expansion applies itself; unconditional node
/// restrictions are left to the [`TurnAnalysis`].
#[derive(Clone, Copy)]
pub struct RestrictionInputs<'a> {
    pub conditional: &'a RestrictionMap,
    pub way: &'a WayRestrictionMap,
}

#[derive(Debug, Clone)]
pub struct FactoryConfig {
    /// Intersections per turn generation batch
    pub batch_size: u32,
    /// Turn index blocks held back before they go to the sink
    pub turn_index_buffer: usize,
    /// Worker threads, 0 = one per core
    pub threads: usize,
    /// Turn penalty seconds are scaled by this before the 16-bit cast
    pub weight_multiplier: f64,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            turn_index_buffer: 1000,
            threads: 0,
            weight_multiplier: 10.0,
        }
    }
}

impl FactoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EbgError::InvalidConfig("batch size must be positive".into()));
        }
        if self.turn_index_buffer == 0 {
            return Err(EbgError::InvalidConfig(
                "turn index buffer must be positive".into(),
            ));
        }
        if !self.weight_multiplier.is_finite() || self.weight_multiplier <= 0.0 {
            return Err(EbgError::InvalidConfig(format!(
                "weight multiplier {} must be a positive number",
                self.weight_multiplier
            )));
        }
        Ok(())
    }
}

/// Counters reported by one factory run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnStats {
    /// Node-based edges entering some intersection
    pub node_based_edges: u64,
    pub generated_turns: u64,
    /// Turns dropped by node or via-way restrictions
    pub restricted_turns: u64,
    pub skipped_uturns: u64,
    pub skipped_barrier_turns: u64,
    /// Turns leaving a via-way duplicate
    pub via_way_turns: u64,
    pub conditional_penalties: u64,
}

impl TurnStats {
    pub(crate) fn merge(&mut self, other: &TurnStats) {
        self.node_based_edges += other.node_based_edges;
        self.generated_turns += other.generated_turns;
        self.restricted_turns += other.restricted_turns;
        self.skipped_uturns += other.skipped_uturns;
        self.skipped_barrier_turns += other.skipped_barrier_turns;
        self.via_way_turns += other.via_way_turns;
        self.conditional_penalties += other.conditional_penalties;
    }
}

/// Everything the factory produces except the streamed turn index
#[derive(Debug, Clone, Default)]
pub struct EdgeBasedGraph {
    /// Ordinary turn vertices; duplicates are numbered from here on
    pub number_of_segments: u32,
    pub number_of_duplicates: u32,
    pub nodes: Vec<EdgeBasedNode>,
    pub node_weights: Vec<EdgeWeight>,
    pub geometry_info: Vec<GeometryInfo>,
    pub segments: Vec<EdgeBasedNodeSegment>,
    pub startpoints: Vec<bool>,
    pub nbg_to_ebg: Vec<NbgToEbg>,
    pub edges: Vec<EdgeBasedEdge>,
    pub turn_data: Vec<TurnData>,
    pub turn_weight_penalties: Vec<TurnPenalty>,
    pub turn_duration_penalties: Vec<TurnPenalty>,
    pub conditional_penalties: Vec<ConditionalTurnPenalty>,
    pub bearing_classes: Vec<BearingClass>,
    pub entry_classes: Vec<EntryClass>,
    /// Per node-based node, `INVALID_BEARING_CLASS_ID` where no turn starts
    pub bearing_class_ids: Vec<BearingClassId>,
    pub stats: TurnStats,
}

impl EdgeBasedGraph {
    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn number_of_edges(&self) -> usize {
        self.edges.len()
    }
}

pub struct EdgeBasedGraphFactory<'a> {
    network: NetworkInputs<'a>,
    config: FactoryConfig,
}

impl<'a> EdgeBasedGraphFactory<'a> {
    pub fn new(network: NetworkInputs<'a>, config: FactoryConfig) -> Self {
        Self { network, config }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Runs all stages. Turn index blocks are handed to `sink` in final
    /// turn order while the turns are generated.
    pub fn run(
        &self,
        restrictions: RestrictionInputs<'_>,
        analysis: &dyn TurnAnalysis,
        evaluator: &dyn TurnCostEvaluator,
        sink: &mut dyn TurnIndexSink,
    ) -> Result<EdgeBasedGraph> {
        self.config.validate()?;
        let started = Instant::now();
        let graph = self.network.graph;

        info!(
            nodes = graph.number_of_nodes(),
            edges = graph.number_of_edges(),
            "Generating edge-expanded graph"
        );

        let mut labels = labeling::label_segments(&self.network)?;
        let number_of_duplicates = restrictions.way.number_of_duplicated_nodes() as u32;
        info!(
            segments = labels.count,
            duplicates = number_of_duplicates,
            "Labelled turn vertices"
        );

        let expanded = nodes::generate_edge_expanded_nodes(&self.network, restrictions.way, &mut labels)?;
        info!(
            vertices = expanded.nodes.len(),
            segments = expanded.segments.len(),
            "Expanded turn vertices"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|i| format!("ebg-worker-{i}"))
            .build()?;

        let generated = turns::generate_edge_expanded_edges(
            &self.network,
            restrictions,
            analysis,
            evaluator,
            &labels,
            &self.config,
            &pool,
            sink,
        )?;

        let mut edges = generated.edges;
        pool.install(|| {
            edges
                .par_iter_mut()
                .enumerate()
                .for_each(|(turn_id, edge)| edge.turn_id = turn_id as EdgeId)
        });

        let conditional_penalties =
            conditionals::index_conditional_penalties(&edges, generated.conditionals)?;

        let mut stats = generated.stats;
        stats.generated_turns = edges.len() as u64;
        stats.conditional_penalties = conditional_penalties.len() as u64;

        info!(
            turns = edges.len(),
            restricted = stats.restricted_turns,
            uturns = stats.skipped_uturns,
            barriers = stats.skipped_barrier_turns,
            conditionals = stats.conditional_penalties,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generated edge-expanded graph"
        );

        Ok(EdgeBasedGraph {
            number_of_segments: labels.count,
            number_of_duplicates,
            nodes: expanded.nodes,
            node_weights: labels.weights,
            geometry_info: labels.geometry_info,
            segments: expanded.segments,
            startpoints: expanded.startpoints,
            nbg_to_ebg: expanded.nbg_to_ebg,
            edges,
            turn_data: generated.turn_data,
            turn_weight_penalties: generated.turn_weight_penalties,
            turn_duration_penalties: generated.turn_duration_penalties,
            conditional_penalties,
            bearing_classes: generated.bearing_classes,
            entry_classes: generated.entry_classes,
            bearing_class_ids: generated.bearing_class_ids,
            stats,
        })
    }
}

//! Structural properties of the expansion on generated networks

use butterfly_common::{Coordinate, EdgeId, NodeId, SPECIAL_NODE_ID};
use butterfly_ebg::ebg::{
    SigmoidTurnCost, TurnContext, TurnCost, TurnCostEvaluator, TurnPenaltyConfig,
};
use butterfly_ebg::error::PenaltyKind;
use butterfly_ebg::formats::TurnIndexBlock;
use butterfly_ebg::graph::{
    CompressedGeometry, CompressedNode, EdgeData, GeometryId, NodeAnnotation, NodeBasedEdge,
    NodeBasedGraph,
};
use butterfly_ebg::guidance::GeometricTurnAnalysis;
use butterfly_ebg::restrictions::{
    NodeRestriction, RestrictionMap, WayRestriction, WayRestrictionMap,
};
use butterfly_ebg::{
    EbgError, EdgeBasedGraph, EdgeBasedGraphFactory, FactoryConfig, NetworkData, NetworkInputs,
    NetworkSnapshot, RestrictionInputs, Road,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;

/// `size` x `size` street grid with random costs, one-ways, shape points
/// and restrictions
fn random_grid(seed: u64, size: u32) -> NetworkSnapshot {
    let mut rng = StdRng::seed_from_u64(seed);
    let id = |x: u32, y: u32| y * size + x;

    let mut coordinates: Vec<[f64; 2]> = (0..size * size)
        .map(|n| [f64::from(n % size) * 0.001, f64::from(n / size) * 0.001])
        .collect();

    let mut roads = Vec::new();
    let mut two_way = Vec::new();
    for y in 0..size {
        for x in 0..size {
            let mut neighbours = Vec::new();
            if x + 1 < size {
                neighbours.push(id(x + 1, y));
            }
            if y + 1 < size {
                neighbours.push(id(x, y + 1));
            }
            for to in neighbours {
                let from = id(x, y);
                if !rng.random_bool(0.85) {
                    continue;
                }
                let mut road = Road::new(from, to, rng.random_range(5..60))
                    .duration(rng.random_range(5..60));
                if rng.random_bool(0.15) {
                    road = road.oneway();
                }
                if rng.random_bool(0.2) {
                    // Shape point just off the midpoint
                    let [x0, y0] = coordinates[from as usize];
                    let [x1, y1] = coordinates[to as usize];
                    road = road.via(vec![coordinates.len() as NodeId]);
                    coordinates.push([(x0 + x1) / 2.0 + 0.0001, (y0 + y1) / 2.0 + 0.0001]);
                } else if road.backward {
                    two_way.push((from, to));
                }
                roads.push(road);
            }
        }
    }

    let adjacent = |node: NodeId| -> Vec<NodeId> {
        roads
            .iter()
            .filter_map(|r: &Road| {
                if r.from == node {
                    Some(r.to)
                } else if r.to == node {
                    Some(r.from)
                } else {
                    None
                }
            })
            .collect()
    };

    let mut node_restrictions = Vec::new();
    for _ in 0..size {
        let via = rng.random_range(0..size * size);
        let around = adjacent(via);
        if around.len() < 2 {
            continue;
        }
        let from = around[rng.random_range(0..around.len())];
        let to = around[rng.random_range(0..around.len())];
        if from == to {
            continue;
        }
        node_restrictions.push(NodeRestriction {
            from,
            via,
            to,
            is_only: rng.random_bool(0.3),
            condition: rng.random_bool(0.3).then(|| "Mo-Fr 07:00-09:00".to_string()),
        });
    }

    // Via ways must be drivable both ways and free of shape points
    let mut way_restrictions = Vec::new();
    for &(a, b) in two_way.iter().step_by(4) {
        let (via_from, via_to) = if rng.random_bool(0.5) { (a, b) } else { (b, a) };
        let before: Vec<NodeId> = adjacent(via_from).into_iter().filter(|&n| n != via_to).collect();
        let after: Vec<NodeId> = adjacent(via_to).into_iter().filter(|&n| n != via_from).collect();
        if before.is_empty() || after.is_empty() {
            continue;
        }
        way_restrictions.push(WayRestriction {
            from: before[rng.random_range(0..before.len())],
            via_from,
            via_to,
            to: after[rng.random_range(0..after.len())],
            is_only: rng.random_bool(0.5),
            condition: rng.random_bool(0.2).then(|| "Sa-Su".to_string()),
        });
    }

    NetworkSnapshot {
        coordinates,
        roads,
        traffic_lights: vec![id(1, 1)],
        barrier_nodes: vec![id(size - 1, 0)],
        node_restrictions,
        way_restrictions,
        ..NetworkSnapshot::default()
    }
}

fn expand_with(
    data: &NetworkData,
    config: FactoryConfig,
) -> (EdgeBasedGraph, Vec<TurnIndexBlock>) {
    let evaluator = SigmoidTurnCost::new(TurnPenaltyConfig::car());
    let mut turn_index = Vec::new();
    let graph = EdgeBasedGraphFactory::new(data.inputs(), config)
        .run(data.restrictions(), &data.analysis(), &evaluator, &mut turn_index)
        .expect("expansion should succeed");
    (graph, turn_index)
}

fn single_threaded(batch_size: u32) -> FactoryConfig {
    FactoryConfig {
        batch_size,
        threads: 1,
        turn_index_buffer: 7,
        ..FactoryConfig::default()
    }
}

#[test]
fn test_segment_labels_are_a_dense_injection() {
    for seed in 0..5 {
        let data = random_grid(seed, 6).build().unwrap();
        let (graph, _) = expand_with(&data, single_threaded(16));

        let drivable = (0..data.graph.number_of_edges())
            .filter(|&e: &EdgeId| !data.graph.edge_data(e).reversed)
            .count();
        assert_eq!(graph.number_of_segments as usize, drivable);

        let mut labels: Vec<NodeId> = graph
            .nbg_to_ebg
            .iter()
            .flat_map(|m| [m.forward_ebg_node, m.backward_ebg_node])
            .filter(|&id| id != SPECIAL_NODE_ID)
            .collect();
        labels.sort_unstable();
        assert_eq!(labels, (0..graph.number_of_segments).collect::<Vec<_>>());

        assert_eq!(
            graph.number_of_duplicates as usize,
            data.way_restrictions.number_of_duplicated_nodes()
        );
        assert_eq!(
            graph.number_of_nodes(),
            (graph.number_of_segments + graph.number_of_duplicates) as usize
        );
        assert_eq!(graph.node_weights.len(), graph.number_of_nodes());
        assert_eq!(graph.geometry_info.len(), graph.number_of_nodes());
        assert_eq!(graph.segments.len(), graph.startpoints.len());

        for (position, edge) in graph.edges.iter().enumerate() {
            assert_eq!(edge.turn_id as usize, position);
            assert!((edge.source as usize) < graph.number_of_nodes());
            assert!((edge.target as usize) < graph.number_of_nodes());
        }
        assert_eq!(graph.turn_data.len(), graph.number_of_edges());
        assert_eq!(graph.turn_weight_penalties.len(), graph.number_of_edges());
        assert_eq!(graph.turn_duration_penalties.len(), graph.number_of_edges());
        for penalty in &graph.conditional_penalties {
            assert!((penalty.turn_id as usize) < graph.number_of_edges());
        }
        println!(
            "✓ seed {}: {} vertices, {} turns",
            seed,
            graph.number_of_nodes(),
            graph.number_of_edges()
        );
    }
}

#[test]
fn test_duplicate_turns_follow_primary_block_sorted() {
    let data = random_grid(11, 7).build().unwrap();
    let (graph, _) = expand_with(&data, single_threaded(5));

    let from_duplicates = graph.stats.via_way_turns as usize;
    let split = graph.number_of_edges() - from_duplicates;
    let tail = &graph.edges[split..];
    assert!(tail.iter().all(|e| e.source >= graph.number_of_segments));
    assert!(tail.windows(2).all(|w| w[0].source <= w[1].source));
    assert!(graph.edges[..split]
        .iter()
        .all(|e| e.source < graph.number_of_segments));
}

#[test]
fn test_output_does_not_depend_on_batch_size() {
    let data = random_grid(3, 8).build().unwrap();
    let (reference, reference_index) = expand_with(&data, single_threaded(1000));

    for batch_size in [1, 3, 17] {
        let (graph, turn_index) = expand_with(&data, single_threaded(batch_size));
        assert_eq!(graph.edges, reference.edges);
        assert_eq!(graph.turn_data, reference.turn_data);
        assert_eq!(graph.turn_weight_penalties, reference.turn_weight_penalties);
        assert_eq!(graph.turn_duration_penalties, reference.turn_duration_penalties);
        assert_eq!(graph.conditional_penalties, reference.conditional_penalties);
        assert_eq!(graph.bearing_classes, reference.bearing_classes);
        assert_eq!(graph.entry_classes, reference.entry_classes);
        assert_eq!(graph.bearing_class_ids, reference.bearing_class_ids);
        assert_eq!(graph.stats, reference.stats);
        assert_eq!(turn_index, reference_index);
    }

    // Class ids may be issued in another order; the classes behind them may not
    let (parallel, parallel_index) = expand_with(
        &data,
        FactoryConfig {
            batch_size: 2,
            threads: 4,
            ..FactoryConfig::default()
        },
    );
    assert_eq!(parallel.edges, reference.edges);
    assert_eq!(parallel_index, reference_index);
    assert_eq!(parallel.turn_weight_penalties, reference.turn_weight_penalties);
    assert_eq!(parallel.conditional_penalties, reference.conditional_penalties);
    for (ours, theirs) in parallel.turn_data.iter().zip(&reference.turn_data) {
        assert_eq!(
            parallel.entry_classes[ours.entry_class_id as usize],
            reference.entry_classes[theirs.entry_class_id as usize]
        );
        assert_eq!(ours.instruction, theirs.instruction);
    }
    for (ours, theirs) in parallel
        .bearing_class_ids
        .iter()
        .zip(&reference.bearing_class_ids)
    {
        assert_eq!(
            parallel.bearing_classes.get(*ours as usize),
            reference.bearing_classes.get(*theirs as usize)
        );
    }
}

struct FixedCost(TurnCost);

impl TurnCostEvaluator for FixedCost {
    fn evaluate(&self, _turn: &TurnContext) -> TurnCost {
        self.0
    }
}

fn expand_fixed(data: &NetworkData, cost: TurnCost) -> butterfly_ebg::Result<EdgeBasedGraph> {
    let mut turn_index: Vec<TurnIndexBlock> = Vec::new();
    EdgeBasedGraphFactory::new(data.inputs(), single_threaded(4)).run(
        data.restrictions(),
        &data.analysis(),
        &FixedCost(cost),
        &mut turn_index,
    )
}

#[test]
fn test_out_of_range_penalties_fail_the_build() {
    let data = random_grid(5, 4).build().unwrap();

    // Truncation keeps 3276.75 s within the 16-bit range
    let graph = expand_fixed(
        &data,
        TurnCost {
            weight: 3276.75,
            duration: 3276.75,
        },
    )
    .unwrap();
    assert!(graph.turn_weight_penalties.iter().all(|&p| p == i16::MAX));

    let too_heavy = expand_fixed(
        &data,
        TurnCost {
            weight: 5000.0,
            duration: 1.0,
        },
    );
    assert!(matches!(
        too_heavy,
        Err(EbgError::PenaltyOutOfRange {
            kind: PenaltyKind::Weight,
            ..
        })
    ));

    let too_long = expand_fixed(
        &data,
        TurnCost {
            weight: 1.0,
            duration: -4000.0,
        },
    );
    assert!(matches!(
        too_long,
        Err(EbgError::PenaltyOutOfRange {
            kind: PenaltyKind::Duration,
            ..
        })
    ));

    let not_a_number = expand_fixed(
        &data,
        TurnCost {
            weight: f64::NAN,
            duration: 0.0,
        },
    );
    assert!(matches!(not_a_number, Err(EbgError::PenaltyOutOfRange { .. })));
}

#[test]
fn test_weight_overflow_fails_the_build() {
    let snapshot = NetworkSnapshot {
        coordinates: vec![[0.0, 0.0], [0.001, 0.0], [0.002, 0.0]],
        roads: vec![Road::new(0, 1, i32::MAX - 5), Road::new(1, 2, 10)],
        ..NetworkSnapshot::default()
    };
    let result = expand_fixed(
        &snapshot.build().unwrap(),
        TurnCost {
            weight: 1.0,
            duration: 0.0,
        },
    );
    assert!(matches!(
        result,
        Err(EbgError::WeightOverflow {
            kind: PenaltyKind::Weight,
            ..
        })
    ));
}

#[test]
fn test_missing_reverse_segment_is_fatal() {
    let data = EdgeData {
        weight: 10,
        duration: 10,
        geometry_id: GeometryId { id: 0, forward: true },
        annotation_id: 0,
        osm_way_id: 1,
        reversed: false,
        startpoint: true,
        restricted: false,
    };
    let graph = NodeBasedGraph::from_edges(
        2,
        vec![NodeBasedEdge {
            source: 0,
            target: 1,
            data,
        }],
    )
    .unwrap();
    let mut geometry = CompressedGeometry::new();
    geometry.insert(
        0,
        vec![CompressedNode {
            node_id: 1,
            weight: 10,
            duration: 10,
        }],
    );
    let annotations = [NodeAnnotation::default()];
    let coordinates = [
        Coordinate::from_degrees(0.0, 0.0),
        Coordinate::from_degrees(0.001, 0.0),
    ];
    let empty_nodes = FxHashSet::default();
    let empty_edges = FxHashSet::default();
    let network = NetworkInputs {
        graph: &graph,
        geometry: &geometry,
        annotations: &annotations,
        coordinates: &coordinates,
        osm_node_ids: &[10, 11],
        traffic_lights: &empty_nodes,
        segregated_edges: &empty_edges,
        uncompressed: None,
    };

    let no_restrictions = RestrictionMap::default();
    let no_way_restrictions = WayRestrictionMap::default();
    let analysis = GeometricTurnAnalysis::new(
        &graph,
        &geometry,
        &coordinates,
        &no_restrictions,
        &empty_nodes,
    );
    let mut turn_index: Vec<TurnIndexBlock> = Vec::new();
    let result = EdgeBasedGraphFactory::new(network, single_threaded(4)).run(
        RestrictionInputs {
            conditional: &no_restrictions,
            way: &no_way_restrictions,
        },
        &analysis,
        &SigmoidTurnCost::new(TurnPenaltyConfig::car()),
        &mut turn_index,
    );
    assert!(matches!(
        result,
        Err(EbgError::MissingSegment { from: 1, to: 0 })
    ));
}

//! JSON network snapshots
//!
//! A snapshot describes a small compressed network road by road, the way a
//! preceding extraction stage would hand it over. `build` turns it into the
//! graph, geometry and restriction tables the factory reads.

use anyhow::Context;
use butterfly_common::{
    AnnotationId, Coordinate, EdgeDuration, EdgeId, EdgeWeight, NodeId, OsmNodeId, OsmWayId,
};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::ebg::{NetworkInputs, RestrictionInputs};
use crate::error::{EbgError, Result};
use crate::graph::{
    CompressedGeometry, CompressedNode, EdgeData, GeometryId, NodeAnnotation, NodeBasedEdge,
    NodeBasedGraph, UncompressedSegments,
};
use crate::guidance::GeometricTurnAnalysis;
use crate::restrictions::{NodeRestriction, RestrictionMap, WayRestriction, WayRestrictionMap};

fn default_true() -> bool {
    true
}

/// One compressed road `from -> via... -> to`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub from: NodeId,
    pub to: NodeId,
    /// Shape points removed by compression
    #[serde(default)]
    pub via: Vec<NodeId>,
    pub weight: EdgeWeight,
    /// Defaults to the weight
    #[serde(default)]
    pub duration: Option<EdgeDuration>,
    #[serde(default = "default_true")]
    pub forward: bool,
    #[serde(default = "default_true")]
    pub backward: bool,
    #[serde(default)]
    pub annotation: AnnotationId,
    #[serde(default)]
    pub osm_way_id: OsmWayId,
    #[serde(default = "default_true")]
    pub startpoint: bool,
    #[serde(default)]
    pub restricted: bool,
}

impl Road {
    pub fn new(from: NodeId, to: NodeId, weight: EdgeWeight) -> Self {
        Self {
            from,
            to,
            via: Vec::new(),
            weight,
            duration: None,
            forward: true,
            backward: true,
            annotation: 0,
            osm_way_id: 0,
            startpoint: true,
            restricted: false,
        }
    }

    pub fn via(mut self, via: Vec<NodeId>) -> Self {
        self.via = via;
        self
    }

    pub fn duration(mut self, duration: EdgeDuration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Drivable from `from` to `to` only
    pub fn oneway(mut self) -> Self {
        self.backward = false;
        self
    }

    pub fn annotation(mut self, annotation: AnnotationId) -> Self {
        self.annotation = annotation;
        self
    }

    pub fn osm_way(mut self, id: OsmWayId) -> Self {
        self.osm_way_id = id;
        self
    }

    pub fn restricted(mut self) -> Self {
        self.restricted = true;
        self
    }

    /// Nodes along the road in driving direction.
    fn chain(&self, forward: bool) -> Vec<NodeId> {
        let mut chain = Vec::with_capacity(self.via.len() + 2);
        chain.push(self.from);
        chain.extend_from_slice(&self.via);
        chain.push(self.to);
        if !forward {
            chain.reverse();
        }
        chain
    }

    fn total_duration(&self) -> EdgeDuration {
        self.duration.unwrap_or(self.weight)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSnapshot {
    /// `[lon, lat]` in degrees, indexed by node id
    pub coordinates: Vec<[f64; 2]>,
    /// Empty means OSM ids equal node ids
    pub osm_node_ids: Vec<OsmNodeId>,
    /// Empty means one default annotation
    pub annotations: Vec<NodeAnnotation>,
    pub roads: Vec<Road>,
    pub barrier_nodes: Vec<NodeId>,
    pub traffic_lights: Vec<NodeId>,
    /// Directed `(from, to)` segments on dual carriageways
    pub segregated: Vec<(NodeId, NodeId)>,
    pub node_restrictions: Vec<NodeRestriction>,
    pub way_restrictions: Vec<WayRestriction>,
}

/// Tables built from a snapshot
#[derive(Debug, Clone)]
pub struct NetworkData {
    pub graph: NodeBasedGraph,
    pub geometry: CompressedGeometry,
    pub uncompressed: UncompressedSegments,
    pub annotations: Vec<NodeAnnotation>,
    pub coordinates: Vec<Coordinate>,
    pub osm_node_ids: Vec<OsmNodeId>,
    pub barrier_nodes: FxHashSet<NodeId>,
    pub traffic_lights: FxHashSet<NodeId>,
    pub segregated_edges: FxHashSet<EdgeId>,
    /// Unconditional node restrictions
    pub node_restrictions: RestrictionMap,
    pub conditional_restrictions: RestrictionMap,
    pub way_restrictions: WayRestrictionMap,
}

impl NetworkData {
    pub fn inputs(&self) -> NetworkInputs<'_> {
        NetworkInputs {
            graph: &self.graph,
            geometry: &self.geometry,
            annotations: &self.annotations,
            coordinates: &self.coordinates,
            osm_node_ids: &self.osm_node_ids,
            traffic_lights: &self.traffic_lights,
            segregated_edges: &self.segregated_edges,
            uncompressed: Some(&self.uncompressed),
        }
    }

    pub fn restrictions(&self) -> RestrictionInputs<'_> {
        RestrictionInputs {
            conditional: &self.conditional_restrictions,
            way: &self.way_restrictions,
        }
    }

    pub fn analysis(&self) -> GeometricTurnAnalysis<'_> {
        GeometricTurnAnalysis::new(
            &self.graph,
            &self.geometry,
            &self.coordinates,
            &self.node_restrictions,
            &self.barrier_nodes,
        )
    }
}

impl NetworkSnapshot {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
        let snapshot = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse {}", path.as_ref().display()))?;
        Ok(snapshot)
    }

    pub fn number_of_nodes(&self) -> u32 {
        self.coordinates.len() as u32
    }

    fn check_node(&self, node: NodeId, what: &str) -> Result<()> {
        if node < self.number_of_nodes() {
            Ok(())
        } else {
            Err(EbgError::InvalidGraph(format!(
                "{what} references node {node} but only {} nodes exist",
                self.number_of_nodes()
            )))
        }
    }

    fn validate(&self, annotations: usize) -> Result<()> {
        if !self.osm_node_ids.is_empty() && self.osm_node_ids.len() != self.coordinates.len() {
            return Err(EbgError::InvalidGraph(format!(
                "{} OSM node ids for {} coordinates",
                self.osm_node_ids.len(),
                self.coordinates.len()
            )));
        }

        for (i, road) in self.roads.iter().enumerate() {
            for &node in road.chain(true).iter() {
                self.check_node(node, &format!("road {i}"))?;
            }
            if !road.forward && !road.backward {
                return Err(EbgError::InvalidGraph(format!(
                    "road {i} ({} -> {}) cannot be driven in either direction",
                    road.from, road.to
                )));
            }
            if road.annotation as usize >= annotations {
                return Err(EbgError::InvalidGraph(format!(
                    "road {i} uses annotation {} but only {annotations} exist",
                    road.annotation
                )));
            }
            if road.weight < 0 || road.total_duration() < 0 {
                return Err(EbgError::InvalidGraph(format!("road {i} has a negative cost")));
            }
        }

        for &node in self.barrier_nodes.iter().chain(&self.traffic_lights) {
            self.check_node(node, "node attribute")?;
        }
        Ok(())
    }

    /// Builds the compressed graph and its side tables.
    pub fn build(&self) -> Result<NetworkData> {
        let annotations = if self.annotations.is_empty() {
            vec![NodeAnnotation::default()]
        } else {
            self.annotations.clone()
        };
        self.validate(annotations.len())?;

        let mut edges = Vec::with_capacity(self.roads.len() * 2);
        for (i, road) in self.roads.iter().enumerate() {
            for forward in [true, false] {
                let (source, target, reversed) = if forward {
                    (road.from, road.to, !road.forward)
                } else {
                    (road.to, road.from, !road.backward)
                };
                edges.push(NodeBasedEdge {
                    source,
                    target,
                    data: EdgeData {
                        weight: road.weight,
                        duration: road.total_duration(),
                        geometry_id: GeometryId {
                            id: i as u32,
                            forward,
                        },
                        annotation_id: road.annotation,
                        osm_way_id: road.osm_way_id,
                        reversed,
                        startpoint: road.startpoint,
                        restricted: road.restricted,
                    },
                });
            }
        }
        let graph = NodeBasedGraph::from_edges(self.number_of_nodes(), edges)?;

        let mut geometry = CompressedGeometry::new();
        let mut uncompressed = UncompressedSegments::default();
        for edge in 0..graph.number_of_edges() {
            let id = graph.edge_data(edge).geometry_id;
            let road = &self.roads[id.id as usize];
            let chain = road.chain(id.forward);
            geometry.insert(edge, compress_chain(&chain, road.weight, road.total_duration()));
            for pair in chain.windows(2) {
                uncompressed.insert((pair[0], pair[1]));
            }
        }

        let mut segregated_edges = FxHashSet::default();
        for &(from, to) in &self.segregated {
            let edge = graph.find_edge(from, to).ok_or_else(|| {
                EbgError::InvalidGraph(format!("segregated segment {from} -> {to} does not exist"))
            })?;
            segregated_edges.insert(edge);
        }

        for r in &self.node_restrictions {
            if [r.from, r.via, r.to].iter().any(|&n| n >= self.number_of_nodes()) {
                return Err(EbgError::InvalidRestriction(format!(
                    "{} -> {} -> {} references an unknown node",
                    r.from, r.via, r.to
                )));
            }
        }
        for r in &self.way_restrictions {
            if [r.from, r.via_from, r.via_to, r.to]
                .iter()
                .any(|&n| n >= self.number_of_nodes())
            {
                return Err(EbgError::InvalidRestriction(format!(
                    "{} -> {} -> {} -> {} references an unknown node",
                    r.from, r.via_from, r.via_to, r.to
                )));
            }
            if r.via_from == r.via_to {
                return Err(EbgError::InvalidRestriction(format!(
                    "via way of {} -> {} -> {} starts and ends at the same node",
                    r.from, r.via_from, r.to
                )));
            }
            if graph.find_edge(r.via_from, r.via_to).is_none() {
                return Err(EbgError::InvalidRestriction(format!(
                    "via way {} -> {} is not a segment of the graph",
                    r.via_from, r.via_to
                )));
            }
        }

        let osm_node_ids = if self.osm_node_ids.is_empty() {
            (0..self.number_of_nodes()).map(OsmNodeId::from).collect()
        } else {
            self.osm_node_ids.clone()
        };

        Ok(NetworkData {
            graph,
            geometry,
            uncompressed,
            annotations,
            coordinates: self
                .coordinates
                .iter()
                .map(|&[lon, lat]| Coordinate::from_degrees(lon, lat))
                .collect(),
            osm_node_ids,
            barrier_nodes: self.barrier_nodes.iter().copied().collect(),
            traffic_lights: self.traffic_lights.iter().copied().collect(),
            segregated_edges,
            node_restrictions: RestrictionMap::unconditional(&self.node_restrictions),
            conditional_restrictions: RestrictionMap::conditional(&self.node_restrictions),
            way_restrictions: WayRestrictionMap::new(self.way_restrictions.clone()),
        })
    }
}

/// Splits the road cost evenly over the chain; the last piece takes the
/// remainder.
fn compress_chain(chain: &[NodeId], weight: EdgeWeight, duration: EdgeDuration) -> Vec<CompressedNode> {
    let pieces = (chain.len() - 1) as i32;
    chain[1..]
        .iter()
        .enumerate()
        .map(|(i, &node_id)| {
            let last = i as i32 == pieces - 1;
            CompressedNode {
                node_id,
                weight: weight / pieces + if last { weight % pieces } else { 0 },
                duration: duration / pieces + if last { duration % pieces } else { 0 },
            }
        })
        .collect()
}

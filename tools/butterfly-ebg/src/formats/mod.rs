///! Binary table files written by the edge-based graph factory
///!
///! Every table shares the layout of [`records`]; `ebg.lock.json` records
///! their digests and counts.

pub mod classes;
pub mod conditionals;
pub mod ebg_edges;
pub mod ebg_nodes;
pub mod lock;
pub mod mapping;
pub mod records;
pub mod turn_data;

pub use conditionals::ConditionalTurnPenalty;
pub use ebg_edges::EdgeBasedEdge;
pub use ebg_nodes::{EdgeBasedNode, EdgeBasedNodeSegment, SegmentId};
pub use lock::{EbgLockFile, FileEntry, LOCK_FILE};
pub use mapping::{GeometryInfo, NbgToEbg};
pub use turn_data::{TurnData, TurnIndexBlock, TurnIndexSink, TurnIndexWriter};

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::ebg::EdgeBasedGraph;
use records::{read_records, write_records, Record};

pub const NODES_FILE: &str = "ebg.nodes";
pub const NODE_WEIGHTS_FILE: &str = "ebg.node_weights";
pub const GEOMETRY_INFO_FILE: &str = "ebg.geometry_info";
pub const SEGMENTS_FILE: &str = "ebg.segments";
pub const STARTPOINTS_FILE: &str = "ebg.startpoints";
pub const NBG_TO_EBG_FILE: &str = "ebg.cnbg_to_ebg";
pub const EDGES_FILE: &str = "ebg.edges";
pub const TURN_DATA_FILE: &str = "ebg.turn_data";
pub const TURN_WEIGHT_PENALTIES_FILE: &str = "ebg.turn_weight_penalties";
pub const TURN_DURATION_PENALTIES_FILE: &str = "ebg.turn_duration_penalties";
pub const TURN_INDEX_FILE: &str = "ebg.turn_index";
pub const CONDITIONALS_FILE: &str = "ebg.conditionals";
pub const BEARING_CLASSES_FILE: &str = "ebg.bearing_classes";
pub const ENTRY_CLASSES_FILE: &str = "ebg.entry_classes";
pub const BEARING_CLASS_IDS_FILE: &str = "ebg.bearing_class_ids";

const NODE_WEIGHTS_MAGIC: u32 = 0x4542574E; // "EBWN"
const STARTPOINTS_MAGIC: u32 = 0x45425350; // "EBSP"
const TURN_WEIGHT_PENALTIES_MAGIC: u32 = 0x45425057; // "EBPW"
const TURN_DURATION_PENALTIES_MAGIC: u32 = 0x45425044; // "EBPD"

/// Writes every table of `graph` into `outdir`; returns record counts by
/// file name. The turn index is streamed separately.
pub fn write_graph<P: AsRef<Path>>(outdir: P, graph: &EdgeBasedGraph) -> Result<BTreeMap<String, u64>> {
    let outdir = outdir.as_ref();
    std::fs::create_dir_all(outdir)?;
    let mut counts = BTreeMap::new();

    let mut table = |name: &str, written: usize| {
        debug!(file = name, records = written, "wrote table");
        counts.insert(name.to_string(), written as u64);
    };

    write_records(outdir.join(NODES_FILE), ebg_nodes::NODES_MAGIC, &graph.nodes)?;
    table(NODES_FILE, graph.nodes.len());
    write_records(outdir.join(NODE_WEIGHTS_FILE), NODE_WEIGHTS_MAGIC, &graph.node_weights)?;
    table(NODE_WEIGHTS_FILE, graph.node_weights.len());
    write_records(
        outdir.join(GEOMETRY_INFO_FILE),
        mapping::GEOMETRY_INFO_MAGIC,
        &graph.geometry_info,
    )?;
    table(GEOMETRY_INFO_FILE, graph.geometry_info.len());
    write_records(outdir.join(SEGMENTS_FILE), ebg_nodes::SEGMENTS_MAGIC, &graph.segments)?;
    table(SEGMENTS_FILE, graph.segments.len());
    write_records(outdir.join(STARTPOINTS_FILE), STARTPOINTS_MAGIC, &graph.startpoints)?;
    table(STARTPOINTS_FILE, graph.startpoints.len());
    write_records(outdir.join(NBG_TO_EBG_FILE), mapping::NBG_TO_EBG_MAGIC, &graph.nbg_to_ebg)?;
    table(NBG_TO_EBG_FILE, graph.nbg_to_ebg.len());
    write_records(outdir.join(EDGES_FILE), ebg_edges::MAGIC, &graph.edges)?;
    table(EDGES_FILE, graph.edges.len());
    write_records(outdir.join(TURN_DATA_FILE), turn_data::TURN_DATA_MAGIC, &graph.turn_data)?;
    table(TURN_DATA_FILE, graph.turn_data.len());
    write_records(
        outdir.join(TURN_WEIGHT_PENALTIES_FILE),
        TURN_WEIGHT_PENALTIES_MAGIC,
        &graph.turn_weight_penalties,
    )?;
    table(TURN_WEIGHT_PENALTIES_FILE, graph.turn_weight_penalties.len());
    write_records(
        outdir.join(TURN_DURATION_PENALTIES_FILE),
        TURN_DURATION_PENALTIES_MAGIC,
        &graph.turn_duration_penalties,
    )?;
    table(TURN_DURATION_PENALTIES_FILE, graph.turn_duration_penalties.len());
    write_records(
        outdir.join(CONDITIONALS_FILE),
        conditionals::MAGIC,
        &graph.conditional_penalties,
    )?;
    table(CONDITIONALS_FILE, graph.conditional_penalties.len());
    write_records(
        outdir.join(BEARING_CLASSES_FILE),
        classes::BEARING_CLASSES_MAGIC,
        &graph.bearing_classes,
    )?;
    table(BEARING_CLASSES_FILE, graph.bearing_classes.len());
    write_records(
        outdir.join(ENTRY_CLASSES_FILE),
        classes::ENTRY_CLASSES_MAGIC,
        &graph.entry_classes,
    )?;
    table(ENTRY_CLASSES_FILE, graph.entry_classes.len());
    write_records(
        outdir.join(BEARING_CLASS_IDS_FILE),
        classes::BEARING_CLASS_IDS_MAGIC,
        &graph.bearing_class_ids,
    )?;
    table(BEARING_CLASS_IDS_FILE, graph.bearing_class_ids.len());

    Ok(counts)
}

/// Digests every file in `counts` and writes `ebg.lock.json` next to them.
pub fn write_lock<P: AsRef<Path>>(
    outdir: P,
    graph: &EdgeBasedGraph,
    counts: BTreeMap<String, u64>,
    input_sha256: String,
    build_time_ms: u64,
) -> Result<EbgLockFile> {
    let outdir = outdir.as_ref();
    let mut files = BTreeMap::new();
    for (name, records) in counts {
        let sha256 = lock::compute_file_sha256(outdir.join(&name))?;
        files.insert(name, FileEntry { sha256, records });
    }

    let lock = EbgLockFile {
        input_sha256,
        files,
        number_of_segments: graph.number_of_segments,
        number_of_duplicates: graph.number_of_duplicates,
        number_of_nodes: graph.number_of_nodes() as u64,
        number_of_edges: graph.number_of_edges() as u64,
        stats: graph.stats.clone(),
        build_time_ms,
        created_at_utc: chrono::Utc::now().to_rfc3339(),
    };
    lock.write(outdir.join(LOCK_FILE))?;
    Ok(lock)
}

/// Writes a collected turn index in one go
pub fn write_turn_index<P: AsRef<Path>>(outdir: P, blocks: &[TurnIndexBlock]) -> Result<()> {
    write_records(
        outdir.as_ref().join(TURN_INDEX_FILE),
        turn_data::TURN_INDEX_MAGIC,
        blocks,
    )
}

pub fn read_turn_index<P: AsRef<Path>>(outdir: P) -> Result<Vec<TurnIndexBlock>> {
    read_records(outdir.as_ref().join(TURN_INDEX_FILE), turn_data::TURN_INDEX_MAGIC)
}

fn read_table<R: Record>(outdir: &Path, lock: &EbgLockFile, name: &str, magic: u32) -> Result<Vec<R>> {
    let records: Vec<R> = read_records(outdir.join(name), magic)?;
    if let Some(entry) = lock.files.get(name) {
        anyhow::ensure!(
            entry.records == records.len() as u64,
            "{} holds {} records, lock file expects {}",
            name,
            records.len(),
            entry.records
        );
    }
    Ok(records)
}

/// Loads a graph written by [`write_graph`] after checking the lock file
/// digests, record counts and CRCs.
pub fn read_graph<P: AsRef<Path>>(outdir: P) -> Result<EdgeBasedGraph> {
    let outdir = outdir.as_ref();
    let lock = EbgLockFile::read(outdir.join(LOCK_FILE))?;
    lock.verify_digests(outdir)?;

    let graph = EdgeBasedGraph {
        number_of_segments: lock.number_of_segments,
        number_of_duplicates: lock.number_of_duplicates,
        nodes: read_table(outdir, &lock, NODES_FILE, ebg_nodes::NODES_MAGIC)?,
        node_weights: read_table(outdir, &lock, NODE_WEIGHTS_FILE, NODE_WEIGHTS_MAGIC)?,
        geometry_info: read_table(outdir, &lock, GEOMETRY_INFO_FILE, mapping::GEOMETRY_INFO_MAGIC)?,
        segments: read_table(outdir, &lock, SEGMENTS_FILE, ebg_nodes::SEGMENTS_MAGIC)?,
        startpoints: read_table(outdir, &lock, STARTPOINTS_FILE, STARTPOINTS_MAGIC)?,
        nbg_to_ebg: read_table(outdir, &lock, NBG_TO_EBG_FILE, mapping::NBG_TO_EBG_MAGIC)?,
        edges: read_table(outdir, &lock, EDGES_FILE, ebg_edges::MAGIC)?,
        turn_data: read_table(outdir, &lock, TURN_DATA_FILE, turn_data::TURN_DATA_MAGIC)?,
        turn_weight_penalties: read_table(
            outdir,
            &lock,
            TURN_WEIGHT_PENALTIES_FILE,
            TURN_WEIGHT_PENALTIES_MAGIC,
        )?,
        turn_duration_penalties: read_table(
            outdir,
            &lock,
            TURN_DURATION_PENALTIES_FILE,
            TURN_DURATION_PENALTIES_MAGIC,
        )?,
        conditional_penalties: read_table(outdir, &lock, CONDITIONALS_FILE, conditionals::MAGIC)?,
        bearing_classes: read_table(
            outdir,
            &lock,
            BEARING_CLASSES_FILE,
            classes::BEARING_CLASSES_MAGIC,
        )?,
        entry_classes: read_table(outdir, &lock, ENTRY_CLASSES_FILE, classes::ENTRY_CLASSES_MAGIC)?,
        bearing_class_ids: read_table(
            outdir,
            &lock,
            BEARING_CLASS_IDS_FILE,
            classes::BEARING_CLASS_IDS_MAGIC,
        )?,
        stats: lock.stats.clone(),
    };

    anyhow::ensure!(
        graph.nodes.len() as u64 == lock.number_of_nodes,
        "{} turn vertices on disk, lock file expects {}",
        graph.nodes.len(),
        lock.number_of_nodes
    );
    anyhow::ensure!(
        graph.edges.len() as u64 == lock.number_of_edges,
        "{} turn edges on disk, lock file expects {}",
        graph.edges.len(),
        lock.number_of_edges
    );

    Ok(graph)
}

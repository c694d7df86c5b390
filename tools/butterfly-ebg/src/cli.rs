///! CLI commands for butterfly-ebg

use anyhow::{Context, Result};
use butterfly_common::IoConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::ebg::{
    EdgeBasedGraphFactory, FactoryConfig, SigmoidTurnCost, TurnPenaltyConfig,
};
use crate::formats::{self, lock::compute_file_sha256, TurnIndexWriter, LOCK_FILE, TURN_INDEX_FILE};
use crate::snapshot::NetworkSnapshot;
use crate::trace::initialize_tracer;

#[derive(Parser)]
#[command(name = "butterfly-ebg")]
#[command(about = "Turn-expanded routing graph construction", long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    Car,
    Bike,
    Foot,
}

impl Profile {
    pub fn turn_penalties(self) -> TurnPenaltyConfig {
        match self {
            Profile::Car => TurnPenaltyConfig::car(),
            Profile::Bike => TurnPenaltyConfig::bike(),
            Profile::Foot => TurnPenaltyConfig::foot(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the edge-based graph from a network snapshot
    Build {
        /// Network snapshot (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for ebg.* tables and ebg.lock.json
        #[arg(short, long)]
        outdir: PathBuf,

        /// Worker threads (0 = one per core)
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Intersections per turn generation batch
        #[arg(long, default_value = "100")]
        batch_size: u32,

        /// Turn index records buffered before each write
        #[arg(long, default_value = "1000")]
        turn_index_buffer: usize,

        /// Turn cost profile
        #[arg(long, value_enum, default_value = "car")]
        profile: Profile,

        /// Scale from penalty seconds to weight units
        #[arg(long, default_value = "10.0")]
        weight_multiplier: f64,
    },

    /// Check the tables of a previous build against its lock file
    Verify {
        /// Directory holding ebg.* tables and ebg.lock.json
        #[arg(short, long)]
        outdir: PathBuf,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        initialize_tracer(self.log_json);

        match self.command {
            Commands::Build {
                input,
                outdir,
                threads,
                batch_size,
                turn_index_buffer,
                profile,
                weight_multiplier,
            } => {
                let config = FactoryConfig {
                    batch_size,
                    turn_index_buffer,
                    threads,
                    weight_multiplier,
                };
                build(&input, &outdir, config, profile)
            }
            Commands::Verify { outdir } => verify(&outdir),
        }
    }
}

fn build(input: &Path, outdir: &Path, config: FactoryConfig, profile: Profile) -> Result<()> {
    let start_time = Instant::now();

    let file_name = input
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} is not a file path", input.display()))?;
    let base = input.parent().unwrap_or_else(|| Path::new("."));
    IoConfig::new(base, &[file_name]).validate()?;

    println!("🦋 Starting edge-based graph construction");
    println!("📂 Input: {}", input.display());
    println!("📂 Output: {}", outdir.display());
    println!("🚗 Profile: {:?}", profile);
    println!();

    println!("Loading network snapshot...");
    let snapshot = NetworkSnapshot::from_json_file(input)?;
    let network = snapshot.build()?;
    println!(
        "  ✓ Network loaded: {} nodes, {} edges",
        network.graph.number_of_nodes(),
        network.graph.number_of_edges()
    );

    std::fs::create_dir_all(outdir)
        .with_context(|| format!("Failed to create {}", outdir.display()))?;

    println!("Expanding turns...");
    let evaluator = SigmoidTurnCost::new(profile.turn_penalties());
    let analysis = network.analysis();
    let mut turn_index = TurnIndexWriter::create(outdir.join(TURN_INDEX_FILE))?;
    let factory = EdgeBasedGraphFactory::new(network.inputs(), config);
    let graph = factory.run(network.restrictions(), &analysis, &evaluator, &mut turn_index)?;
    let turn_index_records = turn_index.finish()?;
    println!(
        "  ✓ {} turn vertices ({} duplicated), {} turns",
        graph.number_of_nodes(),
        graph.number_of_duplicates,
        graph.number_of_edges()
    );
    println!(
        "  ✓ {} restricted, {} u-turns and {} barrier turns skipped",
        graph.stats.restricted_turns, graph.stats.skipped_uturns, graph.stats.skipped_barrier_turns
    );

    println!();
    println!("Writing output files...");
    let mut counts = formats::write_graph(outdir, &graph)?;
    counts.insert(TURN_INDEX_FILE.to_string(), turn_index_records);

    let lock = formats::write_lock(
        outdir,
        &graph,
        counts,
        compute_file_sha256(input)?,
        start_time.elapsed().as_millis() as u64,
    )?;
    for (name, entry) in &lock.files {
        println!("  ✓ Wrote {} ({} records)", name, entry.records);
    }
    let lock_path = outdir.join(LOCK_FILE);

    println!();
    println!("✅ Edge-based graph complete!");
    println!("  Nodes: {}", graph.number_of_nodes());
    println!("  Turns: {}", graph.number_of_edges());
    println!("  Conditional penalties: {}", graph.conditional_penalties.len());
    println!("  Time: {:.2}s", start_time.elapsed().as_secs_f64());
    println!("📋 Lock file: {}", lock_path.display());
    Ok(())
}

fn verify(outdir: &Path) -> Result<()> {
    println!("🔍 Verifying {}", outdir.display());

    let graph = formats::read_graph(outdir)?;
    println!(
        "  ✓ Tables match lock file: {} nodes, {} turns",
        graph.number_of_nodes(),
        graph.number_of_edges()
    );

    let turn_index = formats::read_turn_index(outdir)?;
    anyhow::ensure!(
        turn_index.len() == graph.number_of_edges(),
        "{} turn index records for {} turns",
        turn_index.len(),
        graph.number_of_edges()
    );
    println!("  ✓ Turn index covers every turn");

    for (position, edge) in graph.edges.iter().enumerate() {
        anyhow::ensure!(
            edge.turn_id as usize == position,
            "turn at position {} carries id {}",
            position,
            edge.turn_id
        );
    }
    println!("  ✓ Turn ids are dense");

    println!();
    println!("✅ Verification passed!");
    Ok(())
}

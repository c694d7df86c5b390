//! Turn-expanded (edge-based) routing graph construction
//!
//! Every drivable direction of a compressed road becomes a vertex, every
//! allowed turn between two of them an edge weighted with the source
//! segment plus the turn penalty.

pub mod cli;
pub mod ebg;
pub mod error;
pub mod formats;
pub mod graph;
pub mod guidance;
pub mod restrictions;
pub mod snapshot;
pub mod trace;

pub use ebg::{
    EdgeBasedGraph, EdgeBasedGraphFactory, FactoryConfig, NetworkInputs, RestrictionInputs,
    TurnStats,
};
pub use error::{EbgError, Result};
pub use snapshot::{NetworkData, NetworkSnapshot, Road};

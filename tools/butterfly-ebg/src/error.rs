//! Fatal error kinds of the turn expansion
//!
//! Every failure aborts the whole construction. There is no partial output.

use butterfly_common::{EdgeId, NodeId};
use std::fmt;
use thiserror::Error;

/// Which scaled penalty overflowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyKind {
    Weight,
    Duration,
}

impl fmt::Display for PenaltyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PenaltyKind::Weight => write!(f, "weight"),
            PenaltyKind::Duration => write!(f, "duration"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EbgError {
    #[error("required segment {from} -> {to} is missing from the node-based graph")]
    MissingSegment { from: NodeId, to: NodeId },

    #[error("no compressed geometry for edge {edge}")]
    MissingGeometry { edge: EdgeId },

    #[error(
        "geometry of {u} <-> {v} differs by direction ({forward} forward vs {reverse} reverse points)"
    )]
    MismatchedGeometry {
        u: NodeId,
        v: NodeId,
        forward: usize,
        reverse: usize,
    },

    #[error("node {node} has no {table} entry")]
    UnknownNode { node: NodeId, table: &'static str },

    #[error(
        "{kind} penalty {value} at intersection {intersection} is outside the 16-bit turn penalty range"
    )]
    PenaltyOutOfRange {
        kind: PenaltyKind,
        value: f64,
        intersection: NodeId,
    },

    #[error("{kind} of turn at intersection {intersection} overflows a 32-bit edge weight")]
    WeightOverflow {
        kind: PenaltyKind,
        intersection: NodeId,
    },

    #[error("conditional restriction {from} -> {to} matches no generated turn")]
    UnresolvedConditional { from: NodeId, to: NodeId },

    #[error(
        "expected {expected} turn vertices ({segments} segments + {duplicates} duplicates), built {actual}"
    )]
    DuplicateCountMismatch {
        expected: usize,
        actual: usize,
        segments: usize,
        duplicates: usize,
    },

    #[error("turn analysis at intersection {intersection} has no road for edge {edge}")]
    MissingRoad { intersection: NodeId, edge: EdgeId },

    #[error("invalid node-based graph: {0}")]
    InvalidGraph(String),

    #[error("invalid restriction: {0}")]
    InvalidRestriction(String),

    #[error("invalid factory configuration: {0}")]
    InvalidConfig(String),

    #[error("turn analysis of batch {batch} panicked")]
    WorkerPanicked { batch: u64 },

    #[error("failed to build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to write turn index records")]
    Sink(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EbgError>;

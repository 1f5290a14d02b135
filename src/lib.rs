//! Core graph-matching engine for binary diffing.
//!
//! Given the call graphs of two programs and a dense node-to-node similarity
//! matrix, this crate produces an approximate maximum-score one-to-one
//! mapping between nodes. Scores reward per-node similarity and preserved
//! edges ("squares") between matched pairs, i.e. this is a solver for the
//! Network Alignment Quadratic Problem (NAQP).
//!
//! The crate is organised around the pipeline described in the design
//! document: a dense similarity matrix is [`sparse::sparsify`]-ed into a
//! sparse candidate graph, [`squares`] enumerates the structural-preservation
//! interactions between candidate edges, [`solver`] runs max-product belief
//! propagation to find a partial mapping, and [`refine`] completes it with a
//! linear-assignment pass. [`matcher`] sequences the whole pipeline.
//!
//! Binary loading, disassembly, feature extraction and output formatting are
//! deliberately out of scope: this crate only implements the matching core.

pub mod adjacency;
pub mod config;
pub mod errors;
pub mod lapjv;
pub mod matcher;
pub mod refine;
pub mod solver;
pub mod sparse;
pub mod squares;

/// Convenience re-exports of the crate's most commonly used types.
pub mod prelude {
    pub use crate::adjacency::Adjacency;
    pub use crate::config::{NaqpConfig, SolverConfig, SparsifyConfig};
    pub use crate::errors::MatchError;
    pub use crate::matcher::{MatchReport, Matcher};
    pub use crate::solver::{Converged, IterationReport, RawMapping};
    pub use crate::sparse::Csr;
}

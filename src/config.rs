//! Configuration structs grouping the numeric knobs of each pipeline stage.
//!
//! Mirrors the way the wider graph-algorithms pack groups related tunables
//! into one `Config` struct with a `Default` impl (e.g. Louvain's
//! resolution/threshold/levels/seed) rather than threading five loose
//! arguments through every call.

/// Configuration for the sparsifier (C2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparsifyConfig {
    /// Ratio of least-probable matches to discard, in `[0, 1]`.
    ///
    /// `0` keeps every non-zero entry, `1` keeps only the row-wise maxima.
    pub sparsity_ratio: f64,
    /// When `true`, apply the ratio independently to each row instead of to
    /// the flattened matrix as a whole.
    pub sparse_row: bool,
}

impl Default for SparsifyConfig {
    fn default() -> Self {
        Self { sparsity_ratio: 0.75, sparse_row: false }
    }
}

/// Configuration for the belief-propagation solver (C4/C5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Interpolates between pure similarity (`1.0`) and structure-only
    /// matching (`0.0`). `1.0` selects the pure MWM solver; any other value
    /// selects NAQP with `alpha = 1 - tradeoff`, `beta = tradeoff`.
    pub tradeoff: f64,
    /// Amplitude of the per-iteration tie-breaking perturbation.
    pub epsilon: f64,
    /// Hard cap on the number of belief-propagation iterations.
    pub maxiter: usize,
    /// Seed for the perturbation RNG, so runs are bit-reproducible.
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { tradeoff: 0.75, epsilon: 0.5, maxiter: 1000, seed: 42 }
    }
}

/// Top-level configuration bundling sparsification and solving knobs, plus
/// whether to build the squares-interaction matrix at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NaqpConfig {
    /// Sparsifier configuration.
    pub sparsify: SparsifyConfig,
    /// Solver configuration.
    pub solver: SolverConfig,
    /// Whether to enumerate squares during `process()`. Skipping this is
    /// only sound when `solver.tradeoff == 1.0` (pure MWM never consults
    /// `Q`).
    pub compute_squares: bool,
}

impl Default for NaqpConfig {
    fn default() -> Self {
        Self {
            sparsify: SparsifyConfig::default(),
            solver: SolverConfig::default(),
            compute_squares: true,
        }
    }
}

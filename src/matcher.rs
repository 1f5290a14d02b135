//! Matcher Orchestrator (C7): sequences sparsification, squares enumeration,
//! belief-propagation solving and refinement, and reports diagnostics over
//! the completed mapping.

use tracing::info;

use crate::adjacency::Adjacency;
use crate::config::{NaqpConfig, SolverConfig, SparsifyConfig};
use crate::errors::{MatchError, Side};
use crate::refine::refine;
use crate::solver::{extract_raw_mapping, Converged, MwmSolver, NaqpSolver, RawMapping, Solver, SolverIter};
use crate::sparse::{sparsify, Csr, DenseMatrix};
use crate::squares::{count_squares_matched, enumerate_squares};

/// Per-match and aggregate diagnostics over a completed mapping: per-match
/// similarity and squares count, plus total coverage statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchReport {
    /// Original similarity score of each match, in mapping order.
    pub similarities: Vec<f64>,
    /// Number of squares each match's candidate edge forms with another
    /// matched candidate edge (`0` for matches the refiner added outside
    /// `W`'s candidate pattern).
    pub squares_per_match: Vec<usize>,
    /// Total number of distinct squares with both endpoints matched.
    pub total_squares_matched: usize,
    /// Number of matched pairs.
    pub matched_nodes: usize,
    /// Number of primary (row) nodes.
    pub primary_nodes: usize,
    /// Number of secondary (column) nodes.
    pub secondary_nodes: usize,
    /// Fraction of primary nodes matched.
    pub primary_node_coverage: f64,
    /// Fraction of secondary nodes matched.
    pub secondary_node_coverage: f64,
}

impl MatchReport {
    fn build(
        mapping: &RawMapping,
        similarity: &DenseMatrix,
        w: &Csr,
        q: Option<&Csr>,
    ) -> Self {
        let similarities: Vec<f64> =
            mapping.idx.iter().zip(&mapping.idy).map(|(&r, &c)| similarity.get(r, c)).collect();

        let mates = q.map(|_| mates_from_mapping(w, mapping));

        let squares_per_match: Vec<usize> = mapping
            .idx
            .iter()
            .zip(&mapping.idy)
            .map(|(&r, &c)| {
                q.zip(mates.as_ref()).map_or(0, |(q, mates)| squares_touching(w, q, mates, r, c))
            })
            .collect();

        let total_squares_matched =
            q.zip(mates.as_ref()).map_or(0, |(q, mates)| count_squares_matched(q, mates));

        let primary_nodes = similarity.num_rows();
        let secondary_nodes = similarity.num_cols();
        Self {
            similarities,
            squares_per_match,
            total_squares_matched,
            matched_nodes: mapping.len(),
            primary_nodes,
            secondary_nodes,
            primary_node_coverage: mapping.len() as f64 / primary_nodes.max(1) as f64,
            secondary_node_coverage: mapping.len() as f64 / secondary_nodes.max(1) as f64,
        }
    }
}

/// Number of squares the candidate edge `(row, col)` forms with another
/// *matched* candidate edge, or `0` if `(row, col)` is not one of `W`'s
/// candidate edges. Mirrors the original's per-match square count, which
/// counts only squares realized in the final mapping, not every square `Q`
/// makes available as a candidate.
fn squares_touching(w: &Csr, q: &Csr, mates: &[bool], row: usize, col: usize) -> usize {
    w.row_cols(row).iter().position(|&c| c == col).map_or(0, |offset| {
        let edge = w.row_range(row).start + offset;
        q.row_cols(edge).iter().filter(|&&e2| mates[e2]).count()
    })
}

/// Builds a `W`-indexed match-flag vector from a completed mapping, for
/// feeding back into [`count_squares_matched`]. Pairs the refiner added
/// outside `W`'s pattern simply have no corresponding flag to set.
fn mates_from_mapping(w: &Csr, mapping: &RawMapping) -> Vec<bool> {
    let mut mates = vec![false; w.nnz()];
    for (&row, &col) in mapping.idx.iter().zip(&mapping.idy) {
        if let Some(offset) = w.row_cols(row).iter().position(|&c| c == col) {
            mates[w.row_range(row).start + offset] = true;
        }
    }
    mates
}

/// Sequences the full matching pipeline over a dense similarity matrix and
/// the two call-graph adjacencies it was computed from.
pub struct Matcher<'a> {
    similarity: &'a DenseMatrix,
    primary_adj: &'a Adjacency,
    secondary_adj: &'a Adjacency,
    w: Option<Csr>,
    q: Option<Csr>,
    mapping: Option<RawMapping>,
    report: Option<MatchReport>,
}

impl<'a> Matcher<'a> {
    /// Builds a matcher over `similarity` and its two source adjacencies.
    /// Build `similarity` itself via [`DenseMatrix::try_from_row_major`] to
    /// reject a malformed buffer before it ever reaches here.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::DimensionMismatch`] if `similarity`'s shape
    /// disagrees with either adjacency's node count.
    pub fn new(
        similarity: &'a DenseMatrix,
        primary_adj: &'a Adjacency,
        secondary_adj: &'a Adjacency,
    ) -> Result<Self, MatchError> {
        if similarity.num_rows() != primary_adj.len() || similarity.num_cols() != secondary_adj.len() {
            return Err(MatchError::DimensionMismatch {
                sim_rows: similarity.num_rows(),
                sim_cols: similarity.num_cols(),
                primary: primary_adj.len(),
                secondary: secondary_adj.len(),
            });
        }
        Ok(Self { similarity, primary_adj, secondary_adj, w: None, q: None, mapping: None, report: None })
    }

    /// Builds the sparse candidate graph `W` and, if requested, the squares
    /// interaction matrix `Q`.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::IncompleteBipartite`] if sparsification leaves
    /// a row or column with no candidate edges.
    pub fn process(&mut self, cfg: &SparsifyConfig, compute_squares: bool) -> Result<(), MatchError> {
        let w = sparsify(self.similarity, cfg)?;
        if let Some(row) = w.first_isolated_row() {
            return Err(MatchError::IncompleteBipartite { side: Side::Primary, index: row });
        }
        if let Some(col) = w.first_isolated_col() {
            return Err(MatchError::IncompleteBipartite { side: Side::Secondary, index: col });
        }

        let q = compute_squares.then(|| enumerate_squares(&w, self.primary_adj, self.secondary_adj));
        info!(nnz = w.nnz(), squares = q.as_ref().map(Csr::nnz), "candidate graph ready");
        self.w = Some(w);
        self.q = q;
        Ok(())
    }

    /// Builds the belief-propagation solver selected by `cfg.tradeoff` and
    /// returns the caller-driven iterator. [`Matcher::process`] must have
    /// run first.
    ///
    /// # Panics
    ///
    /// Panics if called before [`Matcher::process`], or if `cfg.tradeoff <
    /// 1.0` but `process` was run with `compute_squares = false`.
    #[must_use]
    pub fn compute(&self, cfg: &SolverConfig) -> SolverIter {
        let w = self.w.clone().expect("process must run before compute");
        let solver = if cfg.tradeoff >= 1.0 {
            Solver::Mwm(MwmSolver::new(w, cfg.epsilon, cfg.seed))
        } else {
            let q = self.q.clone().expect("compute_squares must be enabled for tradeoff < 1.0");
            let alpha = 1.0 - cfg.tradeoff;
            let beta = cfg.tradeoff;
            Solver::Naqp(NaqpSolver::new(w, q, alpha, beta, cfg.epsilon, cfg.seed))
        };
        SolverIter::new(solver, cfg.maxiter)
    }

    /// Drives a solver iterator to completion, refines its raw mapping into
    /// a complete one, and records the mapping and diagnostics report.
    ///
    /// On [`Converged::Yes`] the final step already sits at the detected
    /// cycle's best point, so its live mates/marginals are used directly. On
    /// [`Converged::No`] the run stopped mid-oscillation, so the mates and
    /// marginals from whichever step produced the highest objective seen are
    /// used instead, per [`SolverIter::best_objective_iteration`].
    ///
    /// # Errors
    ///
    /// Propagates [`MatchError::LAPInfeasible`] from the refinement pass.
    pub fn finish(&mut self, mut iter: SolverIter) -> Result<Converged, MatchError> {
        while iter.step().is_some() {}
        let converged = iter.converged().expect("loop above only exits once the run has finished");

        let w = self.w.as_ref().expect("process must run before finish");
        let (mates, marginals) = match converged {
            Converged::Yes => (iter.solver().mates(), iter.solver().marginals()),
            Converged::No => (iter.best_mates(), iter.best_marginals()),
        };
        let score_matrix = w.with_data(marginals.to_vec());
        let raw_mapping = extract_raw_mapping(w, mates);
        let completed = refine(&score_matrix, &raw_mapping)?;

        self.report = Some(MatchReport::build(&completed, self.similarity, w, self.q.as_ref()));
        info!(matched = completed.len(), converged = ?converged, "matching completed");
        self.mapping = Some(completed);
        Ok(converged)
    }

    /// Runs `process`, `compute` and `finish` back to back, for callers who
    /// do not need to observe per-iteration progress.
    ///
    /// # Errors
    ///
    /// See [`Matcher::process`] and [`Matcher::finish`].
    pub fn run(&mut self, cfg: &NaqpConfig) -> Result<Converged, MatchError> {
        self.process(&cfg.sparsify, cfg.compute_squares)?;
        let iter = self.compute(&cfg.solver);
        self.finish(iter)
    }

    /// The completed mapping, once [`Matcher::finish`] or [`Matcher::run`]
    /// has run.
    #[must_use]
    pub fn mapping(&self) -> Option<&RawMapping> {
        self.mapping.as_ref()
    }

    /// Per-match diagnostics over the completed mapping, once
    /// [`Matcher::finish`] or [`Matcher::run`] has run.
    #[must_use]
    pub fn report(&self) -> Option<&MatchReport> {
        self.report.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_diagonal_similarity_matches_identity() {
        let dense = DenseMatrix::from_row_major(vec![0.9, 0.1, 0.2, 0.8], 2, 2);
        let primary = Adjacency::from_edges(2, []);
        let secondary = Adjacency::from_edges(2, []);
        let mut matcher = Matcher::new(&dense, &primary, &secondary).unwrap();

        let cfg = NaqpConfig {
            sparsify: SparsifyConfig { sparsity_ratio: 0.0, sparse_row: false },
            solver: SolverConfig { tradeoff: 1.0, epsilon: 0.0, maxiter: 100, seed: 1 },
            compute_squares: false,
        };
        matcher.run(&cfg).unwrap();

        let mapping = matcher.mapping().unwrap();
        let mut pairs: Vec<(usize, usize)> =
            mapping.idx.iter().copied().zip(mapping.idy.iter().copied()).collect();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(0, 0), (1, 1)]);

        let report = matcher.report().unwrap();
        assert_eq!(report.matched_nodes, 2);
        assert!((report.primary_node_coverage - 1.0).abs() < 1e-9);
    }

    #[test]
    fn isolated_row_is_reported_as_incomplete_bipartite() {
        let dense = DenseMatrix::from_row_major(vec![0.0, 0.0, 0.2, 0.8], 2, 2);
        let primary = Adjacency::from_edges(2, []);
        let secondary = Adjacency::from_edges(2, []);
        let mut matcher = Matcher::new(&dense, &primary, &secondary).unwrap();
        let err = matcher.process(&SparsifyConfig { sparsity_ratio: 0.0, sparse_row: false }, false).unwrap_err();
        assert_eq!(err, MatchError::IncompleteBipartite { side: Side::Primary, index: 0 });
    }

    #[test]
    fn mismatched_adjacency_shape_is_rejected_at_construction() {
        let dense = DenseMatrix::from_row_major(vec![0.5, 0.5], 1, 2);
        let primary = Adjacency::from_edges(2, []);
        let secondary = Adjacency::from_edges(2, []);
        assert!(Matcher::new(&dense, &primary, &secondary).is_err());
    }

    /// A run stopped well short of the cycle detector's window must still
    /// produce a valid, complete mapping by falling back to the
    /// best-objective iteration rather than panicking or returning garbage.
    #[test]
    fn non_convergent_run_still_produces_a_complete_mapping() {
        let dense = DenseMatrix::from_row_major(vec![0.6, 0.5, 0.5, 0.6], 2, 2);
        let primary = Adjacency::from_edges(2, []);
        let secondary = Adjacency::from_edges(2, []);
        let mut matcher = Matcher::new(&dense, &primary, &secondary).unwrap();

        matcher.process(&SparsifyConfig { sparsity_ratio: 0.0, sparse_row: false }, false).unwrap();
        let cfg = SolverConfig { tradeoff: 1.0, epsilon: 0.4, maxiter: 3, seed: 7 };
        let iter = matcher.compute(&cfg);
        let converged = matcher.finish(iter).unwrap();

        assert_eq!(converged, Converged::No);
        let mapping = matcher.mapping().unwrap();
        assert_eq!(mapping.len(), 2);
    }

    /// `squares_per_match` must count only squares realized between two
    /// *matched* candidate edges, not every square `Q` makes available as a
    /// candidate -- each endpoint of the one preserved edge here should see
    /// exactly one square, matching `total_squares_matched`.
    #[test]
    fn squares_per_match_counts_only_realized_squares() {
        let dense = DenseMatrix::from_row_major(vec![0.9, 0.0, 0.0, 0.9], 2, 2);
        let primary = Adjacency::from_edges(2, [(0, 1)]);
        let secondary = Adjacency::from_edges(2, [(0, 1)]);
        let mut matcher = Matcher::new(&dense, &primary, &secondary).unwrap();

        let cfg = NaqpConfig {
            sparsify: SparsifyConfig { sparsity_ratio: 0.0, sparse_row: false },
            solver: SolverConfig { tradeoff: 0.5, epsilon: 0.0, maxiter: 100, seed: 1 },
            compute_squares: true,
        };
        matcher.run(&cfg).unwrap();

        let mapping = matcher.mapping().unwrap().clone();
        let report = matcher.report().unwrap();
        assert_eq!(report.total_squares_matched, 1);
        assert_eq!(report.squares_per_match.len(), mapping.len());
        assert_eq!(report.squares_per_match.iter().sum::<usize>(), 2 * report.total_squares_matched);
    }
}

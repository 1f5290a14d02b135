//! Belief-propagation solvers (C4/C5) and the shared `step()`-driven
//! iteration protocol that runs them to a limit cycle.

mod convergence;
mod mwm;
mod naqp;

pub use mwm::MwmSolver;
pub use naqp::NaqpSolver;

use crate::sparse::Csr;
use convergence::ConvergenceDetector;

/// A partial or complete assignment between rows and columns: `idx[k]` is
/// matched to `idy[k]`. Indices within each array are unique; the two
/// arrays have equal length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMapping {
    /// Primary (row) index of each match.
    pub idx: Vec<usize>,
    /// Secondary (column) index of each match, `idy[k]` paired with `idx[k]`.
    pub idy: Vec<usize>,
}

impl RawMapping {
    /// Number of matched pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.idx.len()
    }

    /// Whether no pairs are matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }
}

/// The outcome of a solver run: whether the objective sequence settled into
/// a genuine limit cycle before `maxiter` was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converged {
    /// A short limit cycle was detected; the returned mapping sits at the
    /// cycle's best (highest-objective) point.
    Yes,
    /// `maxiter` was reached with no cycle detected. The returned mapping is
    /// the best-objective iteration observed, not necessarily a fixed point.
    No,
}

/// One step of a solver run: the iteration number (the sentinel `maxiter`
/// once [`Converged::Yes`] is reached) and the objective value it produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    /// The 1-indexed iteration number, or `maxiter` as a termination
    /// sentinel once the run has converged.
    pub iteration: usize,
    /// The objective value this iteration produced.
    pub objective: f64,
}

/// Either belief-propagation solver, selected once by
/// [`crate::matcher::Matcher::compute`] and driven identically thereafter.
pub enum Solver {
    /// Plain Maximum Weight Matching relaxation (C4).
    Mwm(MwmSolver),
    /// Squares-aware NAQP relaxation (C5).
    Naqp(NaqpSolver),
}

impl Solver {
    fn step_once(&mut self) -> f64 {
        match self {
            Solver::Mwm(s) => s.step_once(),
            Solver::Naqp(s) => s.step_once(),
        }
    }

    /// Candidate-edge-indexed match flags from the most recent step.
    #[must_use]
    pub fn mates(&self) -> &[bool] {
        match self {
            Solver::Mwm(s) => s.mates(),
            Solver::Naqp(s) => s.mates(),
        }
    }

    /// Per-candidate-edge confidence score from the most recent step, used
    /// by the refiner as the residual score matrix's data.
    #[must_use]
    pub fn marginals(&self) -> &[f64] {
        match self {
            Solver::Mwm(s) => s.marginals(),
            Solver::Naqp(s) => s.marginals(),
        }
    }

    /// Extracts the currently valid row-complete matches from the most
    /// recent `mates()` read-out.
    #[must_use]
    pub fn raw_mapping(&self) -> RawMapping {
        match self {
            Solver::Mwm(s) => extract_raw_mapping(s.candidate_graph(), s.mates()),
            Solver::Naqp(s) => extract_raw_mapping(s.candidate_graph(), s.mates()),
        }
    }
}

/// A row has a match iff exactly one of its edges has `mates = true` (the
/// XOR of the row's flags is `true`); the matched column is that edge's
/// column. Rows with zero or more-than-one positive-margin edge are left
/// unmatched for the refiner to pick up.
pub(crate) fn extract_raw_mapping(w: &Csr, mates: &[bool]) -> RawMapping {
    let mut idx = Vec::new();
    let mut idy = Vec::new();
    for row in 0..w.num_rows() {
        let row_mates = &mates[w.row_range(row)];
        if row_mates.iter().filter(|&&m| m).count() % 2 != 1 {
            continue;
        }
        let pos = row_mates.iter().position(|&m| m).expect("odd count implies at least one true");
        idx.push(row);
        idy.push(w.row_cols(row)[pos]);
    }
    RawMapping { idx, idy }
}

/// Drives a [`Solver`] one round at a time, tracking the objective history
/// and detecting the short limit cycles real runs settle into in place of
/// a strict fixed point.
///
/// Mirrors the original lazy generator's contract: each call to
/// [`SolverIter::step`] runs exactly one message-passing update and returns
/// its iteration number, except that once the cycle detector fires, the
/// iterator runs the cycle's remaining best-point distance and then yields
/// one final report at `iteration == maxiter` as a termination sentinel.
pub struct SolverIter {
    solver: Solver,
    convergence: ConvergenceDetector,
    niter: usize,
    maxiter: usize,
    phase: Phase,
    best: BestSnapshot,
}

/// The mates/marginals pair observed at whichever step produced the highest
/// objective seen so far, so a non-converged run can report that iteration's
/// mapping instead of whatever the final (possibly mid-oscillation) step left
/// behind.
#[derive(Debug, Clone)]
struct BestSnapshot {
    iteration: usize,
    objective: f64,
    mates: Vec<bool>,
    marginals: Vec<f64>,
}

impl BestSnapshot {
    fn empty() -> Self {
        Self { iteration: 0, objective: f64::NEG_INFINITY, mates: Vec::new(), marginals: Vec::new() }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Running,
    ExtraRunning { remaining: usize },
    SentinelPending,
    Done(Converged),
}

impl SolverIter {
    /// Wraps `solver`, ready to run up to `maxiter` message-passing rounds.
    #[must_use]
    pub fn new(solver: Solver, maxiter: usize) -> Self {
        Self {
            solver,
            convergence: ConvergenceDetector::new(),
            niter: 0,
            maxiter,
            phase: Phase::Running,
            best: BestSnapshot::empty(),
        }
    }

    /// Runs the next step of the solver, or `None` once the run has
    /// finished (query [`SolverIter::converged`] to see why).
    pub fn step(&mut self) -> Option<IterationReport> {
        match self.phase {
            Phase::Done(_) => return None,
            Phase::SentinelPending => {
                let objective = *self.convergence.history().last().expect("at least one iteration ran");
                self.phase = Phase::Done(Converged::Yes);
                return Some(IterationReport { iteration: self.maxiter, objective });
            }
            Phase::Running if self.niter >= self.maxiter => {
                self.phase = Phase::Done(Converged::No);
                return None;
            }
            Phase::Running | Phase::ExtraRunning { .. } => {}
        }

        let objective = self.solver.step_once();
        self.niter += 1;
        self.convergence.push(objective);
        if objective > self.best.objective {
            self.best = BestSnapshot {
                iteration: self.niter,
                objective,
                mates: self.solver.mates().to_vec(),
                marginals: self.solver.marginals().to_vec(),
            };
        }
        let report = IterationReport { iteration: self.niter, objective };

        self.phase = match self.phase {
            Phase::Running => match self.convergence.check() {
                Some(0) => Phase::SentinelPending,
                Some(extra) => Phase::ExtraRunning { remaining: extra - 1 },
                None => Phase::Running,
            },
            Phase::ExtraRunning { remaining: 0 } => Phase::SentinelPending,
            Phase::ExtraRunning { remaining } => Phase::ExtraRunning { remaining: remaining - 1 },
            Phase::Done(_) | Phase::SentinelPending => unreachable!(),
        };

        Some(report)
    }

    /// `Some` once the run has finished; `None` while it is still in progress.
    #[must_use]
    pub fn converged(&self) -> Option<Converged> {
        match self.phase {
            Phase::Done(c) => Some(c),
            _ => None,
        }
    }

    /// The wrapped solver, for reading out mates/marginals/mapping after a
    /// step (or after the run has finished).
    #[must_use]
    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    /// The best objective value observed so far, and the 1-indexed
    /// iteration it occurred at. Used by the orchestrator to report the
    /// best-effort mapping when `maxiter` is exhausted without convergence.
    #[must_use]
    pub fn best_objective_iteration(&self) -> Option<(usize, f64)> {
        (self.best.iteration > 0).then_some((self.best.iteration, self.best.objective))
    }

    /// Candidate-edge-indexed match flags from the iteration
    /// [`SolverIter::best_objective_iteration`] names, for a non-converged
    /// run's fallback mapping.
    #[must_use]
    pub fn best_mates(&self) -> &[bool] {
        &self.best.mates
    }

    /// Per-candidate-edge confidence scores from the iteration
    /// [`SolverIter::best_objective_iteration`] names, for a non-converged
    /// run's fallback mapping.
    #[must_use]
    pub fn best_marginals(&self) -> &[f64] {
        &self.best.marginals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SparsifyConfig;
    use crate::sparse::{sparsify, DenseMatrix};

    /// A run cut off before the cycle detector can fire (`maxiter` below
    /// `SKIP_RECENT`) must report `Converged::No` and the best-objective
    /// snapshot must match whichever of its own steps actually scored
    /// highest, not the last one.
    #[test]
    fn non_convergent_run_reports_the_best_objective_steps_snapshot() {
        let dense = DenseMatrix::from_row_major(vec![0.6, 0.5, 0.5, 0.6], 2, 2);
        let w = sparsify(&dense, &SparsifyConfig { sparsity_ratio: 0.0, sparse_row: false }).unwrap();
        let solver = MwmSolver::new(w, 0.4, 7);
        let mut iter = SolverIter::new(Solver::Mwm(solver), 3);

        let mut reports = Vec::new();
        while let Some(report) = iter.step() {
            reports.push(report);
        }
        assert_eq!(iter.converged(), Some(Converged::No));

        // Matches `BestSnapshot`'s strict `>` update rule: the first step to
        // reach a given objective wins any tie, not the last.
        let expected = reports
            .iter()
            .copied()
            .reduce(|best, r| if r.objective > best.objective { r } else { best })
            .unwrap();
        let (best_iteration, best_objective) = iter.best_objective_iteration().unwrap();
        assert_eq!(best_iteration, expected.iteration);
        assert!((best_objective - expected.objective).abs() < 1e-12);
        assert_eq!(iter.best_mates().len(), iter.solver().mates().len());
        assert_eq!(iter.best_marginals().len(), iter.solver().marginals().len());
    }
}

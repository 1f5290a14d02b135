//! C4: max-product belief propagation for the Maximum Weight bipartite
//! Matching relaxation (the plain, non-structural solver).

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::sparse::Csr;

/// Runs one message-passing round per call to [`MwmSolver::step_once`],
/// reading out a match whenever a row's per-edge marginal is positive.
pub struct MwmSolver {
    w: Csr,
    x: Vec<f64>,
    y: Vec<f64>,
    /// Per-edge marginal from the most recent step, `x + y - W.data`.
    marginals: Vec<f64>,
    mates: Vec<bool>,
    epsilon: f64,
    rng: SmallRng,
}

impl MwmSolver {
    /// Builds a solver over candidate graph `w`, seeding `x` and `y` from
    /// its raw scores. `epsilon` is the tie-breaking jitter amplitude;
    /// `seed` makes that jitter reproducible.
    #[must_use]
    pub fn new(w: Csr, epsilon: f64, seed: u64) -> Self {
        let nnz = w.nnz();
        let x = w.data().to_vec();
        let y = w.data().to_vec();
        Self { w, x, y, marginals: vec![0.0; nnz], mates: vec![false; nnz], epsilon, rng: SmallRng::seed_from_u64(seed) }
    }

    #[must_use]
    pub(crate) fn candidate_graph(&self) -> &Csr {
        &self.w
    }

    #[must_use]
    pub(crate) fn mates(&self) -> &[bool] {
        &self.mates
    }

    #[must_use]
    pub(crate) fn marginals(&self) -> &[f64] {
        &self.marginals
    }

    /// Independent uniform jitter in `[-epsilon/2, epsilon/2]`, added to the
    /// candidate weights once per iteration so that exactly-tied edges do
    /// not perpetually tie (the condition the cycle detector exists to
    /// catch). `marginals`/objective are read off the unperturbed weights.
    fn perturbed_weights(&mut self) -> Vec<f64> {
        if self.epsilon <= 0.0 {
            return self.w.data().to_vec();
        }
        let half = self.epsilon / 2.0;
        self.w.data().iter().map(|&v| v + self.rng.gen_range(-half..=half)).collect()
    }

    pub(crate) fn step_once(&mut self) -> f64 {
        let weights = self.perturbed_weights();

        let other_y = self.w.other_row_max(&self.y);
        self.x = weights.iter().zip(&other_y).map(|(&w, &oy)| w - oy.max(0.0)).collect();

        let other_x = self.w.other_col_max(&self.x);
        self.y = weights.iter().zip(&other_x).map(|(&w, &ox)| w - ox.max(0.0)).collect();

        let data = self.w.data();
        self.marginals = (0..self.w.nnz()).map(|e| self.x[e] + self.y[e] - data[e]).collect();
        self.mates = self.marginals.iter().map(|&mu| mu > 0.0).collect();

        data.iter().zip(&self.mates).filter(|&(_, &m)| m).map(|(&w, _)| w).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SparsifyConfig;
    use crate::sparse::{sparsify, DenseMatrix};

    #[test]
    fn diagonal_matrix_converges_to_the_identity_matching() {
        let dense = DenseMatrix::from_row_major(vec![0.9, 0.1, 0.2, 0.8], 2, 2);
        let w = sparsify(&dense, &SparsifyConfig { sparsity_ratio: 0.0, sparse_row: false }).unwrap();
        let mut solver = MwmSolver::new(w, 0.0, 42);
        for _ in 0..20 {
            solver.step_once();
        }
        let mapping = crate::solver::extract_raw_mapping(solver.candidate_graph(), solver.mates());
        assert_eq!(mapping.idx, vec![0, 1]);
        assert_eq!(mapping.idy, vec![0, 1]);
    }
}

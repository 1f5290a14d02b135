//! C5: max-product belief propagation extended with square-interaction
//! messages, trading off per-node similarity against preserved structure.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::sparse::Csr;
use crate::squares::count_squares_matched;

/// Runs one message-passing round per call to [`NaqpSolver::step_once`].
///
/// `w` is expected to already be scaled by `alpha` by the caller (mirroring
/// the contract's "W is pre-scaled by alpha"); `beta` weights the square
/// term both in the message update and in the objective.
pub struct NaqpSolver {
    w: Csr,
    q: Csr,
    q_transpose: Vec<usize>,
    alpha: f64,
    beta: f64,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    m_xyz: Vec<f64>,
    mates: Vec<bool>,
    epsilon: f64,
    rng: SmallRng,
}

impl NaqpSolver {
    /// Builds a solver over candidate graph `w` and squares-interaction
    /// matrix `q`. `w` is expected to carry the raw (unscaled) candidate
    /// scores; `alpha`/`beta` weight similarity against structure, and
    /// `epsilon`/`seed` control the tie-breaking jitter.
    #[must_use]
    pub fn new(w: Csr, q: Csr, alpha: f64, beta: f64, epsilon: f64, seed: u64) -> Self {
        let q_transpose = q.symmetric_transpose_index();
        let nnz = w.nnz();
        let q_nnz = q.nnz();
        let x = w.data().to_vec();
        let y = w.data().to_vec();
        Self {
            w,
            q,
            q_transpose,
            alpha,
            beta,
            x,
            y,
            z: vec![0.0; q_nnz],
            m_xyz: vec![0.0; nnz],
            mates: vec![false; nnz],
            epsilon,
            rng: SmallRng::seed_from_u64(seed),
        }
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
        &self.m_xyz
    }

    /// `alpha`-weighted node score used throughout this solver's messages,
    /// as `spec.md` treats `W` as already pre-scaled once it reaches C5.
    fn scaled_weights(&mut self) -> Vec<f64> {
        let base: Vec<f64> = self.w.data().iter().map(|&v| v * self.alpha).collect();
        if self.epsilon <= 0.0 {
            return base;
        }
        let half = self.epsilon / 2.0;
        base.iter().map(|&v| v + self.rng.gen_range(-half..=half)).collect()
    }

    fn rowsum_zclip(&self, zclip: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.q.num_rows()];
        for (row, total) in out.iter_mut().enumerate() {
            *total = zclip[self.q.row_range(row)].iter().sum();
        }
        out
    }

    /// `Z[e1,e2] = m_xyz[e1] * Q[e1,e2] - zclip[e1,e2]`, recomputed in place
    /// over `Q`'s fixed sparsity pattern.
    fn update_z(&mut self, zclip: &[f64]) {
        for row in 0..self.q.num_rows() {
            let scale = self.m_xyz[row];
            for p in self.q.row_range(row) {
                self.z[p] = scale * self.q.data()[p] - zclip[p];
            }
        }
    }

    pub(crate) fn step_once(&mut self) -> f64 {
        let zclip: Vec<f64> = self
            .q_transpose
            .iter()
            .map(|&t| (self.z[t] + self.beta).clamp(0.0, self.beta))
            .collect();
        let rowsum = self.rowsum_zclip(&zclip);

        let weights = self.scaled_weights();
        let m_z: Vec<f64> = weights.iter().zip(&rowsum).map(|(&w, &r)| w + r).collect();

        let other_y = self.w.other_row_max(&self.y);
        self.x = m_z.iter().zip(&other_y).map(|(&mz, &oy)| mz - oy.max(0.0)).collect();

        let other_x = self.w.other_col_max(&self.x);
        self.y = m_z.iter().zip(&other_x).map(|(&mz, &ox)| mz - ox.max(0.0)).collect();

        self.m_xyz = (0..self.w.nnz()).map(|e| self.x[e] + self.y[e] - m_z[e]).collect();
        self.mates = self.m_xyz.iter().map(|&v| v >= 0.0).collect();

        self.update_z(&zclip);

        let scaled_data: Vec<f64> = self.w.data().iter().map(|&v| v * self.alpha).collect();
        let similarity_term: f64 =
            scaled_data.iter().zip(&self.mates).filter(|&(_, &m)| m).map(|(&v, _)| v).sum();
        let squares_matched = count_squares_matched(&self.q, &self.mates);
        similarity_term + self.beta * squares_matched as f64
    }
}

//! Refiner (C6): extends a partial raw mapping to a complete one over
//! `min(n, m)` pairs using a linear-assignment pass over the unmatched rows
//! and columns, without disturbing already-matched nodes.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::errors::MatchError;
use crate::lapjv;
use crate::solver::RawMapping;
use crate::sparse::{Csr, DenseMatrix};

/// Cost assigned to a candidate pair with zero recorded score, so the
/// linear assignment strongly prefers any real candidate over one absent
/// from the sparse score matrix.
const ZERO_SCORE_COST: f64 = 1e6;

/// Extends `mapping` to a complete assignment over `min(n, m)` pairs.
///
/// `score_matrix` carries, in `W`'s sparsity pattern, the per-candidate-edge
/// confidence to use for the residual linear assignment (the solver's final
/// marginals, not necessarily the original similarity).
///
/// If every row or every column is already matched, the mapping is already
/// complete and is returned unchanged -- refinement has no complement left
/// to assign.
pub fn refine(score_matrix: &Csr, mapping: &RawMapping) -> Result<RawMapping, MatchError> {
    let n = score_matrix.num_rows();
    let m = score_matrix.num_cols();

    let matched_rows: HashSet<usize> = mapping.idx.iter().copied().collect();
    let matched_cols: HashSet<usize> = mapping.idy.iter().copied().collect();
    let unmatched_rows: Vec<usize> = (0..n).filter(|r| !matched_rows.contains(r)).collect();
    let unmatched_cols: Vec<usize> = (0..m).filter(|c| !matched_cols.contains(c)).collect();

    if unmatched_rows.is_empty() || unmatched_cols.is_empty() {
        debug!(matched = mapping.len(), "mapping already complete, skipping refinement");
        return Ok(mapping.clone());
    }

    let residual = residual_cost_matrix(score_matrix, &unmatched_rows, &unmatched_cols);
    let size = residual.num_rows().max(residual.num_cols());
    let max_cost = residual.values().iter().copied().fold(f64::MIN, f64::max) + 1.0;

    let assignment = lapjv::solve(&residual, max_cost)?;

    let mut idx = mapping.idx.clone();
    let mut idy = mapping.idy.clone();
    for row in 0..size.min(assignment.len()) {
        let col = assignment[row];
        if row < unmatched_rows.len() && col < unmatched_cols.len() {
            idx.push(unmatched_rows[row]);
            idy.push(unmatched_cols[col]);
        }
    }

    debug!(
        refined = idx.len() - mapping.len(),
        total = idx.len(),
        "refinement completed the mapping"
    );
    Ok(RawMapping { idx, idy })
}

/// Densifies `score_matrix` restricted to `rows x cols`, converts scores to
/// costs (`ZERO_SCORE_COST` for absent/zero entries, `-score` otherwise),
/// pads to square with `ZERO_SCORE_COST`, and shifts everything nonnegative
/// (a constant shift does not change the optimal assignment) since the JV
/// kernel requires nonnegative costs.
fn residual_cost_matrix(score_matrix: &Csr, rows: &[usize], cols: &[usize]) -> DenseMatrix {
    let col_pos: HashMap<usize, usize> = cols.iter().enumerate().map(|(pos, &c)| (c, pos)).collect();
    let size = rows.len().max(cols.len());
    let mut costs = vec![ZERO_SCORE_COST; size * size];

    for (i, &row) in rows.iter().enumerate() {
        for (&col, &value) in score_matrix.row_cols(row).iter().zip(score_matrix.row_values(row)) {
            if let Some(&j) = col_pos.get(&col) {
                costs[i * size + j] = if value == 0.0 { ZERO_SCORE_COST } else { -value };
            }
        }
    }

    let min_cost = costs.iter().copied().fold(f64::INFINITY, f64::min);
    if min_cost < 0.0 {
        let shift = -min_cost;
        for c in &mut costs {
            *c += shift;
        }
    }

    DenseMatrix::from_row_major(costs, size, size)
}

//! Sparsifier (C2): turns a dense similarity matrix into a sparse candidate
//! bipartite graph.

use tracing::debug;

use crate::config::SparsifyConfig;
use crate::errors::{MatchError, Side};
use crate::sparse::Csr;

/// A dense, row-major similarity matrix of shape `(num_rows, num_cols)`.
///
/// Values are expected to lie in `[0, 1]`; negative values are rejected by
/// [`sparsify`].
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    values: Vec<f64>,
    num_rows: usize,
    num_cols: usize,
}

impl DenseMatrix {
    /// Builds a dense matrix from row-major values, checking the buffer
    /// against the claimed shape.
    ///
    /// This is the fallible front door for turning caller-supplied data into
    /// a `DenseMatrix`; [`Matcher::new`](crate::matcher::Matcher::new) expects
    /// its `similarity` argument to have come from here (or from
    /// [`from_row_major`](Self::from_row_major), its panicking convenience
    /// wrapper for call sites that already trust their own shape).
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::UnknownMatrixShape`] if `values.len() !=
    /// num_rows * num_cols`.
    pub fn try_from_row_major(
        values: Vec<f64>,
        num_rows: usize,
        num_cols: usize,
    ) -> Result<Self, MatchError> {
        if values.len() != num_rows * num_cols {
            return Err(MatchError::UnknownMatrixShape { rows: num_rows, cols: num_cols });
        }
        Ok(Self { values, num_rows, num_cols })
    }

    /// Builds a dense matrix from row-major values.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != num_rows * num_cols`. Prefer
    /// [`try_from_row_major`](Self::try_from_row_major) at any boundary
    /// taking data from outside the crate.
    #[must_use]
    pub fn from_row_major(values: Vec<f64>, num_rows: usize, num_cols: usize) -> Self {
        Self::try_from_row_major(values, num_rows, num_cols)
            .expect("row-major buffer size mismatch")
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns.
    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Total element count.
    #[must_use]
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Value at `(row, col)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.num_cols + col]
    }

    /// Values of an entire row.
    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.num_cols..(row + 1) * self.num_cols]
    }

    /// Flattened row-major values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// The fixed epsilon a zero threshold is bumped to so that zero-similarity
/// entries never survive sparsification. Not user-tunable: this matches a
/// hardcoded constant in the reference implementation rather than an
/// exposed knob.
const ZERO_THRESHOLD_EPSILON: f64 = 1e-8;

/// Thresholds `similarity` into a sparse candidate matrix `W`, per the
/// algorithm in the design document.
///
/// # Errors
///
/// Returns [`MatchError::NegativeWeight`] if any entry is negative, or
/// [`MatchError::IncompleteBipartite`] if sparsification leaves a row or
/// column with no surviving candidate edges.
pub fn sparsify(similarity: &DenseMatrix, config: &SparsifyConfig) -> Result<Csr, MatchError> {
    for row in 0..similarity.num_rows() {
        for (col, &value) in similarity.row(row).iter().enumerate() {
            if value < 0.0 {
                return Err(MatchError::NegativeWeight { row, col, value });
            }
        }
    }

    let csr = if config.sparse_row {
        sparsify_per_row(similarity, config.sparsity_ratio)
    } else {
        sparsify_global(similarity, config.sparsity_ratio)
    };

    debug!(
        nnz = csr.nnz(),
        size = similarity.size(),
        sparsity_pct = 100.0 * csr.nnz() as f64 / similarity.size().max(1) as f64,
        "sparse similarity matrix computed"
    );

    if let Some(row) = csr.first_isolated_row() {
        return Err(MatchError::IncompleteBipartite { side: Side::Primary, index: row });
    }
    if let Some(col) = csr.first_isolated_col() {
        return Err(MatchError::IncompleteBipartite { side: Side::Secondary, index: col });
    }

    Ok(csr)
}

fn sparsify_global(similarity: &DenseMatrix, ratio: f64) -> Csr {
    let keep_all = ratio == 0.0;
    let keep_row_max_only = ratio == 1.0;

    let threshold = if keep_all || keep_row_max_only {
        0.0 // unused in these two branches, computed per-row below instead
    } else {
        let k = (ratio * similarity.size() as f64).round() as usize;
        bump_zero_threshold(nth_smallest(similarity.values(), k.saturating_sub(1)))
    };

    let mut rows = Vec::with_capacity(similarity.num_rows());
    for r in 0..similarity.num_rows() {
        let row_values = similarity.row(r);
        let row_max = row_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut entries = Vec::new();
        for (c, &v) in row_values.iter().enumerate() {
            let keep = if keep_all {
                v != 0.0
            } else if keep_row_max_only {
                v >= row_max && v > 0.0
            } else {
                v >= threshold
            };
            if keep {
                entries.push((c, v));
            }
        }
        rows.push(entries);
    }

    Csr::from_row_entries(similarity.num_rows(), similarity.num_cols(), rows)
}

fn sparsify_per_row(similarity: &DenseMatrix, ratio: f64) -> Csr {
    let keep_all = ratio == 0.0;
    let keep_row_max_only = ratio == 1.0;
    let k = (ratio * similarity.num_cols() as f64).round() as usize;

    let mut rows = Vec::with_capacity(similarity.num_rows());
    for r in 0..similarity.num_rows() {
        let row_values = similarity.row(r);
        let row_max = row_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let threshold = if keep_all {
            0.0
        } else if keep_row_max_only {
            row_max
        } else {
            bump_zero_threshold(nth_smallest(row_values, k.saturating_sub(1)))
        };

        let mut entries = Vec::new();
        for (c, &v) in row_values.iter().enumerate() {
            let keep = if keep_all { v != 0.0 } else { v >= threshold && v > 0.0 };
            if keep {
                entries.push((c, v));
            }
        }
        rows.push(entries);
    }

    Csr::from_row_entries(similarity.num_rows(), similarity.num_cols(), rows)
}

fn bump_zero_threshold(threshold: f64) -> f64 {
    if threshold == 0.0 { ZERO_THRESHOLD_EPSILON } else { threshold }
}

/// Returns the value that would land at sorted position `k` (0-indexed) if
/// `values` were fully sorted ascending -- the `partition` step of the
/// design document's sparsification algorithm.
fn nth_smallest(values: &[f64], k: usize) -> f64 {
    let mut copy: Vec<f64> = values.to_vec();
    let k = k.min(copy.len().saturating_sub(1));
    copy.select_nth_unstable_by(k, |a, b| a.total_cmp(b));
    copy[k]
}

//! A compressed-sparse-row matrix kernel (C1): storage, row/column slicing,
//! and the leave-one-out-max primitives the belief-propagation solvers run
//! on their hot path.

/// A real-valued sparse matrix stored in compressed-sparse-row form.
///
/// Nonzero entries are assigned a stable id in `[0, nnz)` in CSR traversal
/// order (row-major, increasing column within a row). That id is the
/// candidate-edge id used throughout the rest of the crate.
///
/// Column-major access is supported without a second copy of the data: a
/// column-major view of any `nnz`-length vector aligned with this matrix is
/// obtained by permuting it with [`Csr::to_col`], and a result computed in
/// that column-major order is mapped back to the original order with
/// [`Csr::to_row`].
#[derive(Debug, Clone, PartialEq)]
pub struct Csr {
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    data: Vec<f64>,
    num_rows: usize,
    num_cols: usize,
    /// `to_col[i]` is the original (row-major) position of the `i`-th
    /// entry in column-major order: the stable argsort of `col_idx`.
    to_col: Vec<usize>,
    /// Inverse permutation of `to_col`: `to_row[to_col[i]] == i`.
    to_row: Vec<usize>,
    col_ptr: Vec<usize>,
}

impl Csr {
    /// Builds a CSR matrix from per-row `(column, value)` entries. Each
    /// row's entries are sorted by column; rows need not be pre-sorted by
    /// the caller.
    pub fn from_row_entries(
        num_rows: usize,
        num_cols: usize,
        mut rows: Vec<Vec<(usize, f64)>>,
    ) -> Self {
        assert_eq!(rows.len(), num_rows, "one entry list per row is required");

        let mut row_ptr = Vec::with_capacity(num_rows + 1);
        row_ptr.push(0);
        let nnz_hint: usize = rows.iter().map(Vec::len).sum();
        let mut col_idx = Vec::with_capacity(nnz_hint);
        let mut data = Vec::with_capacity(nnz_hint);

        for row in &mut rows {
            row.sort_unstable_by_key(|&(c, _)| c);
            for &(c, v) in row.iter() {
                debug_assert!(c < num_cols, "column index {c} out of bounds ({num_cols})");
                col_idx.push(c);
                data.push(v);
            }
            row_ptr.push(col_idx.len());
        }

        let (to_col, to_row, col_ptr) = build_column_index(&col_idx, num_cols);
        let csr = Self { row_ptr, col_idx, data, num_rows, num_cols, to_col, to_row, col_ptr };
        csr.check_invariants();
        csr
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

    /// Number of stored (nonzero) entries, `E` in the design document.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// Whether the matrix has no stored entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.col_idx.is_empty()
    }

    /// Stored values, in candidate-edge-id order.
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Mutable access to the stored values, in candidate-edge-id order.
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Column index of each stored entry, in candidate-edge-id order.
    #[must_use]
    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// `to_col[i]` is the candidate-edge id of the `i`-th entry visited in
    /// column-major order.
    #[must_use]
    pub fn to_col(&self) -> &[usize] {
        &self.to_col
    }

    /// Inverse of [`Csr::to_col`].
    #[must_use]
    pub fn to_row(&self) -> &[usize] {
        &self.to_row
    }

    /// The half-open range of candidate-edge ids belonging to `row`.
    #[must_use]
    pub fn row_range(&self, row: usize) -> core::ops::Range<usize> {
        self.row_ptr[row]..self.row_ptr[row + 1]
    }

    /// The half-open range of column-major positions belonging to `col`.
    #[must_use]
    pub fn col_range(&self, col: usize) -> core::ops::Range<usize> {
        self.col_ptr[col]..self.col_ptr[col + 1]
    }

    /// Column indices of the candidate edges in `row`.
    #[must_use]
    pub fn row_cols(&self, row: usize) -> &[usize] {
        &self.col_idx[self.row_range(row)]
    }

    /// Values of the candidate edges in `row`.
    #[must_use]
    pub fn row_values(&self, row: usize) -> &[f64] {
        &self.data[self.row_range(row)]
    }

    /// Slices an arbitrary `nnz`-length vector by row, in the same order as
    /// [`Csr::row_values`].
    #[must_use]
    pub fn row_slice<'a>(&self, row: usize, values: &'a [f64]) -> &'a [f64] {
        &values[self.row_range(row)]
    }

    /// Returns `true` iff every row and every column has at least one
    /// stored entry (the bipartite-completeness invariant required of a
    /// sparsified candidate matrix).
    #[must_use]
    pub fn first_isolated_row(&self) -> Option<usize> {
        (0..self.num_rows).find(|&r| self.row_range(r).is_empty())
    }

    /// First column with no stored entries, if any.
    #[must_use]
    pub fn first_isolated_col(&self) -> Option<usize> {
        (0..self.num_cols).find(|&c| self.col_range(c).is_empty())
    }

    /// For each stored entry, the maximum value of `values` among the other
    /// entries sharing its row, excluding itself. Rows of length `< 2`
    /// yield `0.0` for their sole entry.
    ///
    /// `values` must be aligned with this matrix's candidate-edge ids (same
    /// length as [`Csr::nnz`]).
    ///
    /// Rows are independent, so with the `parallel` feature enabled this
    /// runs over a rayon thread pool instead of sequentially; the contract
    /// (including tie-breaking) is identical either way.
    #[must_use]
    #[cfg(not(feature = "parallel"))]
    pub fn other_row_max(&self, values: &[f64]) -> Vec<f64> {
        debug_assert_eq!(values.len(), self.nnz());
        let mut out = vec![0.0; values.len()];
        for row in 0..self.num_rows {
            let range = self.row_range(row);
            other_max_into(&values[range.clone()], &mut out[range]);
        }
        out
    }

    /// Parallel counterpart of the sequential [`Csr::other_row_max`] above,
    /// built the same way: one independent leave-one-out pass per row,
    /// fanned out over rayon instead of a plain loop.
    #[must_use]
    #[cfg(feature = "parallel")]
    pub fn other_row_max(&self, values: &[f64]) -> Vec<f64> {
        use rayon::prelude::*;
        debug_assert_eq!(values.len(), self.nnz());
        (0..self.num_rows)
            .into_par_iter()
            .flat_map_iter(|row| {
                let range = self.row_range(row);
                let mut local = vec![0.0; range.len()];
                other_max_into(&values[range], &mut local);
                local
            })
            .collect()
    }

    /// For each stored entry, the maximum value of `values` among the other
    /// entries sharing its column, excluding itself. Symmetric counterpart
    /// of [`Csr::other_row_max`].
    #[must_use]
    #[cfg(not(feature = "parallel"))]
    pub fn other_col_max(&self, values: &[f64]) -> Vec<f64> {
        debug_assert_eq!(values.len(), self.nnz());
        let col_major: Vec<f64> = self.to_col.iter().map(|&i| values[i]).collect();
        let mut col_major_out = vec![0.0; col_major.len()];
        for col in 0..self.num_cols {
            let range = self.col_range(col);
            other_max_into(&col_major[range.clone()], &mut col_major_out[range]);
        }
        self.to_row.iter().map(|&i| col_major_out[i]).collect()
    }

    /// Parallel counterpart of the sequential [`Csr::other_col_max`] above.
    #[must_use]
    #[cfg(feature = "parallel")]
    pub fn other_col_max(&self, values: &[f64]) -> Vec<f64> {
        use rayon::prelude::*;
        debug_assert_eq!(values.len(), self.nnz());
        let col_major: Vec<f64> = self.to_col.iter().map(|&i| values[i]).collect();
        let col_major_out: Vec<f64> = (0..self.num_cols)
            .into_par_iter()
            .flat_map_iter(|col| {
                let range = self.col_range(col);
                let mut local = vec![0.0; range.len()];
                other_max_into(&col_major[range], &mut local);
                local
            })
            .collect();
        self.to_row.iter().map(|&i| col_major_out[i]).collect()
    }

    /// Clones this matrix's structure with `data` substituted in, e.g. to
    /// turn `W`'s candidate graph into a scored matrix carrying a solver's
    /// marginals instead of the original similarity weights.
    #[must_use]
    pub fn with_data(&self, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), self.nnz());
        Self { data, ..self.clone() }
    }

    /// For a square matrix with a symmetric nonzero pattern (such as the
    /// squares-interaction matrix `Q`), returns the permutation `t` with
    /// `t[p]` the candidate-edge-id-pair position of `(col_idx[p], row_of[p])`
    /// -- i.e. `data[t[p]]` reads the transposed entry of the one stored at
    /// `p`. Used by the NAQP solver to compute `Zᵀ` without a second matrix.
    #[must_use]
    pub fn symmetric_transpose_index(&self) -> Vec<usize> {
        debug_assert_eq!(self.num_rows, self.num_cols, "transpose index requires a square matrix");
        let mut index_of: std::collections::HashMap<(usize, usize), usize> =
            std::collections::HashMap::with_capacity(self.nnz());
        for row in 0..self.num_rows {
            for (offset, &col) in self.row_cols(row).iter().enumerate() {
                index_of.insert((row, col), self.row_range(row).start + offset);
            }
        }
        let mut transpose_index = vec![0usize; self.nnz()];
        for row in 0..self.num_rows {
            for (offset, &col) in self.row_cols(row).iter().enumerate() {
                let p = self.row_range(row).start + offset;
                transpose_index[p] = *index_of
                    .get(&(col, row))
                    .expect("symmetric_transpose_index requires a symmetric nonzero pattern");
            }
        }
        transpose_index
    }

    /// Debug-only sanity checks on the CSR layout invariants: `row_ptr` is
    /// monotonic, `col_idx` is sorted within each row, and the
    /// column-major permutation is a genuine bijection.
    pub fn check_invariants(&self) {
        debug_assert_eq!(self.row_ptr.len(), self.num_rows + 1);
        debug_assert_eq!(self.col_idx.len(), self.data.len());
        debug_assert!(self.row_ptr.windows(2).all(|w| w[0] <= w[1]));
        for row in 0..self.num_rows {
            debug_assert!(self.row_cols(row).windows(2).all(|w| w[0] < w[1]), "row {row} not sorted");
        }
        debug_assert_eq!(self.to_col.len(), self.nnz());
        debug_assert_eq!(self.to_row.len(), self.nnz());
        debug_assert_eq!(self.col_ptr.len(), self.num_cols + 1);
    }
}

/// Computes, in one pass, the leave-one-out maximum described in the design
/// document: ties are broken by lowest index (the first occurrence of the
/// maximum keeps the top slot), and for rows of length `>= 2` the output
/// equals `max1` everywhere except at the index of `max1`, where it holds
/// `max2`.
fn other_max_into(values: &[f64], out: &mut [f64]) {
    let n = values.len();
    if n < 2 {
        out.fill(0.0);
        return;
    }

    let mut max1_idx = 0usize;
    let mut max1 = values[0];
    let mut max2 = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > max1 {
            max2 = max1;
            max1 = v;
            max1_idx = i;
        } else if v > max2 {
            max2 = v;
        }
    }

    out.fill(max1);
    out[max1_idx] = max2;
}

/// Builds the column-major permutation (`to_col`), its inverse (`to_row`),
/// and the column offsets (`col_ptr`) for a row-major `col_idx` array.
fn build_column_index(col_idx: &[usize], num_cols: usize) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
    let mut to_col: Vec<usize> = (0..col_idx.len()).collect();
    to_col.sort_by_key(|&i| col_idx[i]);

    let mut to_row = vec![0usize; to_col.len()];
    for (col_major_pos, &original_pos) in to_col.iter().enumerate() {
        to_row[original_pos] = col_major_pos;
    }

    let mut col_ptr = vec![0usize; num_cols + 1];
    for &c in col_idx {
        col_ptr[c + 1] += 1;
    }
    for i in 0..num_cols {
        col_ptr[i + 1] += col_ptr[i];
    }

    (to_col, to_row, col_ptr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csr_from_dense(rows: &[&[f64]]) -> Csr {
        let num_rows = rows.len();
        let num_cols = rows.first().map_or(0, |r| r.len());
        let entries = rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|&(_, &v)| v != 0.0)
                    .map(|(c, &v)| (c, v))
                    .collect()
            })
            .collect();
        Csr::from_row_entries(num_rows, num_cols, entries)
    }

    #[test]
    fn other_row_max_single_entry_row_is_zero() {
        let csr = csr_from_dense(&[&[0.0, 5.0, 0.0]]);
        assert_eq!(csr.other_row_max(csr.data()), vec![0.0]);
    }

    #[test]
    fn other_row_max_matches_top_two() {
        let csr = csr_from_dense(&[&[3.0, 7.0, 1.0]]);
        // row values in column order: [3.0, 7.0, 1.0], max1=7.0 at idx1, max2=3.0
        assert_eq!(csr.other_row_max(csr.data()), vec![7.0, 3.0, 7.0]);
    }

    #[test]
    fn other_row_max_with_ties_keeps_first_occurrence_as_max1() {
        let csr = csr_from_dense(&[&[5.0, 5.0, 2.0]]);
        // values [5,5,2]: max1=5 at idx0 (first), max2=5 (the other 5)
        assert_eq!(csr.other_row_max(csr.data()), vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn other_col_max_round_trips_through_permutation() {
        let csr = csr_from_dense(&[&[1.0, 2.0], &[3.0, 4.0]]);
        // column 0: [1,3] -> other max [3,1]; column 1: [2,4] -> other max [4,2]
        assert_eq!(csr.other_col_max(csr.data()), vec![3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn bipartite_completeness_detects_isolated_row() {
        let csr = csr_from_dense(&[&[0.0, 0.0], &[1.0, 0.0]]);
        assert_eq!(csr.first_isolated_row(), Some(0));
    }

    #[test]
    fn bipartite_completeness_detects_isolated_column() {
        let csr = csr_from_dense(&[&[1.0, 0.0], &[1.0, 0.0]]);
        assert_eq!(csr.first_isolated_col(), Some(1));
    }

    #[test]
    fn symmetric_transpose_index_pairs_mirrored_entries() {
        let csr = csr_from_dense(&[&[0.0, 1.0, 1.0], &[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]]);
        let t = csr.symmetric_transpose_index();
        let mut transposed: Vec<f64> = t.iter().map(|&p| csr.data()[p]).collect();
        // symmetric 0/1 pattern here has identical values under transpose.
        transposed.sort_by(f64::total_cmp);
        let mut original = csr.data().to_vec();
        original.sort_by(f64::total_cmp);
        assert_eq!(transposed, original);
    }
}

//! Errors that may occur while sparsifying, enumerating squares, solving, or
//! refining a graph matching.

/// Errors returned by the matching pipeline.
///
/// Exhausting `maxiter` without the cycle detector firing is not an error
/// here: [`crate::solver::Converged::No`] reports it alongside a
/// best-effort mapping, matching the non-goal that the core never
/// guarantees a globally optimal (or even converged) solution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    /// The similarity matrix was not a 2-D matrix of the expected numeric
    /// type.
    #[error("unknown matrix shape: expected a 2-D matrix, got {rows} rows and {cols} columns")]
    UnknownMatrixShape {
        /// Declared number of rows.
        rows: usize,
        /// Declared number of columns.
        cols: usize,
    },

    /// Sparsification left a row or column with no surviving candidate
    /// edges, breaking the bipartite-completeness invariant of `W`.
    #[error("incomplete bipartite candidate graph: {side:?} index {index} has no candidate edges")]
    IncompleteBipartite {
        /// Which side of the bipartite graph is isolated.
        side: Side,
        /// The isolated row or column index.
        index: usize,
    },

    /// A similarity score was negative; the MWM/NAQP formulation requires
    /// strictly non-negative weights.
    #[error("negative similarity weight {value} at ({row}, {col})")]
    NegativeWeight {
        /// Row index of the offending entry.
        row: usize,
        /// Column index of the offending entry.
        col: usize,
        /// The offending (negative) value.
        value: f64,
    },

    /// The adjacency matrices' shapes are inconsistent with the similarity
    /// matrix's shape.
    #[error(
        "dimension mismatch: similarity matrix is {sim_rows}x{sim_cols}, \
         primary adjacency is {primary}x{primary}, secondary adjacency is {secondary}x{secondary}"
    )]
    DimensionMismatch {
        /// Number of rows of the similarity matrix.
        sim_rows: usize,
        /// Number of columns of the similarity matrix.
        sim_cols: usize,
        /// Side length of the primary adjacency matrix.
        primary: usize,
        /// Side length of the secondary adjacency matrix.
        secondary: usize,
    },

    /// The Jonker-Volgenant solver failed on a padded square matrix. This
    /// should never happen and indicates a bug in the refiner rather than
    /// an expected failure mode.
    #[error("linear assignment infeasible on a {size}x{size} padded matrix (this is a bug)")]
    LAPInfeasible {
        /// Side length of the padded square matrix that was being solved.
        size: usize,
    },
}

/// Which side of a bipartite candidate graph an [`MatchError::IncompleteBipartite`]
/// refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The primary (row) partition.
    Primary,
    /// The secondary (column) partition.
    Secondary,
}

//! Property-based invariants from the design document: uniqueness of the
//! final mapping, leave-one-out max semantics, and symmetry of the squares
//! matrix.

use naqp_core::adjacency::Adjacency;
use naqp_core::config::{NaqpConfig, SolverConfig, SparsifyConfig};
use naqp_core::matcher::Matcher;
use naqp_core::sparse::{sparsify, DenseMatrix};
use naqp_core::squares::enumerate_squares;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn has_unique_values(values: &[usize]) -> bool {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).all(|w| w[0] != w[1])
}

fn random_similarity(seed: u64, rows: usize, cols: usize) -> DenseMatrix {
    let mut rng = SmallRng::seed_from_u64(seed);
    let values: Vec<f64> = (0..rows * cols).map(|_| rng.gen_range(0.0..1.0)).collect();
    DenseMatrix::from_row_major(values, rows, cols)
}

/// Invariant 1: the final mapping has unique primary and unique secondary
/// indices. Invariant 2: its length equals `min(n, m)` once refined.
#[test]
fn mapping_is_a_unique_complete_assignment() {
    for (rows, cols, seed) in [(5usize, 5usize, 1u64), (4, 7, 2), (7, 4, 3), (6, 6, 4)] {
        let dense = random_similarity(seed, rows, cols);
        let primary = Adjacency::from_edges(rows, []);
        let secondary = Adjacency::from_edges(cols, []);
        let mut matcher = Matcher::new(&dense, &primary, &secondary).unwrap();

        let cfg = NaqpConfig {
            sparsify: SparsifyConfig { sparsity_ratio: 0.6, sparse_row: false },
            solver: SolverConfig { tradeoff: 1.0, epsilon: 0.2, maxiter: 200, seed },
            compute_squares: false,
        };
        matcher.run(&cfg).unwrap();

        let mapping = matcher.mapping().unwrap();
        assert!(has_unique_values(&mapping.idx));
        assert!(has_unique_values(&mapping.idy));
        assert_eq!(mapping.len(), rows.min(cols));
    }
}

/// Invariant 5: for rows of length >= 2, `other_row_max` differs from a
/// plain `max` broadcast only at the argmax position, where it holds the
/// second-largest value.
#[test]
fn other_row_max_matches_second_largest_at_the_argmax() {
    let dense = DenseMatrix::from_row_major(vec![2.0, 9.0, 4.0, 1.0], 1, 4);
    let w = sparsify(&dense, &SparsifyConfig { sparsity_ratio: 0.0, sparse_row: false }).unwrap();
    let result = w.other_row_max(w.data());
    // values in column order: [2, 9, 4, 1]; max1=9 at idx1, max2=4.
    assert_eq!(result, vec![9.0, 4.0, 9.0, 9.0]);
}

/// Invariant 6: `Q` is symmetric and 0/1-valued.
#[test]
fn squares_matrix_is_symmetric_and_boolean() {
    let values = vec![0.9, 0.2, 0.1, 0.1, 0.9, 0.2, 0.2, 0.1, 0.9];
    let dense = DenseMatrix::from_row_major(values, 3, 3);
    let w = sparsify(&dense, &SparsifyConfig { sparsity_ratio: 0.0, sparse_row: false }).unwrap();
    let adj = Adjacency::from_edges(3, [(0, 1), (1, 2), (2, 0), (0, 2)]);
    let q = enumerate_squares(&w, &adj, &adj);

    for e1 in 0..q.num_rows() {
        for &e2 in q.row_cols(e1) {
            assert!(q.row_cols(e2).contains(&e1), "Q[{e1},{e2}] set without Q[{e2},{e1}]");
        }
    }
    assert!(q.data().iter().all(|&v| v == 0.0 || v == 1.0));
}

/// Invariant 7: sparsifying with `ratio=0` then running pure MWM on a
/// diagonal similarity matrix recovers the identity permutation.
#[test]
fn diagonal_similarity_recovers_identity_under_mwm() {
    let n = 5;
    let mut values = vec![0.1; n * n];
    for i in 0..n {
        values[i * n + i] = 0.95;
    }
    let dense = DenseMatrix::from_row_major(values, n, n);
    let primary = Adjacency::from_edges(n, []);
    let secondary = Adjacency::from_edges(n, []);
    let mut matcher = Matcher::new(&dense, &primary, &secondary).unwrap();

    let cfg = NaqpConfig {
        sparsify: SparsifyConfig { sparsity_ratio: 0.0, sparse_row: false },
        solver: SolverConfig { tradeoff: 1.0, epsilon: 0.0, maxiter: 200, seed: 9 },
        compute_squares: false,
    };
    matcher.run(&cfg).unwrap();

    let mapping = matcher.mapping().unwrap();
    let mut pairs: Vec<(usize, usize)> =
        mapping.idx.iter().copied().zip(mapping.idy.iter().copied()).collect();
    pairs.sort_unstable();
    assert_eq!(pairs, (0..n).map(|i| (i, i)).collect::<Vec<_>>());
}

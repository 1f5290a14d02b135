//! Criterion benchmark for the squares enumerator (C3): building the
//! quadratic-interaction matrix `Q` from a candidate graph and two
//! adjacencies.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use naqp_core::adjacency::Adjacency;
use naqp_core::config::SparsifyConfig;
use naqp_core::sparse::{sparsify, DenseMatrix};
use naqp_core::squares::enumerate_squares;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn random_similarity(seed: u64, n: usize) -> DenseMatrix {
    let mut rng = SmallRng::seed_from_u64(seed);
    let values: Vec<f64> = (0..n * n).map(|_| rng.gen_range(0.0..1.0)).collect();
    DenseMatrix::from_row_major(values, n, n)
}

/// A sparse random directed adjacency over `n` nodes with `avg_out` expected
/// out-degree, so the enumerator's `O(E * d1 * d2)` cost is visible across
/// degree settings.
fn random_adjacency(seed: u64, n: usize, avg_out: usize) -> Adjacency {
    let mut rng = SmallRng::seed_from_u64(seed);
    let edges: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (0..avg_out).map(move |_| i))
        .map(|i| (i, rng.gen_range(0..n)))
        .collect();
    Adjacency::from_edges(n, edges)
}

fn bench_squares(c: &mut Criterion) {
    let mut group = c.benchmark_group("squares_enumeration");

    for &n in &[20usize, 50, 100] {
        for &avg_out in &[2usize, 5] {
            let dense = random_similarity(3, n);
            let w = sparsify(&dense, &SparsifyConfig { sparsity_ratio: 0.5, sparse_row: false })
                .expect("random dense matrix sparsifies to a complete bipartite graph");
            let primary = random_adjacency(5, n, avg_out);
            let secondary = random_adjacency(6, n, avg_out);

            let label = format!("n={n}_deg={avg_out}");
            group.bench_with_input(BenchmarkId::new("enumerate", &label), &w, |b, w| {
                b.iter(|| black_box(enumerate_squares(w, &primary, &secondary)));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_squares);
criterion_main!(benches);

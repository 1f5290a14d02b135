//! Sparse-matrix storage and sparsification (C1, C2).

mod csr;
mod sparsify;

pub use csr::Csr;
pub use sparsify::{sparsify, DenseMatrix};

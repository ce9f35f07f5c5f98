//! dxrag-sparse
//!
//! Tantivy BM25 index over passage texts. Index-time and query-time text go
//! through the same `tokenize` function so the two can never diverge.

pub mod index;
pub mod tantivy_utils;

pub use index::SparseIndex;
pub use tantivy_utils::tokenize;

/// Sub-directory of the index dir holding the tantivy index.
pub const SPARSE_DIR: &str = "sparse";

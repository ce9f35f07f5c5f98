use dxrag_core::traits::{DenseSearch, SparseSearch};
use dxrag_core::{Result, ScoredPassage};
use tracing::debug;

use crate::fusion::{fuse, DEFAULT_RRF_K};

/// Runs both modalities for one query and fuses them.
pub struct HybridRetriever<D, S> where D: DenseSearch, S: SparseSearch {
    dense: D,
    sparse: S,
    rrf_constant: u32,
}

impl<D, S> HybridRetriever<D, S> where D: DenseSearch, S: SparseSearch {
    pub fn new(dense: D, sparse: S) -> Self { Self { dense, sparse, rrf_constant: DEFAULT_RRF_K } }

    pub fn with_rrf_constant(mut self, rrf_constant: u32) -> Self {
        self.rrf_constant = rrf_constant;
        self
    }

    /// `query_text` feeds BM25, `query_vector` (already query-encoded) feeds
    /// the dense index. Each side contributes at most `k` candidates.
    pub fn search(&self, query_text: &str, query_vector: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        let dense_hits = self.dense.search_vec(query_vector, k)?;
        let sparse_hits = self.sparse.search_text(query_text, k)?;
        let fused = fuse(&dense_hits, &sparse_hits, k, self.rrf_constant);
        debug!(dense = dense_hits.len(), sparse = sparse_hits.len(), fused = fused.len(), k, "hybrid search");
        Ok(fused)
    }
}

//! Start-up wiring: configuration, models and the loaded indexes, shared by
//! every query for the life of the process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use dxrag_core::config::Settings;
use dxrag_core::traits::Embedder;
use dxrag_core::{Error, Result, ScoredPassage};
use dxrag_dense::{load_index, DenseIndex};
use dxrag_embed::{get_default_embedder, CrossEncoder};
use dxrag_sparse::{SparseIndex, SPARSE_DIR};

use crate::aggregate::aggregate_by_protocol;
use crate::rerank::Reranker;
use crate::retriever::HybridRetriever;

struct LoadedIndexes {
    dense: Arc<DenseIndex>,
    sparse: Arc<SparseIndex>,
}

pub struct RetrievalContext {
    settings: Settings,
    index_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    reranker: Reranker,
    indexes: OnceCell<LoadedIndexes>,
}

impl RetrievalContext {
    pub fn new(settings: Settings, index_dir: PathBuf, embedder: Arc<dyn Embedder>, reranker: Reranker) -> Self {
        Self { settings, index_dir, embedder, reranker, indexes: OnceCell::new() }
    }

    /// Builds the embedder and reranker named by `settings`, with relative
    /// paths resolved against `base`. Indexes are not touched until `load`.
    pub fn from_settings(settings: Settings, base: &Path) -> Result<Self> {
        settings.validate()?;
        let embedder: Arc<dyn Embedder> = Arc::from(get_default_embedder(&settings.embed_model_dir(base))?);
        let reranker = build_reranker(&settings, base);
        let index_dir = settings.index_dir(base);
        Ok(Self::new(settings, index_dir, embedder, reranker))
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn embedder(&self) -> &dyn Embedder { self.embedder.as_ref() }

    pub fn is_ready(&self) -> bool { self.indexes.initialized() }

    /// Loads both indexes from the index dir. Concurrent callers share one
    /// load; a failed load leaves the context unready so it can be retried.
    pub async fn load(&self) -> Result<()> {
        let expected_dim = self.embedder.dim();
        self.indexes.get_or_try_init(|| load_indexes(&self.index_dir, expected_dim)).await?;
        Ok(())
    }

    /// Installs indexes built in-process instead of loading them from disk.
    pub fn install(&self, dense: DenseIndex, sparse: SparseIndex) -> Result<()> {
        check_alignment(&dense, &sparse, self.embedder.dim())?;
        self.indexes
            .set(LoadedIndexes { dense: Arc::new(dense), sparse: Arc::new(sparse) })
            .map_err(|_| Error::InvalidInput("retrieval indexes already loaded".into()))
    }

    pub fn retriever(&self) -> Result<HybridRetriever<Arc<DenseIndex>, Arc<SparseIndex>>> {
        let loaded = self.indexes.get().ok_or(Error::NotInitialized("retrieval indexes"))?;
        Ok(HybridRetriever::new(Arc::clone(&loaded.dense), Arc::clone(&loaded.sparse)).with_rrf_constant(self.settings.rrf_k))
    }

    /// Fused hybrid candidates for `query`, at most `k`.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>> {
        let retriever = self.retriever()?;
        let query_vector = self.embedder.embed_query(query)?;
        retriever.search(query, &query_vector, k)
    }

    /// Search, rerank and protocol aggregation with the configured limits.
    pub fn retrieve(&self, query: &str) -> Result<Vec<ScoredPassage>> {
        self.retrieve_top(query, self.settings.top_k)
    }

    /// `retrieve` with an explicit candidate limit in place of `top_k`.
    pub fn retrieve_top(&self, query: &str, top_k: usize) -> Result<Vec<ScoredPassage>> {
        let fused = self.search(query, top_k)?;
        let reranked = self.reranker.rerank(query, &fused, top_k);
        Ok(aggregate_by_protocol(&reranked, self.settings.top_protocols))
    }
}

async fn load_indexes(dir: &Path, expected_dim: usize) -> Result<LoadedIndexes> {
    let dense = load_index(dir).await?;
    let sparse = SparseIndex::open(&dir.join(SPARSE_DIR))?;
    check_alignment(&dense, &sparse, expected_dim)?;
    info!(passages = dense.len(), dim = dense.dim(), dir = %dir.display(), "retrieval indexes ready");
    Ok(LoadedIndexes { dense: Arc::new(dense), sparse: Arc::new(sparse) })
}

fn check_alignment(dense: &DenseIndex, sparse: &SparseIndex, expected_dim: usize) -> Result<()> {
    if dense.len() != sparse.len() {
        return Err(Error::IndexIntegrity(format!("dense index has {} passages, sparse index has {}", dense.len(), sparse.len())));
    }
    if !dense.is_empty() && dense.dim() != expected_dim {
        return Err(Error::IndexIntegrity(format!("index dim {} does not match embedder dim {expected_dim}", dense.dim())));
    }
    Ok(())
}

/// Cross-encoder reranker when enabled and loadable, otherwise disabled.
pub fn build_reranker(settings: &Settings, base: &Path) -> Reranker {
    if !settings.use_reranker {
        info!("reranking disabled by configuration");
        return Reranker::disabled();
    }
    let dir = settings.reranker_model_dir(base);
    match CrossEncoder::load(&dir) {
        Ok(model) => Reranker::new(Box::new(model)),
        Err(e) => {
            warn!(error = %e, dir = %dir.display(), "cross-encoder unavailable, reranking disabled");
            Reranker::disabled()
        }
    }
}

//! dxrag-hybrid
//!
//! Query-time pipeline: dense + sparse retrieval fused with RRF, optional
//! cross-encoder reranking, per-protocol aggregation and diagnosis ranking.

pub mod aggregate;
pub mod context;
pub mod diagnosis;
pub mod fusion;
pub mod pipeline;
pub mod rerank;
pub mod retriever;

pub use aggregate::aggregate_by_protocol;
pub use context::{build_reranker, RetrievalContext};
pub use diagnosis::RetrievalDiagnoser;
pub use fusion::{fuse, rrf_contribution, DEFAULT_RRF_K};
pub use pipeline::DiagnosisPipeline;
pub use rerank::Reranker;
pub use retriever::HybridRetriever;

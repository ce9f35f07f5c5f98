use std::sync::Arc;

use crate::types::{Diagnosis, ScoredPassage, TextRole};

/// Turns text into fixed-dimension, L2-normalized vectors.
///
/// Implementations must apply `role` before vectorizing: asymmetric models
/// lose most of their accuracy when queries are encoded like passages.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed(&self, texts: &[String], role: TextRole) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed(&[text.to_string()], TextRole::Query)?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for query"))
    }
}

pub trait DenseSearch: Send + Sync {
    fn search_vec(&self, query_vec: &[f32], k: usize) -> crate::Result<Vec<ScoredPassage>>;
}

pub trait SparseSearch: Send + Sync {
    fn search_text(&self, query: &str, k: usize) -> crate::Result<Vec<ScoredPassage>>;
}

impl<T: DenseSearch + ?Sized> DenseSearch for Arc<T> {
    fn search_vec(&self, query_vec: &[f32], k: usize) -> crate::Result<Vec<ScoredPassage>> {
        (**self).search_vec(query_vec, k)
    }
}

impl<T: SparseSearch + ?Sized> SparseSearch for Arc<T> {
    fn search_text(&self, query: &str, k: usize) -> crate::Result<Vec<ScoredPassage>> {
        (**self).search_text(query, k)
    }
}

/// Jointly scores `(query, passage)` pairs; higher is more relevant.
pub trait RelevanceModel: Send + Sync {
    fn score_pairs(&self, query: &str, passages: &[&str]) -> anyhow::Result<Vec<f32>>;
}

/// The downstream generation stage: ranked passages in, ranked diagnoses out.
pub trait DiagnosisGenerator: Send + Sync {
    fn generate(
        &self,
        symptoms: &str,
        passages: &[ScoredPassage],
        top_n: usize,
    ) -> anyhow::Result<Vec<Diagnosis>>;
}

use std::sync::Arc;
use tracing::{debug, info, warn};

use dxrag_core::traits::DenseSearch;
use dxrag_core::{Error, Passage, Result, ScoredPassage};

const NORM_TOLERANCE: f32 = 1e-3;

/// Flat inner-product index. Slot `i` holds the vector of `passages[i]`;
/// an empty slot (a null vector row on disk) is never returned.
#[derive(Debug, Clone)]
pub struct DenseIndex {
    dim: usize,
    slots: Vec<Option<Vec<f32>>>,
    passages: Vec<Arc<Passage>>,
}

impl DenseIndex {
    pub fn build(vectors: Vec<Vec<f32>>, passages: Vec<Passage>) -> Result<Self> {
        Self::from_slots(vectors.into_iter().map(Some).collect(), passages)
    }

    pub fn from_slots(slots: Vec<Option<Vec<f32>>>, passages: Vec<Passage>) -> Result<Self> {
        if slots.len() != passages.len() {
            return Err(Error::IndexIntegrity(format!(
                "{} vectors for {} passages",
                slots.len(),
                passages.len()
            )));
        }
        let dim = slots.iter().flatten().map(Vec::len).next().unwrap_or(0);
        if let Some((pos, v)) = slots.iter().enumerate().find_map(|(i, s)| s.as_ref().filter(|v| v.len() != dim).map(|v| (i, v))) {
            return Err(Error::IndexIntegrity(format!("vector {pos} has {} dims, expected {dim}", v.len())));
        }
        let off_norm = slots
            .iter()
            .flatten()
            .filter(|v| (v.iter().map(|x| x * x).sum::<f32>().sqrt() - 1.0).abs() > NORM_TOLERANCE)
            .count();
        if off_norm > 0 {
            warn!(off_norm, "vectors are not L2-normalized; scores are not cosine similarities");
        }
        info!(vectors = slots.len(), dim, "dense index built");
        Ok(Self { dim, slots, passages: passages.into_iter().map(Arc::new).collect() })
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn len(&self) -> usize { self.slots.len() }

    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    pub fn passages(&self) -> &[Arc<Passage>] { &self.passages }

    pub fn slots(&self) -> &[Option<Vec<f32>>] { &self.slots }

    /// Up to `k` passages by descending inner product; equal scores keep
    /// ordinal order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        if k == 0 || self.slots.iter().all(Option::is_none) {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(Error::InvalidInput(format!(
                "query vector has {} dims, index has {}",
                query.len(),
                self.dim
            )));
        }
        let mut scored: Vec<(usize, f32)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(pos, slot)| slot.as_ref().map(|v| (pos, dot(v, query))))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        debug!(hits = scored.len(), k, "dense search");
        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (pos, score))| ScoredPassage::new(Arc::clone(&self.passages[pos])).with_dense(score, rank))
            .collect())
    }
}

impl DenseSearch for DenseIndex {
    fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        self.search(query_vec, k)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

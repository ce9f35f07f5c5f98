//! Reciprocal Rank Fusion of the dense and sparse candidate lists.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use dxrag_core::{FusionKey, ScoredPassage, Scores};

pub const DEFAULT_RRF_K: u32 = 60;

/// Score a single list position contributes; `rank` is 0-based.
pub fn rrf_contribution(rank: usize, rrf_constant: u32) -> f64 {
    1.0 / (f64::from(rrf_constant) + rank as f64 + 1.0)
}

/// Fuses the two ranked lists into at most `k` passages ordered by summed
/// RRF score.
///
/// The first occurrence of a passage (dense list first) is kept as the
/// payload; later occurrences only add their contribution and fill in the
/// modality scores the first one lacked. Ties keep first-appearance order.
pub fn fuse(dense: &[ScoredPassage], sparse: &[ScoredPassage], k: usize, rrf_constant: u32) -> Vec<ScoredPassage> {
    if k == 0 { return Vec::new(); }

    let mut slot_of: HashMap<FusionKey, usize> = HashMap::with_capacity(dense.len() + sparse.len());
    let mut fused: Vec<(ScoredPassage, f64)> = Vec::with_capacity(dense.len() + sparse.len());

    for list in [dense, sparse] {
        for (rank, hit) in list.iter().enumerate() {
            let contribution = rrf_contribution(rank, rrf_constant);
            match slot_of.entry(hit.fusion_key()) {
                Entry::Occupied(slot) => {
                    let (canonical, score) = &mut fused[*slot.get()];
                    *score += contribution;
                    merge_modalities(&mut canonical.scores, &hit.scores);
                }
                Entry::Vacant(slot) => {
                    slot.insert(fused.len());
                    fused.push((hit.clone(), contribution));
                }
            }
        }
    }

    // stable: equal scores stay in insertion order
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused.truncate(k);
    fused.into_iter().map(|(hit, score)| hit.with_rrf(score)).collect()
}

fn merge_modalities(into: &mut Scores, from: &Scores) {
    if into.dense_score.is_none() {
        into.dense_score = from.dense_score;
        into.dense_rank = from.dense_rank;
    }
    if into.sparse_score.is_none() {
        into.sparse_score = from.sparse_score;
        into.sparse_rank = from.sparse_rank;
    }
}

use std::collections::HashSet;
use std::sync::Arc;

use dxrag_core::{Passage, ScoredPassage};
use dxrag_hybrid::{fuse, DEFAULT_RRF_K};
use proptest::prelude::*;

fn hits(keys: &[(u8, u8)]) -> Vec<ScoredPassage> {
    keys.iter()
        .map(|&(protocol, chunk)| {
            ScoredPassage::new(Arc::new(Passage {
                protocol_id: format!("p{protocol}"),
                source_file: String::new(),
                title: String::new(),
                chunk_index: usize::from(chunk),
                text: String::new(),
                icd_codes: Vec::new(),
            }))
        })
        .collect()
}

fn key_list() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((0u8..6, 0u8..4), 0..20)
}

proptest! {
    #[test]
    fn output_has_unique_keys(dense in key_list(), sparse in key_list(), k in 0usize..30) {
        let fused = fuse(&hits(&dense), &hits(&sparse), k, DEFAULT_RRF_K);
        let unique: HashSet<_> = fused.iter().map(ScoredPassage::fusion_key).collect();
        prop_assert_eq!(unique.len(), fused.len());
    }

    #[test]
    fn output_is_truncated_and_sorted(dense in key_list(), sparse in key_list(), k in 0usize..30) {
        let fused = fuse(&hits(&dense), &hits(&sparse), k, DEFAULT_RRF_K);
        let distinct: HashSet<_> = dense.iter().chain(sparse.iter()).collect();
        prop_assert_eq!(fused.len(), k.min(distinct.len()));
        for pair in fused.windows(2) {
            prop_assert!(pair[0].scores.rrf_score >= pair[1].scores.rrf_score);
        }
    }

    #[test]
    fn fusion_is_deterministic(dense in key_list(), sparse in key_list(), k in 1usize..30, rrf in 0u32..100) {
        let (d, s) = (hits(&dense), hits(&sparse));
        prop_assert_eq!(fuse(&d, &s, k, rrf), fuse(&d, &s, k, rrf));
    }
}

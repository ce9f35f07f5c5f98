use dxrag_core::traits::RelevanceModel;
use dxrag_core::ScoredPassage;
use tracing::{debug, warn};

/// Second-stage ordering of fused candidates.
///
/// A disabled reranker, or one whose model fails, hands back the fused order
/// truncated to `top_k`. Reranking never fails the query.
pub struct Reranker {
    model: Option<Box<dyn RelevanceModel>>,
}

impl Reranker {
    pub fn new(model: Box<dyn RelevanceModel>) -> Self { Self { model: Some(model) } }

    pub fn disabled() -> Self { Self { model: None } }

    pub fn rerank(&self, query: &str, candidates: &[ScoredPassage], top_k: usize) -> Vec<ScoredPassage> {
        if candidates.is_empty() || top_k == 0 { return Vec::new(); }
        let Some(model) = &self.model else { return passthrough(candidates, top_k) };

        let texts: Vec<&str> = candidates.iter().map(|c| c.passage.text.as_str()).collect();
        let scores = match model.score_pairs(query, &texts) {
            Ok(scores) if scores.len() == candidates.len() => scores,
            Ok(scores) => {
                warn!(expected = candidates.len(), got = scores.len(), "reranker returned wrong score count, keeping fused order");
                return passthrough(candidates, top_k);
            }
            Err(e) => {
                warn!(error = %e, "reranker failed, keeping fused order");
                return passthrough(candidates, top_k);
            }
        };

        let mut reranked: Vec<ScoredPassage> = candidates
            .iter()
            .zip(scores)
            .map(|(c, s)| c.clone().with_reranker(s))
            .collect();
        reranked.sort_by(|a, b| {
            let (sa, sb) = (a.scores.reranker_score.unwrap_or(f32::MIN), b.scores.reranker_score.unwrap_or(f32::MIN));
            sb.total_cmp(&sa)
        });
        reranked.truncate(top_k);
        debug!(candidates = candidates.len(), kept = reranked.len(), "reranked");
        reranked
    }
}

fn passthrough(candidates: &[ScoredPassage], top_k: usize) -> Vec<ScoredPassage> {
    candidates.iter().take(top_k).cloned().collect()
}

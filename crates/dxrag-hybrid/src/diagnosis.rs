use std::collections::{HashMap, HashSet};

use dxrag_core::traits::DiagnosisGenerator;
use dxrag_core::{Diagnosis, ScoredPassage};
use tracing::debug;

const DEFAULT_BASE_SCORE: f64 = 0.5;
const SCORE_EXPONENT: f64 = 1.2;
/// Codes with a subcategory (`J18.9` rather than `J18`) are more specific.
const SPECIFIC_CODE_BONUS: f64 = 1.1;
const FREQUENCY_WEIGHT: f64 = 0.05;
const FREQUENCY_CAP: usize = 10;
const SNIPPET_CHARS: usize = 150;

/// Ranks the ICD codes attached to the retrieved passages without a
/// language model.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetrievalDiagnoser;

struct CodeTally<'a> {
    code: &'a str,
    score: f64,
    passages: usize,
    first: &'a ScoredPassage,
}

fn base_score(p: &ScoredPassage) -> f64 {
    let s = &p.scores;
    s.rrf_score
        .or(s.dense_score.map(f64::from))
        .or(s.sparse_score.map(f64::from))
        .unwrap_or(DEFAULT_BASE_SCORE)
}

impl RetrievalDiagnoser {
    pub fn rank(&self, passages: &[ScoredPassage], top_n: usize) -> Vec<Diagnosis> {
        let mut slot_of: HashMap<&str, usize> = HashMap::new();
        let mut tallies: Vec<CodeTally<'_>> = Vec::new();

        for p in passages {
            let weight = base_score(p).max(0.0).powf(SCORE_EXPONENT);
            let mut seen: HashSet<&str> = HashSet::new();
            // Every listing of a code adds weight; support counts passages.
            for code in p.passage.icd_codes.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
                let idx = *slot_of.entry(code).or_insert_with(|| {
                    tallies.push(CodeTally { code, score: 0.0, passages: 0, first: p });
                    tallies.len() - 1
                });
                tallies[idx].score += weight;
                if seen.insert(code) {
                    tallies[idx].passages += 1;
                }
            }
        }

        let mut ranked: Vec<(f64, &CodeTally<'_>)> = tallies
            .iter()
            .map(|t| {
                let specificity = if t.code.contains('.') { SPECIFIC_CODE_BONUS } else { 1.0 };
                let frequency = 1.0 + FREQUENCY_WEIGHT * t.passages.min(FREQUENCY_CAP) as f64;
                (t.score * specificity * frequency, t)
            })
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        debug!(codes = ranked.len(), top_n, "ranked diagnosis codes");

        ranked
            .into_iter()
            .take(top_n)
            .enumerate()
            .map(|(i, (_, t))| describe(i + 1, t))
            .collect()
    }
}

fn describe(rank: usize, tally: &CodeTally<'_>) -> Diagnosis {
    let passage = &tally.first.passage;
    let diagnosis = [passage.title.trim(), passage.source_file.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or("Unknown diagnosis")
        .to_string();
    let snippet: String = passage.text.trim().chars().take(SNIPPET_CHARS).collect();
    let source = if passage.source_file.is_empty() { passage.protocol_id.as_str() } else { passage.source_file.as_str() };
    Diagnosis {
        rank,
        diagnosis,
        icd10_code: tally.code.to_string(),
        explanation: format!("Supported by protocol {source} ({} matching passages): {snippet}...", tally.passages),
    }
}

impl DiagnosisGenerator for RetrievalDiagnoser {
    fn generate(&self, _symptoms: &str, passages: &[ScoredPassage], top_n: usize) -> anyhow::Result<Vec<Diagnosis>> {
        Ok(self.rank(passages, top_n))
    }
}

use std::fs;
use tempfile::TempDir;

use dxrag_core::config::{Config, Settings};
use dxrag_core::corpus::{ChunkingConfig, CorpusProcessor};
use dxrag_core::{Error, Passage, PassageRecord, ScoredPassage};
use figment::providers::{Format, Toml};
use figment::Figment;

fn long_text(prefix: &str, n: usize) -> String {
    (0..n).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>().join(" ")
}

#[test]
fn process_directory_reads_json_array_and_jsonl() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let a = serde_json::json!([
        { "protocol_id": "p1", "source_file": "p1.pdf", "title": "Pneumonia", "icd_codes": ["J18.9"], "text": long_text("cough", 40) },
        { "protocol_id": "empty", "text": "   " }
    ]);
    fs::write(dir.join("a.json"), a.to_string()).unwrap();
    let line = serde_json::json!({ "protocol_id": "p2", "text": long_text("fever", 40) });
    fs::write(dir.join("b.jsonl"), format!("{line}\n\n")).unwrap();
    fs::write(dir.join("ignored.txt"), "not a protocol").unwrap();

    let processor = CorpusProcessor::new(ChunkingConfig { chunk_size: 600, chunk_overlap: 100 });
    let passages = processor.process_directory(dir).expect("process");

    assert_eq!(passages.len(), 2, "one chunk per non-empty protocol");
    assert_eq!(passages[0].protocol_id, "p1");
    assert_eq!(passages[0].icd_codes, vec!["J18.9".to_string()]);
    assert_eq!(passages[0].chunk_index, 0);
    assert_eq!(passages[1].protocol_id, "p2");
    assert!(passages[1].title.is_empty());
}

#[test]
fn passage_record_accepts_both_field_spellings() {
    let legacy: PassageRecord = serde_json::from_value(serde_json::json!({
        "protocol_id": "p9", "chunk_idx": 3, "chunk": "legacy body"
    }))
    .unwrap();
    let p = Passage::from(legacy);
    assert_eq!(p.chunk_index, 3);
    assert_eq!(p.text, "legacy body");
    assert!(p.icd_codes.is_empty());

    let current: PassageRecord = serde_json::from_value(serde_json::json!({
        "protocol_id": "p9", "text": "current body", "icd_codes": ["A00"]
    }))
    .unwrap();
    let p = Passage::from(current);
    assert_eq!(p.chunk_index, 0, "missing position defaults to 0");
    assert_eq!(p.text, "current body");
    assert_eq!(p.fusion_key(), ("p9".to_string(), 0));
}

#[test]
fn relevance_prefers_reranker_then_rrf() {
    let p = std::sync::Arc::new(Passage::from(
        serde_json::from_value::<PassageRecord>(serde_json::json!({ "protocol_id": "x" })).unwrap(),
    ));
    let base = ScoredPassage::new(p);
    assert_eq!(base.relevance(), 0.0);
    let fused = base.clone().with_rrf(0.25);
    assert!((fused.relevance() - 0.25).abs() < 1e-12);
    let reranked = fused.with_reranker(2.0);
    assert!((reranked.relevance() - 2.0).abs() < 1e-12);
    assert!(base.scores.rrf_score.is_none(), "builders do not touch the original value");
}

#[test]
fn settings_defaults_and_overrides() {
    let config = Config::from_figment(Figment::new());
    assert_eq!(config.settings().unwrap(), Settings::default());

    let config = Config::from_figment(Figment::new().merge(Toml::string(
        "[retrieval]\ntop_k = 20\nuse_reranker = false\n",
    )));
    let settings = config.settings().unwrap();
    assert_eq!(settings.top_k, 20);
    assert!(!settings.use_reranker);
    assert_eq!(settings.rrf_k, 60);
}

#[test]
fn settings_reject_overlap_not_smaller_than_chunk() {
    let config = Config::from_figment(Figment::new().merge(Toml::string(
        "[retrieval]\nchunk_size = 100\nchunk_overlap = 100\n",
    )));
    assert!(config.settings().is_err());
}

#[test]
fn unavailable_errors_are_classified() {
    assert!(Error::NotInitialized("indexes").is_unavailable());
    assert!(Error::IndexIntegrity("count".into()).is_unavailable());
    assert!(!Error::InvalidInput("dim".into()).is_unavailable());
}

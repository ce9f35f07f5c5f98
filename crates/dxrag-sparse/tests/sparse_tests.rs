use dxrag_core::{Error, Passage};
use dxrag_sparse::SparseIndex;

fn passage(protocol: &str, idx: usize, text: &str, codes: &[&str]) -> Passage {
    Passage {
        protocol_id: protocol.to_string(),
        source_file: format!("{protocol}.pdf"),
        title: format!("Protocol {protocol}"),
        chunk_index: idx,
        text: text.to_string(),
        icd_codes: codes.iter().map(|c| c.to_string()).collect(),
    }
}

fn corpus() -> Vec<Passage> {
    vec![
        passage("pneumonia", 0, "Community acquired pneumonia: fever, productive cough, code J18.9.", &["J18.9"]),
        passage("pneumonia", 1, "Chest x-ray confirms infiltrates in pneumonia.", &["J18.9"]),
        passage("migraine", 0, "Migraine presents with unilateral headache and photophobia.", &["G43.9"]),
        passage("fracture", 0, "Femur fracture after trauma requires immobilization.", &["S72.0"]),
    ]
}

#[test]
fn ranks_matching_passages_and_drops_the_rest() {
    let index = SparseIndex::build(&corpus()).expect("build");
    assert_eq!(index.len(), 4);

    let hits = index.search("Pneumonia, FEVER?", 10).expect("search");
    assert_eq!(hits.len(), 2, "only passages sharing a token are returned");
    assert_eq!(hits[0].passage.protocol_id, "pneumonia");
    assert_eq!(hits[0].passage.chunk_index, 0, "two matching terms beat one");
    assert_eq!(hits[0].scores.sparse_rank, Some(0));
    assert_eq!(hits[1].scores.sparse_rank, Some(1));
    assert!(hits[0].scores.sparse_score > hits[1].scores.sparse_score);
    assert!(hits.iter().all(|h| h.scores.sparse_score.unwrap_or(0.0) > 0.0));
}

#[test]
fn stored_fields_round_trip_through_hits() {
    let index = SparseIndex::build(&corpus()).unwrap();
    let hits = index.search("photophobia", 3).unwrap();
    assert_eq!(hits.len(), 1);
    let p = &hits[0].passage;
    assert_eq!(p.protocol_id, "migraine");
    assert_eq!(p.title, "Protocol migraine");
    assert_eq!(p.source_file, "migraine.pdf");
    assert_eq!(p.icd_codes, vec!["G43.9".to_string()]);
    assert!(p.text.starts_with("Migraine presents"));
}

#[test]
fn icd_codes_in_text_match_exactly() {
    let index = SparseIndex::build(&corpus()).unwrap();
    let hits = index.search("j18.9", 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].passage.chunk_index, 0);
}

#[test]
fn no_overlap_punctuation_and_zero_k_give_empty_results() {
    let index = SparseIndex::build(&corpus()).unwrap();
    assert!(index.search("appendicitis nausea", 5).unwrap().is_empty());
    assert!(index.search("?! ... ()", 5).unwrap().is_empty());
    assert!(index.search("fever", 0).unwrap().is_empty());
}

#[test]
fn truncates_to_k() {
    let index = SparseIndex::build(&corpus()).unwrap();
    let hits = index.search("pneumonia fracture migraine", 2).unwrap();
    assert_eq!(hits.len(), 2);
}

#[test]
fn create_then_open_from_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("sparse");
    SparseIndex::create(&dir, &corpus()).expect("create");
    let reopened = SparseIndex::open(&dir).expect("open");
    assert_eq!(reopened.len(), 4);
    assert_eq!(reopened.search("immobilization", 5).unwrap()[0].passage.protocol_id, "fracture");

    let err = SparseIndex::open(&tmp.path().join("missing")).err().expect("missing dir");
    assert!(matches!(err, Error::IndexIntegrity(_)));
}

use std::path::Path;
use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator};
use dxrag_core::{Error, Passage};
use dxrag_dense::schema::{build_vector_schema, METADATA_FILE, VECTOR_DB_DIR, VECTOR_TABLE};
use dxrag_dense::{load_index, save_index, write_metadata, DenseIndex};

fn passage(protocol: &str, idx: usize) -> Passage {
    Passage {
        protocol_id: protocol.to_string(),
        source_file: format!("{protocol}.pdf"),
        title: protocol.to_uppercase(),
        chunk_index: idx,
        text: format!("{protocol} passage {idx}"),
        icd_codes: vec!["J18.9".to_string()],
    }
}

fn unit(v: &[f32]) -> Vec<f32> {
    let n = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / n).collect()
}

fn sample_index() -> DenseIndex {
    DenseIndex::build(
        vec![unit(&[1.0, 0.0, 0.0]), unit(&[0.0, 1.0, 0.0]), unit(&[1.0, 1.0, 0.0])],
        vec![passage("a", 0), passage("b", 0), passage("c", 0)],
    )
    .expect("build")
}

#[test]
fn search_orders_by_inner_product_with_ranks() {
    let index = sample_index();
    let hits = index.search(&unit(&[1.0, 0.2, 0.0]), 2).expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].passage.protocol_id, "a");
    assert_eq!(hits[1].passage.protocol_id, "c");
    assert_eq!(hits[0].scores.dense_rank, Some(0));
    assert_eq!(hits[1].scores.dense_rank, Some(1));
    assert!(hits[0].scores.dense_score > hits[1].scores.dense_score);
}

#[test]
fn k_larger_than_index_returns_everything_and_zero_returns_nothing() {
    let index = sample_index();
    assert_eq!(index.search(&unit(&[0.0, 0.0, 1.0]), 10).unwrap().len(), 3);
    assert!(index.search(&unit(&[1.0, 0.0, 0.0]), 0).unwrap().is_empty());
}

#[test]
fn equal_scores_keep_ordinal_order() {
    let index = DenseIndex::build(
        vec![vec![0.0, 1.0], vec![0.0, 1.0], vec![1.0, 0.0]],
        vec![passage("x", 0), passage("y", 0), passage("z", 0)],
    )
    .unwrap();
    let hits = index.search(&[0.0, 1.0], 2).unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.passage.protocol_id.as_str()).collect();
    assert_eq!(ids, ["x", "y"]);
}

#[test]
fn empty_slots_are_skipped() {
    let index = DenseIndex::from_slots(
        vec![None, Some(vec![1.0, 0.0])],
        vec![passage("gone", 0), passage("kept", 0)],
    )
    .unwrap();
    let hits = index.search(&[1.0, 0.0], 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].passage.protocol_id, "kept");
    assert_eq!(hits[0].scores.dense_rank, Some(0));
}

#[test]
fn misaligned_build_and_bad_query_are_rejected() {
    let err = DenseIndex::build(vec![vec![1.0, 0.0]], vec![passage("a", 0), passage("b", 0)]).unwrap_err();
    assert!(matches!(err, Error::IndexIntegrity(_)));

    let err = DenseIndex::build(vec![vec![1.0, 0.0], vec![1.0]], vec![passage("a", 0), passage("b", 0)]).unwrap_err();
    assert!(matches!(err, Error::IndexIntegrity(_)));

    let err = sample_index().search(&[1.0, 0.0], 3).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn save_then_load_preserves_alignment() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let index = sample_index();
    save_index(tmp.path(), &index).await?;

    let loaded = load_index(tmp.path()).await?;
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.dim(), 3);
    let query = unit(&[0.0, 1.0, 0.1]);
    let before: Vec<_> = index.search(&query, 3)?.into_iter().map(|h| h.fusion_key()).collect();
    let after: Vec<_> = loaded.search(&query, 3)?.into_iter().map(|h| h.fusion_key()).collect();
    assert_eq!(before, after);
    Ok(())
}

#[tokio::test]
async fn load_rejects_missing_or_mismatched_metadata() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let err = load_index(tmp.path()).await.unwrap_err();
    assert!(matches!(err, Error::IndexIntegrity(_)), "nothing on disk: {err}");

    save_index(tmp.path(), &sample_index()).await?;
    write_metadata(&tmp.path().join(METADATA_FILE), &[passage("a", 0), passage("b", 0)])?;
    let err = load_index(tmp.path()).await.unwrap_err();
    assert!(matches!(err, Error::IndexIntegrity(_)), "short metadata: {err}");

    std::fs::remove_file(tmp.path().join(METADATA_FILE))?;
    let err = load_index(tmp.path()).await.unwrap_err();
    assert!(matches!(err, Error::IndexIntegrity(_)), "metadata removed: {err}");
    Ok(())
}

/// Writes a vectors table with arbitrary positions next to two passages of metadata.
async fn write_raw_store(dir: &Path, positions: &[i32]) -> anyhow::Result<()> {
    let schema = build_vector_schema(3);
    let vectors = positions.iter().map(|_| Some(unit(&[1.0, 0.0, 0.0]).into_iter().map(Some).collect::<Vec<_>>()));
    let batch = RecordBatch::try_new(schema.clone(), vec![
        Arc::new(Int32Array::from(positions.to_vec())),
        Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, 3)),
    ])?;
    let db_path = dir.join(VECTOR_DB_DIR);
    std::fs::create_dir_all(&db_path)?;
    let db = lancedb::connect(db_path.to_string_lossy().as_ref()).execute().await?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    db.create_table(VECTOR_TABLE, reader).execute().await?;
    write_metadata(&dir.join(METADATA_FILE), &[passage("a", 0), passage("b", 0)])?;
    Ok(())
}

#[tokio::test]
async fn load_rejects_duplicate_vector_positions() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_raw_store(tmp.path(), &[0, 0]).await?;
    let err = load_index(tmp.path()).await.unwrap_err();
    assert!(matches!(err, Error::IndexIntegrity(ref m) if m.contains("duplicate")), "{err}");
    Ok(())
}

#[tokio::test]
async fn load_rejects_positions_past_the_metadata() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_raw_store(tmp.path(), &[0, 5]).await?;
    let err = load_index(tmp.path()).await.unwrap_err();
    assert!(matches!(err, Error::IndexIntegrity(ref m) if m.contains("outside metadata")), "{err}");

    let negative = tempfile::tempdir()?;
    write_raw_store(negative.path(), &[-1, 1]).await?;
    let err = load_index(negative.path()).await.unwrap_err();
    assert!(matches!(err, Error::IndexIntegrity(_)), "{err}");
    Ok(())
}

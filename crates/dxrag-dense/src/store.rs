//! Persistence of the dense index.
//!
//! Vectors go to a lancedb table (`position`, `vector`) under
//! `<dir>/dense.lance`; passages go to `<dir>/metadata.json`. Loading refuses
//! anything that is not a one-to-one positional match between the two.

use arrow_array::cast::AsArray;
use arrow_array::{Array, FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator};
use arrow_schema::ArrowError;
use futures::TryStreamExt;
use lancedb::connect;
use lancedb::query::ExecutableQuery;
use std::fs;
use std::path::Path;
use tracing::info;

use dxrag_core::{Error, Passage, PassageRecord, Result};

use crate::index::DenseIndex;
use crate::schema::{build_vector_schema, METADATA_FILE, VECTOR_DB_DIR, VECTOR_TABLE};

const BATCH_SIZE: usize = 1000;

pub fn write_metadata(path: &Path, passages: &[Passage]) -> Result<()> {
    if let Some(parent) = path.parent() { fs::create_dir_all(parent)?; }
    let file = fs::File::create(path)?;
    serde_json::to_writer(std::io::BufWriter::new(file), passages)?;
    Ok(())
}

/// Read passage records, accepting every historical field spelling.
pub fn read_metadata(path: &Path) -> Result<Vec<Passage>> {
    if !path.exists() {
        return Err(Error::IndexIntegrity(format!("metadata file missing: {}", path.display())));
    }
    let records: Vec<PassageRecord> = serde_json::from_reader(std::io::BufReader::new(fs::File::open(path)?))?;
    Ok(records.into_iter().map(Passage::from).collect())
}

/// Replace whatever dense artifacts live in `dir` with `index`.
pub async fn save_index(dir: &Path, index: &DenseIndex) -> Result<()> {
    if index.is_empty() {
        return Err(Error::InvalidInput("refusing to save an empty dense index".into()));
    }
    let dim = i32::try_from(index.dim()).map_err(Error::operation)?;
    let db_path = dir.join(VECTOR_DB_DIR);
    if db_path.exists() { fs::remove_dir_all(&db_path)?; }
    fs::create_dir_all(&db_path)?;

    let schema = build_vector_schema(dim);
    let mut batches: Vec<std::result::Result<RecordBatch, ArrowError>> = Vec::new();
    for (chunk_no, chunk) in index.slots().chunks(BATCH_SIZE).enumerate() {
        let offset = chunk_no * BATCH_SIZE;
        let positions = (offset..offset + chunk.len())
            .map(|p| i32::try_from(p).map_err(Error::operation))
            .collect::<Result<Vec<i32>>>()?;
        let vectors: Vec<Option<Vec<Option<f32>>>> = chunk.iter().map(|s| s.as_ref().map(|v| v.iter().map(|&x| Some(x)).collect())).collect();
        let batch = RecordBatch::try_new(schema.clone(), vec![
            std::sync::Arc::new(Int32Array::from(positions)),
            std::sync::Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
        ])
        .map_err(Error::operation)?;
        batches.push(Ok(batch));
    }

    let db = connect(db_path.to_string_lossy().as_ref()).execute().await.map_err(Error::operation)?;
    let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));
    db.create_table(VECTOR_TABLE, reader).execute().await.map_err(Error::operation)?;
    write_metadata(&dir.join(METADATA_FILE), &index.passages().iter().map(|p| p.as_ref().clone()).collect::<Vec<_>>())?;
    info!(vectors = index.len(), dim = index.dim(), dir = %dir.display(), "dense index saved");
    Ok(())
}

/// Load vectors and metadata from `dir`, verifying positional alignment.
pub async fn load_index(dir: &Path) -> Result<DenseIndex> {
    let passages = read_metadata(&dir.join(METADATA_FILE))?;
    let db_path = dir.join(VECTOR_DB_DIR);
    if !db_path.exists() {
        return Err(Error::IndexIntegrity(format!("vector store missing: {}", db_path.display())));
    }
    let db = connect(db_path.to_string_lossy().as_ref()).execute().await.map_err(Error::operation)?;
    let names = db.table_names().execute().await.map_err(Error::operation)?;
    if !names.iter().any(|n| n == VECTOR_TABLE) {
        return Err(Error::IndexIntegrity(format!("table '{VECTOR_TABLE}' missing in {}", db_path.display())));
    }
    let table = db.open_table(VECTOR_TABLE).execute().await.map_err(Error::operation)?;

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; passages.len()];
    let mut seen = vec![false; passages.len()];
    let mut rows = 0usize;
    let mut stream = table.query().execute().await.map_err(Error::operation)?;
    while let Some(batch) = stream.try_next().await.map_err(Error::operation)? {
        let positions = batch
            .column_by_name("position")
            .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
            .ok_or_else(|| Error::IndexIntegrity("vectors.position column missing".into()))?;
        let vectors = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| Error::IndexIntegrity("vectors.vector column missing".into()))?;
        for i in 0..batch.num_rows() {
            rows += 1;
            let pos = usize::try_from(positions.value(i))
                .ok()
                .filter(|&p| p < passages.len())
                .ok_or_else(|| Error::IndexIntegrity(format!("vector position {} outside metadata ({} passages)", positions.value(i), passages.len())))?;
            if std::mem::replace(&mut seen[pos], true) {
                return Err(Error::IndexIntegrity(format!("duplicate vector position {pos}")));
            }
            if vectors.is_valid(i) {
                let list = vectors.value(i);
                slots[pos] = Some(list.as_primitive::<arrow_array::types::Float32Type>().values().to_vec());
            }
        }
    }
    if rows != passages.len() {
        return Err(Error::IndexIntegrity(format!("{rows} vectors for {} passages", passages.len())));
    }
    info!(vectors = rows, dir = %dir.display(), "dense index loaded");
    DenseIndex::from_slots(slots, passages)
}

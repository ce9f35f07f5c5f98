use std::path::PathBuf;

use anyhow::Context;
use dxrag_cli::{init_tracing, load_settings, take_flag};
use dxrag_core::corpus::{ChunkingConfig, CorpusProcessor};
use dxrag_core::TextRole;
use dxrag_dense::{save_index, DenseIndex};
use dxrag_embed::get_default_embedder;
use dxrag_sparse::{SparseIndex, SPARSE_DIR};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

const EMBED_BATCH: usize = 32;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let (settings, base) = load_settings()?;
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let index_dir = take_flag(&mut args, "--index-dir")?.map_or_else(|| settings.index_dir(&base), PathBuf::from);
    let corpus_dir = args.first().map_or_else(|| settings.corpus_dir(&base), PathBuf::from);

    println!("dxrag indexer\n=============");
    println!("Corpus directory: {}", corpus_dir.display());
    println!("Index directory:  {}", index_dir.display());

    let processor = CorpusProcessor::new(ChunkingConfig { chunk_size: settings.chunk_size, chunk_overlap: settings.chunk_overlap });
    let passages = processor.process_directory(&corpus_dir).with_context(|| format!("reading corpus {}", corpus_dir.display()))?;
    if passages.is_empty() {
        anyhow::bail!("no passages found under {}", corpus_dir.display());
    }

    let embedder = get_default_embedder(&settings.embed_model_dir(&base))?;
    let pb = ProgressBar::new(passages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passages ({percent}%)")?
            .progress_chars("#>-"),
    );
    let mut vectors = Vec::with_capacity(passages.len());
    for batch in passages.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
        vectors.extend(embedder.embed(&texts, TextRole::Passage)?);
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();

    std::fs::create_dir_all(&index_dir)?;
    SparseIndex::create(&index_dir.join(SPARSE_DIR), &passages)?;
    let passage_count = passages.len();
    let dense = DenseIndex::build(vectors, passages)?;
    tokio::runtime::Runtime::new()?.block_on(save_index(&index_dir, &dense))?;

    info!(passages = passage_count, dim = dense.dim(), "indexing complete");
    println!("\nIndexed {passage_count} passages (dim {}).", dense.dim());
    Ok(())
}

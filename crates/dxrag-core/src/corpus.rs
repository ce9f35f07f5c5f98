//! Offline corpus loading and chunking.
//!
//! Protocols are read from `*.json` (one object or an array) and `*.jsonl`
//! files, then split into overlapping word windows. The resulting passages
//! feed both the dense and the sparse index builders.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::types::Passage;

/// Chunks at or below this many characters carry too little text to index.
const MIN_CHUNK_CHARS: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolDocument {
    #[serde(default)]
    pub protocol_id: String,
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icd_codes: Vec<String>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 600, chunk_overlap: 100 }
    }
}

#[derive(Default)]
pub struct CorpusProcessor {
    chunking_config: ChunkingConfig,
}

impl CorpusProcessor {
    pub fn new(chunking_config: ChunkingConfig) -> Self {
        Self { chunking_config }
    }

    /// Load every protocol under `corpus_dir` and chunk it.
    pub fn process_directory(&self, corpus_dir: &Path) -> Result<Vec<Passage>> {
        let protocols = self.load_protocols(corpus_dir)?;
        let passages = self.chunk_protocols(&protocols);
        info!(protocols = protocols.len(), passages = passages.len(), "chunked corpus");
        Ok(passages)
    }

    /// `*.json` files first, then `*.jsonl`, each group in path order.
    pub fn load_protocols(&self, corpus_dir: &Path) -> Result<Vec<ProtocolDocument>> {
        let mut protocols = Vec::new();
        for path in list_files(corpus_dir, "json") {
            let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
            match value {
                serde_json::Value::Array(items) => {
                    for item in items {
                        protocols.push(serde_json::from_value(item)?);
                    }
                }
                other => protocols.push(serde_json::from_value(other)?),
            }
            debug!(path = %path.display(), "loaded protocol file");
        }
        for path in list_files(corpus_dir, "jsonl") {
            for line in fs::read_to_string(&path)?.lines() {
                let line = line.trim();
                if line.is_empty() { continue; }
                protocols.push(serde_json::from_str(line)?);
            }
            debug!(path = %path.display(), "loaded protocol file");
        }
        info!(count = protocols.len(), dir = %corpus_dir.display(), "loaded protocols");
        Ok(protocols)
    }

    pub fn chunk_protocols(&self, protocols: &[ProtocolDocument]) -> Vec<Passage> {
        let mut passages = Vec::new();
        for protocol in protocols {
            if protocol.text.trim().is_empty() { continue; }
            for (chunk_index, text) in self.chunk_text(&protocol.text).into_iter().enumerate() {
                passages.push(Passage {
                    protocol_id: protocol.protocol_id.clone(),
                    source_file: protocol.source_file.clone(),
                    title: protocol.title.clone(),
                    chunk_index,
                    text,
                    icd_codes: protocol.icd_codes.clone(),
                });
            }
        }
        passages
    }

    /// Word windows of `chunk_size` advancing by `chunk_size - chunk_overlap`.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let size = self.chunking_config.chunk_size.max(1);
        let step = size.saturating_sub(self.chunking_config.chunk_overlap).max(1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + size).min(words.len());
            chunks.push(words[start..end].join(" "));
            start += step;
        }
        chunks.retain(|c| c.trim().chars().count() > MIN_CHUNK_CHARS);
        chunks
    }
}

fn list_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some(extension))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn windows_overlap_and_keep_trailing_window() {
        let p = CorpusProcessor::new(ChunkingConfig { chunk_size: 20, chunk_overlap: 5 });
        let chunks = p.chunk_text(&words(30));
        // starts at 0 and 15; the second window holds the 15 trailing words
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("word0 "));
        assert!(chunks[1].starts_with("word15 "));
        assert!(chunks[1].ends_with("word29"));
    }

    #[test]
    fn short_chunks_are_dropped() {
        let p = CorpusProcessor::default();
        assert!(p.chunk_text("too short to matter").is_empty());
    }
}

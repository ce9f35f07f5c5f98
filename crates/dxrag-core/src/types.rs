//! Domain types shared by the dense, sparse and hybrid engines.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identity of "the same passage" across retrieval modalities.
pub type FusionKey = (String, usize);

/// A chunk of a clinical protocol that is independently indexed.
///
/// - `protocol_id`: document identity, used for fusion and aggregation
/// - `source_file`/`title`: display names of the source protocol
/// - `chunk_index`: position within the protocol
/// - `text`: the passage body
/// - `icd_codes`: diagnostic codes attached to the protocol at index time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub protocol_id: String,
    pub source_file: String,
    pub title: String,
    pub chunk_index: usize,
    pub text: String,
    pub icd_codes: Vec<String>,
}

impl Passage {
    pub fn fusion_key(&self) -> FusionKey {
        (self.protocol_id.clone(), self.chunk_index)
    }
}

/// On-disk passage record as written by the offline indexer.
///
/// Older artifacts store the body under `chunk` and the position under
/// `chunk_idx`; both spellings are accepted here and nowhere else.
#[derive(Debug, Clone, Deserialize)]
pub struct PassageRecord {
    pub protocol_id: String,
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub chunk_index: Option<usize>,
    #[serde(default)]
    pub chunk_idx: Option<usize>,
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub icd_codes: Option<Vec<String>>,
}

impl From<PassageRecord> for Passage {
    fn from(r: PassageRecord) -> Self {
        Self {
            protocol_id: r.protocol_id,
            source_file: r.source_file,
            title: r.title,
            chunk_index: r.chunk_index.or(r.chunk_idx).unwrap_or(0),
            text: r.chunk.or(r.text).unwrap_or_default(),
            icd_codes: r.icd_codes.unwrap_or_default(),
        }
    }
}

/// Which side of an asymmetric embedding model a text is encoded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    Query,
    Passage,
}

impl TextRole {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Query => "query: ",
            Self::Passage => "passage: ",
        }
    }
}

/// Per-query score annotations. Every field is optional because each
/// pipeline stage only fills in its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Scores {
    pub dense_score: Option<f32>,
    pub dense_rank: Option<usize>,
    pub sparse_score: Option<f32>,
    pub sparse_rank: Option<usize>,
    pub rrf_score: Option<f64>,
    pub reranker_score: Option<f32>,
    pub protocol_rank_score: Option<f64>,
}

/// A passage plus the scores attached to it during one query.
///
/// Stages never mutate a shared record; the `with_*` builders return a new
/// value and the passage itself stays behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPassage {
    pub passage: Arc<Passage>,
    pub scores: Scores,
}

impl ScoredPassage {
    pub fn new(passage: Arc<Passage>) -> Self {
        Self { passage, scores: Scores::default() }
    }

    pub fn with_dense(mut self, score: f32, rank: usize) -> Self {
        self.scores.dense_score = Some(score);
        self.scores.dense_rank = Some(rank);
        self
    }

    pub fn with_sparse(mut self, score: f32, rank: usize) -> Self {
        self.scores.sparse_score = Some(score);
        self.scores.sparse_rank = Some(rank);
        self
    }

    pub fn with_rrf(mut self, score: f64) -> Self {
        self.scores.rrf_score = Some(score);
        self
    }

    pub fn with_reranker(mut self, score: f32) -> Self {
        self.scores.reranker_score = Some(score);
        self
    }

    pub fn with_protocol_rank(mut self, score: f64) -> Self {
        self.scores.protocol_rank_score = Some(score);
        self
    }

    pub fn fusion_key(&self) -> FusionKey {
        self.passage.fusion_key()
    }

    /// Best available relevance: reranker score, else fusion score, else 0.
    pub fn relevance(&self) -> f64 {
        self.scores
            .reranker_score
            .map(f64::from)
            .or(self.scores.rrf_score)
            .unwrap_or(0.0)
    }
}

/// One ranked candidate diagnosis returned by the generation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub rank: usize,
    pub diagnosis: String,
    pub icd10_code: String,
    pub explanation: String,
}

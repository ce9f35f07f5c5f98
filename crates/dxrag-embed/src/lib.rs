//! dxrag-embed
//!
//! Candle-backed encoders: the asymmetric passage/query embedder used by the
//! dense index, a deterministic hashing embedder for tests and development,
//! and the cross-encoder relevance model used by the reranking stage.

use anyhow::{anyhow, ensure, Result};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};
use twox_hash::XxHash64;

use dxrag_core::traits::Embedder;
use dxrag_core::TextRole;

pub mod cross_encoder;
pub mod pool;
pub mod tokenize;

pub use cross_encoder::CrossEncoder;
pub use pool::{l2_normalize, masked_mean, masked_mean_l2};
pub use tokenize::{encode_batch, EncodedBatch};

/// Longest input the e5 encoders accept, special tokens included.
const MAX_LEN: usize = 512;
const BATCH_SIZE: usize = 16;
pub const FAKE_DIM: usize = 384;

/// Metal when built with the `metal` feature and a device is present, else CPU.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(dev) => {
                info!("device: Metal (MPS)");
                return dev;
            }
            Err(e) => warn!(error = %e, "Metal device unavailable, falling back to CPU"),
        }
    }
    info!("device: CPU");
    Device::Cpu
}

/// Token budget for a model with `max_position_embeddings` positions. XLM-R
/// reserves `padding_idx + 1 = 2` of them.
pub fn sequence_limit(max_position_embeddings: usize) -> usize {
    max_position_embeddings.saturating_sub(2).clamp(1, MAX_LEN)
}

pub struct EmbeddingModel { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize }

impl EmbeddingModel {
    /// Load an XLM-R encoder (`tokenizer.json`, `config.json`, `pytorch_model.bin`).
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(model_dir.join("config.json"))?)?;
        let weights: HashMap<String, Tensor> = candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        let dim = config.hidden_size;
        let max_len = sequence_limit(config.max_position_embeddings);
        info!(dim, max_len, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len })
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let batch = encode_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.attention_mask, &batch.token_type_ids, None, None, None)?;
        let rows = masked_mean_l2(&hidden, &batch.attention_mask)?.to_device(&Device::Cpu)?.to_vec2::<f32>()?;
        ensure!(rows.iter().all(|r| r.len() == self.dim), "model produced vectors of the wrong width (expected {})", self.dim);
        debug!(texts = texts.len(), ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(rows)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize { self.dim }
    fn embed(&self, texts: &[String], role: TextRole) -> Result<Vec<Vec<f32>>> {
        let prefixed: Vec<String> = texts.iter().map(|t| format!("{}{}", role.prefix(), t)).collect();
        let mut out = Vec::with_capacity(prefixed.len());
        for chunk in prefixed.chunks(BATCH_SIZE) {
            out.extend(self.embed_batch(chunk)?);
        }
        Ok(out)
    }
}

/// Hashing bag-of-words embedder: each lowercased word, with surrounding
/// punctuation trimmed, adds a hashed weight to one bucket. The role prefix
/// is hashed like a word so queries and passages never coincide.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let words = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty());
        for word in words {
            let mut hasher = XxHash64::with_seed(0);
            word.hash(&mut hasher);
            let h = hasher.finish();
            v[(h % self.dim as u64) as usize] += 0.5 + ((h >> 40) as f32) / ((1u64 << 24) as f32);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn embed(&self, texts: &[String], role: TextRole) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(&format!("{}{}", role.prefix(), t))).collect())
    }
}

/// `APP_USE_FAKE_EMBEDDINGS=1` selects the hashing embedder; otherwise the
/// model is loaded from `model_dir`.
pub fn get_default_embedder(model_dir: &Path) -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if use_fake {
        warn!(dim = FAKE_DIM, "using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(FAKE_DIM)));
    }
    Ok(Box::new(EmbeddingModel::load(model_dir)?))
}

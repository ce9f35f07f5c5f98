//! Cross-encoder: one relevance logit per `(query, passage)` pair.
//!
//! Two checkpoint layouts are supported, chosen by `model_type` in
//! `config.json`:
//! - `xlm-roberta` (e.g. the multilingual mMiniLM rerankers): HF
//!   `XLMRobertaForSequenceClassification`, with `roberta.*` weights and a
//!   `classifier.dense` / `classifier.out_proj` head
//! - `bert`: `BertModel` with a single `classifier` linear layer over CLS

use anyhow::{anyhow, bail, Context, Result};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaForSequenceClassification};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use dxrag_core::traits::RelevanceModel;

use crate::select_device;

pub const MAX_SEQ_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Bert,
    XlmRoberta,
}

impl Architecture {
    /// Reads `model_type`, falling back to the `architectures` list.
    pub fn from_config(config: &Value) -> Result<Self> {
        let model_type = config.get("model_type").and_then(Value::as_str).unwrap_or_default();
        match model_type {
            "xlm-roberta" | "roberta" => return Ok(Self::XlmRoberta),
            "bert" => return Ok(Self::Bert),
            _ => {}
        }
        let architectures: Vec<&str> = config
            .get("architectures")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if architectures.iter().any(|a| a.contains("Roberta")) {
            Ok(Self::XlmRoberta)
        } else if architectures.iter().any(|a| a.starts_with("Bert")) {
            Ok(Self::Bert)
        } else {
            bail!("unsupported cross-encoder model_type '{model_type}'")
        }
    }
}

/// Number of classifier outputs; relevance is read from the first.
fn num_labels(config: &Value) -> usize {
    config
        .get("id2label")
        .and_then(Value::as_object)
        .map_or(1, |labels| labels.len().max(1))
}

enum Backbone {
    Bert { bert: BertModel, classifier: Linear },
    XlmRoberta(XLMRobertaForSequenceClassification),
}

pub struct CrossEncoder {
    backbone: Backbone,
    tokenizer: Tokenizer,
    device: Device,
}

impl CrossEncoder {
    /// Load `config.json`, `tokenizer.json` and either `model.safetensors` or
    /// `pytorch_model.bin` from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading cross-encoder");
        let raw_config = std::fs::read_to_string(model_dir.join("config.json")).context("Failed to read cross-encoder config")?;
        let config: Value = serde_json::from_str(&raw_config).context("Failed to parse cross-encoder config")?;
        let architecture = Architecture::from_config(&config)?;

        let safetensors = model_dir.join("model.safetensors");
        let weights: HashMap<String, Tensor> = if safetensors.exists() {
            candle_core::safetensors::load(&safetensors, &device)?
        } else {
            candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?.into_iter().collect()
        };
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);

        let backbone = match architecture {
            Architecture::XlmRoberta => {
                let cfg: XLMRobertaConfig = serde_json::from_value(config.clone()).context("Invalid XLM-R config")?;
                Backbone::XlmRoberta(XLMRobertaForSequenceClassification::new(num_labels(&config), &cfg, vb)?)
            }
            Architecture::Bert => {
                let cfg: BertConfig = serde_json::from_value(config.clone()).context("Invalid BERT config")?;
                let bert = if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
                    BertModel::load(vb.pp("bert"), &cfg)?
                } else {
                    BertModel::load(vb.clone(), &cfg)?
                };
                let classifier = candle_nn::linear(cfg.hidden_size, num_labels(&config), vb.pp("classifier"))?;
                Backbone::Bert { bert, classifier }
            }
        };

        let tokenizer_path = model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        tokenizer
            .with_truncation(Some(TruncationParams { max_length: MAX_SEQ_LEN, ..Default::default() }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

        info!(?architecture, "cross-encoder loaded");
        Ok(Self { backbone, tokenizer, device })
    }

    fn score_pair(&self, query: &str, passage: &str) -> Result<f32> {
        let enc = self.tokenizer.encode((query, passage), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let ids = Tensor::new(enc.get_ids(), &self.device)?.unsqueeze(0)?;
        let type_ids = Tensor::new(enc.get_type_ids(), &self.device)?.unsqueeze(0)?;
        let mask = Tensor::new(enc.get_attention_mask(), &self.device)?.unsqueeze(0)?;
        let logits = match &self.backbone {
            Backbone::XlmRoberta(model) => model.forward(&ids, &mask, &type_ids)?,
            Backbone::Bert { bert, classifier } => {
                let hidden = bert.forward(&ids, &type_ids, Some(&mask))?;
                classifier.forward(&hidden.i((.., 0, ..))?)?
            }
        };
        logits
            .flatten_all()?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?
            .first()
            .copied()
            .ok_or_else(|| anyhow!("cross-encoder produced no logit"))
    }
}

impl RelevanceModel for CrossEncoder {
    fn score_pairs(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        let scores = passages.iter().map(|p| self.score_pair(query, p)).collect::<Result<Vec<_>>>()?;
        debug!(pairs = scores.len(), "scored query-passage pairs");
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_backbone_from_model_type() {
        let mmarco = json!({"model_type": "xlm-roberta", "architectures": ["XLMRobertaForSequenceClassification"]});
        assert_eq!(Architecture::from_config(&mmarco).unwrap(), Architecture::XlmRoberta);
        assert_eq!(Architecture::from_config(&json!({"model_type": "bert"})).unwrap(), Architecture::Bert);
        assert_eq!(
            Architecture::from_config(&json!({"architectures": ["BertForSequenceClassification"]})).unwrap(),
            Architecture::Bert
        );
        assert!(Architecture::from_config(&json!({"model_type": "t5"})).is_err());
    }

    #[test]
    fn single_logit_heads_by_default() {
        assert_eq!(num_labels(&json!({})), 1);
        assert_eq!(num_labels(&json!({"id2label": {"0": "LABEL_0"}})), 1);
        assert_eq!(num_labels(&json!({"id2label": {"0": "neg", "1": "pos"}})), 2);
    }
}

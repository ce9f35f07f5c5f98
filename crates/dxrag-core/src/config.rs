//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_RETRIEVAL__TOP_K=20`). Provides helpers to expand `~` and `${VAR}` and
//! to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new()
            .merge(Serialized::default("retrieval", Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Wrap an already assembled figment; retrieval defaults sit underneath it.
    pub fn from_figment(figment: Figment) -> Self {
        let figment = Figment::new()
            .merge(Serialized::default("retrieval", Settings::default()))
            .merge(figment);
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The validated `[retrieval]` section.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self.get("retrieval")?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Retrieval and indexing knobs. Every field has a default so an empty
/// config file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index_dir: String,
    pub corpus_dir: String,
    pub embed_model_dir: String,
    pub reranker_model_dir: String,
    pub use_reranker: bool,
    /// Passages retrieved per modality and kept after fusion.
    pub top_k: usize,
    pub top_n_diag: usize,
    pub top_protocols: usize,
    pub rrf_k: u32,
    /// Chunk window in words.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_dir: "data/index".to_string(),
            corpus_dir: "data/corpus".to_string(),
            embed_model_dir: "models/multilingual-e5-base".to_string(),
            reranker_model_dir: "models/cross-encoder".to_string(),
            use_reranker: true,
            top_k: 10,
            top_n_diag: 5,
            top_protocols: 5,
            rrf_k: 60,
            chunk_size: 600,
            chunk_overlap: 100,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> crate::Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "retrieval.chunk_overlap ({}) must be smaller than retrieval.chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub fn index_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.index_dir)
    }

    pub fn corpus_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.corpus_dir)
    }

    pub fn embed_model_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.embed_model_dir)
    }

    pub fn reranker_model_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.reranker_model_dir)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

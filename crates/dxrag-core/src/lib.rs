//! dxrag-core
//!
//! Shared passage types, typed errors, capability traits, configuration and
//! the offline corpus chunker used by the dense and sparse index builders.

pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{Diagnosis, FusionKey, Passage, PassageRecord, ScoredPassage, Scores, TextRole};

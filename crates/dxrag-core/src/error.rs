use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    /// A search was issued before the indexes were loaded.
    #[error("Not initialized: {0}")]
    NotInitialized(&'static str),

    /// Index artifacts are missing or not positionally aligned.
    #[error("Index integrity violated: {0}")]
    IndexIntegrity(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model call failed: {0}")]
    Model(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn operation(err: impl std::fmt::Display) -> Self {
        Self::Operation(err.to_string())
    }

    /// True for start-up failures that should surface as "service unavailable"
    /// rather than as a bad request or an empty answer.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotInitialized(_) | Self::IndexIntegrity(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

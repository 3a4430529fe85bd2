use std::path::PathBuf;

use labelscan_core::CorpusError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    ArtifactNotFound(PathBuf),

    #[error("corrupt artifact {path}: {reason}")]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("artifact {path} has format version {found}, expected {expected}")]
    IncompatibleVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("artifact pair mismatch: vectorizer from run {vectorizer}, model from run {model}")]
    MismatchedPair { vectorizer: String, model: String },

    #[error("invalid artifact pair: {0}")]
    InvalidPair(String),

    #[error("model expects {model} features but the vocabulary has {vocabulary} terms")]
    DimensionMismatch { vocabulary: usize, model: usize },

    #[error("corpus file not found: {0}")]
    CorpusNotFound(PathBuf),

    #[error("invalid corpus: {0}")]
    InvalidCorpus(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CorpusError> for StoreError {
    fn from(e: CorpusError) -> Self {
        Self::InvalidCorpus(e.to_string())
    }
}

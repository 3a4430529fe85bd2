use labelscan_core::CorpusError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("invalid corpus: {0}")]
    InvalidCorpus(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid training config: {0}")]
    InvalidConfig(String),

    #[error("prediction failure: {0}")]
    PredictionFailure(String),
}

impl From<CorpusError> for AiError {
    fn from(e: CorpusError) -> Self {
        Self::InvalidCorpus(e.to_string())
    }
}

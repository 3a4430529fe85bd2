use labelscan_ai::AiError;
use labelscan_core::{CatalogError, OcrError};
use labelscan_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("artifact error: {0}")]
    Store(#[from] StoreError),

    #[error("training error: {0}")]
    Training(#[from] AiError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),
}

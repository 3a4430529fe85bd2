//! OCR collaborator boundary.
//!
//! The core never inspects where an image came from. Callers wrap a file
//! path or an in-memory buffer in an [`ImageSource`] and hand it to a
//! [`TextExtractor`] backend.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("image not found: {0}")]
    ImageNotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can yield encoded image bytes (PNG, JPEG, ...).
pub trait ImageSource {
    /// Encoded image bytes.
    fn read_bytes(&self) -> Result<Cow<'_, [u8]>, OcrError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// An image stored on disk.
#[derive(Debug, Clone)]
pub struct ImageFile {
    path: PathBuf,
}

impl ImageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageSource for ImageFile {
    fn read_bytes(&self) -> Result<Cow<'_, [u8]>, OcrError> {
        if !self.path.exists() {
            return Err(OcrError::ImageNotFound(self.path.clone()));
        }
        Ok(Cow::Owned(std::fs::read(&self.path)?))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An image already held in memory (e.g. a camera capture).
#[derive(Debug, Clone)]
pub struct ImageBytes {
    bytes: Vec<u8>,
}

impl ImageBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl ImageSource for ImageBytes {
    fn read_bytes(&self) -> Result<Cow<'_, [u8]>, OcrError> {
        Ok(Cow::Borrowed(&self.bytes))
    }

    fn describe(&self) -> String {
        format!("<{} bytes in memory>", self.bytes.len())
    }
}

/// OCR backend: image in, raw text out. No accuracy contract.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, image: &dyn ImageSource) -> Result<String, OcrError>;
}

//! Tesseract OCR through its command-line binary.
//!
//! Image bytes are piped to `tesseract stdin stdout`, so no temp files are
//! needed and in-memory captures work the same as files on disk.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use labelscan_core::{ImageSource, OcrError, TextExtractor};
use tracing::debug;

/// Page segmentation mode 6: a single uniform block of text.
const DEFAULT_PSM: u8 = 6;

pub struct TesseractExtractor {
    binary: PathBuf,
    psm: u8,
}

impl TesseractExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            psm: DEFAULT_PSM,
        }
    }
}

impl Default for TesseractExtractor {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TextExtractor for TesseractExtractor {
    fn extract_text(&self, image: &dyn ImageSource) -> Result<String, OcrError> {
        let bytes = image.read_bytes()?;
        let psm = self.psm.to_string();

        let spawned = Command::new(&self.binary)
            .args(["stdin", "stdout", "--psm", &psm])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OcrError::BackendNotAvailable(format!(
                    "{} not found (install tesseract-ocr)",
                    self.binary.display()
                )));
            }
            Err(e) => return Err(OcrError::Io(e)),
        };

        // stdin is fed on its own thread while stdout drains.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::OcrFailed("tesseract stdin unavailable".into()))?;
        let (output, written) = std::thread::scope(|s| {
            let writer = s.spawn(move || stdin.write_all(&bytes));
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            (output, written)
        });
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::OcrFailed(format!(
                "tesseract failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }
        // Broken pipe after a clean exit: tesseract stopped reading early.
        if let Err(e) = written {
            debug!(error = %e, "tesseract closed stdin early");
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(image = %image.describe(), chars = text.len(), "tesseract finished");
        Ok(text)
    }
}

//! Versioned JSON envelopes for fitted artifacts.
//!
//! Every artifact is stored as `{kind, format_version, run_id, created_at,
//! payload}`. Writes go to a temp file in the destination directory and are
//! renamed into place, so a reader never sees a half-written file.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use ring::digest;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::StoreError;

/// Envelope layout version written by this build.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Vectorizer,
    Model,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vectorizer => f.write_str("vectorizer"),
            Self::Model => f.write_str("model"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact<T> {
    pub kind: ArtifactKind,
    pub format_version: u32,
    /// Shared by every artifact produced by the same training run.
    pub run_id: String,
    /// RFC 3339 timestamp of the training run.
    pub created_at: String,
    pub payload: T,
}

impl<T> Artifact<T> {
    pub fn new(
        kind: ArtifactKind,
        run_id: impl Into<String>,
        created_at: impl Into<String>,
        payload: T,
    ) -> Self {
        Self {
            kind,
            format_version: FORMAT_VERSION,
            run_id: run_id.into(),
            created_at: created_at.into(),
            payload,
        }
    }
}

/// Only the fields needed to reject an artifact before decoding its payload.
#[derive(Deserialize)]
struct Header {
    kind: ArtifactKind,
    format_version: u32,
}

/// Atomically write `artifact` to `path`, creating parent directories.
pub fn save_artifact<T: Serialize>(artifact: &Artifact<T>, path: &Path) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(artifact)?;
    write_atomic(path, &bytes)?;
    info!(
        path = %path.display(),
        kind = %artifact.kind,
        run_id = %artifact.run_id,
        "saved artifact"
    );
    Ok(())
}

/// Write `bytes` to a temp file beside `path`, sync it, and rename it over
/// `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        writer.write_all(bytes)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Read an artifact of the expected kind from `path`.
pub fn load_artifact<T: DeserializeOwned>(
    path: &Path,
    expected: ArtifactKind,
) -> Result<Artifact<T>, StoreError> {
    if !path.exists() {
        return Err(StoreError::ArtifactNotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;
    let corrupt = |reason: String| StoreError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason,
    };

    let header: Header = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
    if header.format_version != FORMAT_VERSION {
        return Err(StoreError::IncompatibleVersion {
            path: path.to_path_buf(),
            found: header.format_version,
            expected: FORMAT_VERSION,
        });
    }
    if header.kind != expected {
        return Err(corrupt(format!(
            "expected a {expected} artifact, found {}",
            header.kind
        )));
    }

    let artifact: Artifact<T> =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
    debug!(
        path = %path.display(),
        kind = %artifact.kind,
        run_id = %artifact.run_id,
        "loaded artifact"
    );
    Ok(artifact)
}

/// Hex SHA-256 over the given byte strings, in order.
pub fn fingerprint(parts: &[&[u8]]) -> String {
    let mut ctx = digest::Context::new(&digest::SHA256);
    for part in parts {
        ctx.update(part);
    }
    ctx.finish()
        .as_ref()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

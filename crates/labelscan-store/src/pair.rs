//! The vectorizer and model of one training run, saved and loaded together.
//!
//! Layout of an artifacts directory:
//!
//! ```text
//! <dir>/CURRENT                          run id of the active pair
//! <dir>/runs/<run_id>/tfidf_vectorizer.json
//! <dir>/runs/<run_id>/model_gbdt.json
//! ```
//!
//! A run is staged in a temp directory under `runs/`, renamed into place,
//! and only then made active by atomically rewriting `CURRENT`. A failed
//! save leaves the previous pair active. A directory without `CURRENT`
//! is read as a flat pair (both files directly inside it).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use labelscan_ai::{GradientBoostedModel, TfidfVectorizer, TrainConfig};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::StoreError;
use crate::artifact::{
    Artifact, ArtifactKind, fingerprint, load_artifact, save_artifact, write_atomic,
};

pub const VECTORIZER_FILE: &str = "tfidf_vectorizer.json";
pub const MODEL_FILE: &str = "model_gbdt.json";
/// Names the run directory holding the active pair.
pub const CURRENT_FILE: &str = "CURRENT";
const RUNS_DIR: &str = "runs";

/// A fitted vectorizer and the model trained on its features.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPair {
    pub run_id: String,
    pub created_at: String,
    pub vectorizer: TfidfVectorizer,
    pub model: GradientBoostedModel,
    /// Split and boosting settings the model was trained with.
    pub training: TrainConfig,
}

/// Model artifact payload: the ensemble plus the settings that produced it.
#[derive(Serialize)]
struct ModelRecordRef<'a> {
    training: &'a TrainConfig,
    model: &'a GradientBoostedModel,
}

#[derive(Deserialize)]
struct ModelRecord {
    training: TrainConfig,
    model: GradientBoostedModel,
}

const SETTINGS_DISAGREE: &str = "training settings disagree with the model's booster config";

impl ArtifactPair {
    /// Tag a freshly trained pair with a new run id.
    pub fn new(
        vectorizer: TfidfVectorizer,
        model: GradientBoostedModel,
        training: TrainConfig,
    ) -> Result<Self, StoreError> {
        check_dimensions(&vectorizer, &model)?;
        if &training.booster != model.config() {
            return Err(StoreError::InvalidPair(SETTINGS_DISAGREE.into()));
        }
        let created_at = Utc::now().to_rfc3339();
        let vec_bytes = serde_json::to_vec(&vectorizer)?;
        let model_bytes = serde_json::to_vec(&ModelRecordRef {
            training: &training,
            model: &model,
        })?;
        let run_id = fingerprint(&[
            vec_bytes.as_slice(),
            model_bytes.as_slice(),
            created_at.as_bytes(),
        ]);
        Ok(Self {
            run_id,
            created_at,
            vectorizer,
            model,
            training,
        })
    }

    /// Directory holding the files of run `run_id`.
    pub fn run_dir(dir: &Path, run_id: &str) -> PathBuf {
        dir.join(RUNS_DIR).join(run_id)
    }

    /// Directory holding the active pair: the run named by `CURRENT`, or
    /// `dir` itself when there is no pointer.
    pub fn active_dir(dir: &Path) -> Result<PathBuf, StoreError> {
        Ok(match read_current(dir)? {
            Some(run_id) => Self::run_dir(dir, &run_id),
            None => dir.to_path_buf(),
        })
    }

    /// Write both artifacts as a new run under `dir` and make it active.
    pub fn save(&self, dir: &Path) -> Result<(), StoreError> {
        let runs = dir.join(RUNS_DIR);
        fs::create_dir_all(&runs)?;
        let target = Self::run_dir(dir, &self.run_id);

        if target.is_dir() {
            // Same run id means same content; only the pointer may be stale.
            debug!(run_id = %self.run_id, "run already on disk");
        } else {
            // On failure the staging directory is removed when dropped.
            let staging = TempDir::new_in(&runs)?;
            self.write_files(staging.path())?;
            fs::rename(staging.path(), &target)?;
        }

        write_atomic(&dir.join(CURRENT_FILE), self.run_id.as_bytes())?;
        info!(dir = %dir.display(), run_id = %self.run_id, "saved artifact pair");
        Ok(())
    }

    fn write_files(&self, dir: &Path) -> Result<(), StoreError> {
        save_artifact(
            &Artifact::new(
                ArtifactKind::Vectorizer,
                &self.run_id,
                &self.created_at,
                &self.vectorizer,
            ),
            &dir.join(VECTORIZER_FILE),
        )?;
        let record = ModelRecordRef {
            training: &self.training,
            model: &self.model,
        };
        save_artifact(
            &Artifact::new(ArtifactKind::Model, &self.run_id, &self.created_at, record),
            &dir.join(MODEL_FILE),
        )
    }

    /// Load the active pair from `dir` and check that its halves belong
    /// together.
    pub fn load(dir: &Path) -> Result<Self, StoreError> {
        let current = read_current(dir)?;
        let run_dir = match &current {
            Some(run_id) => Self::run_dir(dir, run_id),
            None => dir.to_path_buf(),
        };
        let vec_path = run_dir.join(VECTORIZER_FILE);
        let model_path = run_dir.join(MODEL_FILE);
        let vectorizer: Artifact<TfidfVectorizer> =
            load_artifact(&vec_path, ArtifactKind::Vectorizer)?;
        let model: Artifact<ModelRecord> = load_artifact(&model_path, ArtifactKind::Model)?;

        if vectorizer.run_id != model.run_id {
            return Err(StoreError::MismatchedPair {
                vectorizer: vectorizer.run_id,
                model: model.run_id,
            });
        }
        let corrupt = |path: &Path, reason: String| StoreError::ArtifactCorrupt {
            path: path.to_path_buf(),
            reason,
        };
        if let Some(expected) = current.filter(|id| *id != model.run_id) {
            return Err(corrupt(
                &model_path,
                format!("run {} stored under run {expected}", model.run_id),
            ));
        }
        vectorizer
            .payload
            .check_consistency()
            .map_err(|reason| corrupt(&vec_path, reason))?;
        let ModelRecord {
            training,
            model: ensemble,
        } = model.payload;
        ensemble
            .check_consistency()
            .map_err(|reason| corrupt(&model_path, reason))?;
        if &training.booster != ensemble.config() {
            return Err(corrupt(&model_path, SETTINGS_DISAGREE.into()));
        }
        check_dimensions(&vectorizer.payload, &ensemble)?;

        info!(
            dir = %run_dir.display(),
            run_id = %model.run_id,
            vocabulary = vectorizer.payload.dim(),
            classes = ensemble.classes().len(),
            seed = training.seed,
            "loaded artifact pair"
        );
        Ok(Self {
            run_id: model.run_id,
            created_at: model.created_at,
            vectorizer: vectorizer.payload,
            model: ensemble,
            training,
        })
    }
}

/// Run id named by `<dir>/CURRENT`, if the pointer exists.
fn read_current(dir: &Path) -> Result<Option<String>, StoreError> {
    let path = dir.join(CURRENT_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path)?;
    let run_id = text.trim();
    if run_id.is_empty() || !run_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StoreError::ArtifactCorrupt {
            path,
            reason: format!("invalid run id {run_id:?}"),
        });
    }
    Ok(Some(run_id.to_string()))
}

fn check_dimensions(
    vectorizer: &TfidfVectorizer,
    model: &GradientBoostedModel,
) -> Result<(), StoreError> {
    if vectorizer.dim() != model.n_features() {
        return Err(StoreError::DimensionMismatch {
            vocabulary: vectorizer.dim(),
            model: model.n_features(),
        });
    }
    Ok(())
}

//! Training pipeline: label encoding, stratified split, boosting, evaluation.

use std::collections::BTreeSet;

use labelscan_core::Corpus;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AiError;
use crate::evaluate::{EvaluationReport, evaluate};
use crate::gbdt::{BoosterConfig, GradientBoostedModel};
use crate::split::{Split, stratified_split};
use crate::vectorizer::{FeatureVector, TfidfVectorizer};

/// Split and boosting settings for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Share of each class held out for evaluation.
    pub test_fraction: f64,
    /// Seed for the split shuffle.
    pub seed: u64,
    pub booster: BoosterConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            booster: BoosterConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), AiError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(AiError::InvalidConfig(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        self.booster.validate()
    }
}

/// A fitted model with the split it was trained on.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: GradientBoostedModel,
    pub split: Split,
    /// `None` when every class was too small to hold anything out.
    pub report: Option<EvaluationReport>,
}

/// Vectorizer and model fitted together from one corpus.
#[derive(Debug, Clone)]
pub struct FittedPipeline {
    pub vectorizer: TfidfVectorizer,
    pub trained: TrainedModel,
}

pub struct Trainer {
    config: TrainConfig,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Fit the vectorizer on the whole corpus, then train on its features.
    pub fn fit_corpus(&self, corpus: &Corpus) -> Result<FittedPipeline, AiError> {
        let (vectorizer, features) = TfidfVectorizer::fit_transform(&corpus.texts())?;
        let trained = self.train(&features, &corpus.labels())?;
        Ok(FittedPipeline {
            vectorizer,
            trained,
        })
    }

    /// Split, fit on the train side, and evaluate on the held-out side.
    ///
    /// Requires as many labels as feature rows (at least one) and at least
    /// two distinct labels.
    pub fn train<S: AsRef<str>>(
        &self,
        features: &[FeatureVector],
        labels: &[S],
    ) -> Result<TrainedModel, AiError> {
        self.config.validate()?;
        if features.is_empty() || features.len() != labels.len() {
            return Err(AiError::InsufficientData(format!(
                "{} feature rows for {} labels",
                features.len(),
                labels.len()
            )));
        }

        let classes: Vec<String> = labels
            .iter()
            .map(|l| l.as_ref())
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        if classes.len() < 2 {
            return Err(AiError::InsufficientData(format!(
                "need at least two distinct labels, got {}",
                classes.len()
            )));
        }
        let targets: Vec<usize> = labels
            .iter()
            .map(|l| classes.binary_search_by(|c| c.as_str().cmp(l.as_ref())))
            .collect::<Result<_, _>>()
            .map_err(|_| AiError::InvalidCorpus("label missing from class list".into()))?;

        let split = stratified_split(
            &targets,
            classes.len(),
            self.config.test_fraction,
            self.config.seed,
        );
        info!(
            train = split.train.len(),
            held_out = split.held_out.len(),
            classes = classes.len(),
            seed = self.config.seed,
            "split corpus"
        );

        let train_x: Vec<FeatureVector> = split.train.iter().map(|&i| features[i].clone()).collect();
        let train_y: Vec<usize> = split.train.iter().map(|&i| targets[i]).collect();
        let model = GradientBoostedModel::fit(&train_x, &train_y, classes, &self.config.booster)?;

        let report = if split.held_out.is_empty() {
            warn!("held-out split is empty, skipping evaluation");
            None
        } else {
            let test_x: Vec<FeatureVector> =
                split.held_out.iter().map(|&i| features[i].clone()).collect();
            let test_y: Vec<&str> = split.held_out.iter().map(|&i| labels[i].as_ref()).collect();
            let report = evaluate(&model, &test_x, &test_y)?;
            info!(accuracy = report.accuracy, "held-out evaluation");
            Some(report)
        };

        Ok(TrainedModel {
            model,
            split,
            report,
        })
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new(TrainConfig::default())
    }
}

//! Accuracy and per-class precision/recall/F1 on labelled data.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::AiError;
use crate::gbdt::GradientBoostedModel;
use crate::vectorizer::FeatureVector;

/// Metrics for one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of true samples of this class.
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Averages {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Evaluation summary, shaped like a classification report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    /// Sorted union of true and predicted labels.
    pub classes: Vec<ClassMetrics>,
    pub macro_avg: Averages,
    pub weighted_avg: Averages,
    pub total: usize,
}

/// Predict every row and score the predictions against `labels`.
pub fn evaluate<S: AsRef<str>>(
    model: &GradientBoostedModel,
    features: &[FeatureVector],
    labels: &[S],
) -> Result<EvaluationReport, AiError> {
    if features.len() != labels.len() {
        return Err(AiError::InsufficientData(format!(
            "{} feature rows for {} labels",
            features.len(),
            labels.len()
        )));
    }
    let predictions = model.predict_batch(features)?;
    let predicted: Vec<&str> = predictions.iter().map(|p| p.label.as_str()).collect();
    let truth: Vec<&str> = labels.iter().map(AsRef::as_ref).collect();
    report(&truth, &predicted)
}

/// Score already-computed predictions. Zero denominators yield 0.
pub fn report(truth: &[&str], predicted: &[&str]) -> Result<EvaluationReport, AiError> {
    if truth.is_empty() {
        return Err(AiError::InsufficientData("no samples to evaluate".into()));
    }
    if truth.len() != predicted.len() {
        return Err(AiError::InsufficientData(format!(
            "{} labels for {} predictions",
            truth.len(),
            predicted.len()
        )));
    }

    let total = truth.len();
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();

    let labels: BTreeSet<&str> = truth.iter().chain(predicted).copied().collect();
    let classes: Vec<ClassMetrics> = labels
        .into_iter()
        .map(|label| {
            let mut tp = 0usize;
            let mut fp = 0usize;
            let mut fn_ = 0usize;
            for (&t, &p) in truth.iter().zip(predicted) {
                match (t == label, p == label) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                label: label.to_string(),
                precision,
                recall,
                f1,
                support: tp + fn_,
            }
        })
        .collect();

    let n = classes.len() as f64;
    let macro_avg = Averages {
        precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
        recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
        f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
    };
    let weight = |f: fn(&ClassMetrics) -> f64| {
        classes.iter().map(|c| f(c) * c.support as f64).sum::<f64>() / total as f64
    };
    let weighted_avg = Averages {
        precision: weight(|c| c.precision),
        recall: weight(|c| c.recall),
        f1: weight(|c| c.f1),
    };

    Ok(EvaluationReport {
        accuracy: correct as f64 / total as f64,
        classes,
        macro_avg,
        weighted_avg,
        total,
    })
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl EvaluationReport {
    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }
}

//! Gradient-boosted decision trees over sparse features.
//!
//! Second-order boosting in the XGBoost style: each tree fits the gradient
//! and hessian of the loss at the current margins, leaf weights are
//! `-G / (H + lambda)` scaled by the learning rate, and split gain is
//! `(GL²/(HL+λ) + GR²/(HR+λ) - G²/(H+λ)) / 2 - gamma`.
//!
//! Two classes use a logistic objective with one tree per round; more
//! classes use softmax with one tree per class per round. Absent sparse
//! entries are treated as zero. Training is fully deterministic.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::AiError;
use crate::vectorizer::FeatureVector;

/// Hessian floor, keeps leaf weights finite for saturated probabilities.
const MIN_HESSIAN: f64 = 1e-16;

/// Boosting hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterConfig {
    /// Number of boosting rounds.
    pub n_rounds: usize,
    /// Shrinkage applied to every leaf weight.
    pub learning_rate: f64,
    /// Maximum tree depth (root is depth 0).
    pub max_depth: usize,
    /// L2 regularization on leaf weights.
    pub lambda: f64,
    /// Minimum loss reduction required to split.
    pub gamma: f64,
    /// Minimum hessian sum in each child.
    pub min_child_weight: f64,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.3,
            max_depth: 6,
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
        }
    }
}

impl BoosterConfig {
    pub fn validate(&self) -> Result<(), AiError> {
        if self.n_rounds == 0 {
            return Err(AiError::InvalidConfig("n_rounds must be positive".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(AiError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.lambda < 0.0 || self.gamma < 0.0 || self.min_child_weight < 0.0 {
            return Err(AiError::InvalidConfig(
                "lambda, gamma and min_child_weight must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A single regression tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Leaf value reached by `x`. Goes left when `x[feature] < threshold`.
    pub fn predict(&self, x: &FeatureVector) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if x.get(*feature) < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }

    fn is_well_formed(&self) -> bool {
        let n = self.nodes.len();
        n > 0
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                // Children always follow their parent, so traversal terminates.
                Node::Split { left, right, .. } => *left > i && *right > i && *left < n && *right < n,
                Node::Leaf { .. } => true,
            })
    }
}

/// Class probabilities and the winning label for one input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    /// Probability of `label`.
    pub probability: f64,
}

/// Fitted gradient-boosted ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedModel {
    classes: Vec<String>,
    n_features: usize,
    config: BoosterConfig,
    /// `rounds[r][k]`: tree for output `k` in round `r`.
    rounds: Vec<Vec<Tree>>,
}

impl GradientBoostedModel {
    /// Fit on `features` with integer `targets` indexing into `classes`.
    pub fn fit(
        features: &[FeatureVector],
        targets: &[usize],
        classes: Vec<String>,
        config: &BoosterConfig,
    ) -> Result<Self, AiError> {
        config.validate()?;
        if features.is_empty() || features.len() != targets.len() {
            return Err(AiError::InsufficientData(format!(
                "{} feature rows for {} targets",
                features.len(),
                targets.len()
            )));
        }
        if classes.len() < 2 {
            return Err(AiError::InsufficientData(format!(
                "need at least two classes, got {}",
                classes.len()
            )));
        }
        if let Some(&bad) = targets.iter().find(|&&t| t >= classes.len()) {
            return Err(AiError::InvalidCorpus(format!(
                "target {bad} out of range for {} classes",
                classes.len()
            )));
        }

        let n_features = features[0].dim();
        if features.iter().any(|x| x.dim() != n_features) {
            return Err(AiError::InvalidCorpus(
                "feature vectors have mixed dimensions".into(),
            ));
        }
        if let Some(row) = features.iter().position(|x| !x.indices_in_range()) {
            return Err(AiError::InvalidCorpus(format!(
                "feature row {row} has an index past dimension {n_features}"
            )));
        }

        let n_rows = features.len();
        let n_outputs = output_count(classes.len());
        let columns = build_columns(features, n_features);

        let mut margins = vec![vec![0.0; n_outputs]; n_rows];
        let mut rounds = Vec::with_capacity(config.n_rounds);
        let mut grad = vec![0.0; n_rows];
        let mut hess = vec![0.0; n_rows];

        for round in 0..config.n_rounds {
            let probs: Vec<Vec<f64>> = margins.iter().map(|m| probabilities(m)).collect();
            let mut trees = Vec::with_capacity(n_outputs);

            for k in 0..n_outputs {
                for row in 0..n_rows {
                    let (g, h) = gradient(&probs[row], targets[row], k, n_outputs);
                    grad[row] = g;
                    hess[row] = h;
                }

                let tree = TreeBuilder {
                    features,
                    columns: &columns,
                    grad: &grad,
                    hess: &hess,
                    config,
                    nodes: Vec::new(),
                    in_node: vec![false; n_rows],
                }
                .build();

                for (row, margin) in margins.iter_mut().enumerate() {
                    margin[k] += tree.predict(&features[row]);
                }
                trees.push(tree);
            }

            debug!(
                round,
                leaves = trees.iter().map(Tree::leaf_count).sum::<usize>(),
                "boosting round"
            );
            rounds.push(trees);
        }

        let model = Self {
            classes,
            n_features,
            config: config.clone(),
            rounds,
        };
        info!(
            rows = n_rows,
            features = n_features,
            classes = model.classes.len(),
            rounds = model.rounds.len(),
            "fitted gradient-boosted model"
        );
        Ok(model)
    }

    /// Probability per class, in [`classes`](Self::classes) order.
    pub fn predict_proba(&self, x: &FeatureVector) -> Result<Vec<f64>, AiError> {
        if x.dim() != self.n_features {
            return Err(AiError::PredictionFailure(format!(
                "feature vector has {} dimensions, model expects {}",
                x.dim(),
                self.n_features
            )));
        }

        let mut margins = vec![0.0; output_count(self.classes.len())];
        for trees in &self.rounds {
            for (k, tree) in trees.iter().enumerate() {
                margins[k] += tree.predict(x);
            }
        }
        Ok(probabilities(&margins))
    }

    /// Most probable class. Ties go to the earlier class.
    pub fn predict(&self, x: &FeatureVector) -> Result<Prediction, AiError> {
        let probs = self.predict_proba(x)?;
        let (best, probability) = probs
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(bi, bp), (i, p)| {
                if p > bp { (i, p) } else { (bi, bp) }
            });
        Ok(Prediction {
            label: self.classes[best].clone(),
            probability,
        })
    }

    pub fn predict_batch(&self, features: &[FeatureVector]) -> Result<Vec<Prediction>, AiError> {
        features.iter().map(|x| self.predict(x)).collect()
    }

    /// Class labels, sorted.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Input dimensionality the model was trained on.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn config(&self) -> &BoosterConfig {
        &self.config
    }

    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Structural sanity check for deserialized models.
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.classes.len() < 2 {
            return Err(format!("{} classes", self.classes.len()));
        }
        let n_outputs = output_count(self.classes.len());
        for (r, trees) in self.rounds.iter().enumerate() {
            if trees.len() != n_outputs {
                return Err(format!(
                    "round {r} has {} trees, expected {n_outputs}",
                    trees.len()
                ));
            }
            for tree in trees {
                if !tree.is_well_formed() {
                    return Err(format!("round {r} has a malformed tree"));
                }
                if tree.max_feature().is_some_and(|f| f >= self.n_features) {
                    return Err(format!("round {r} splits on an out-of-range feature"));
                }
            }
        }
        Ok(())
    }
}

/// Trees per round: one for a logistic model, one per class for softmax.
fn output_count(n_classes: usize) -> usize {
    if n_classes == 2 { 1 } else { n_classes }
}

/// Margins → class probabilities.
fn probabilities(margins: &[f64]) -> Vec<f64> {
    if margins.len() == 1 {
        let p = sigmoid(margins[0]);
        return vec![1.0 - p, p];
    }
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|m| (m - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Gradient and hessian of the loss for output `k` of one row.
fn gradient(probs: &[f64], target: usize, k: usize, n_outputs: usize) -> (f64, f64) {
    if n_outputs == 1 {
        let p = probs[1];
        let y = if target == 1 { 1.0 } else { 0.0 };
        (p - y, (p * (1.0 - p)).max(MIN_HESSIAN))
    } else {
        let p = probs[k];
        let y = if target == k { 1.0 } else { 0.0 };
        (p - y, (2.0 * p * (1.0 - p)).max(MIN_HESSIAN))
    }
}

/// Column-major view: for each feature, the `(row, value)` pairs present.
fn build_columns(features: &[FeatureVector], n_features: usize) -> Vec<Vec<(usize, f64)>> {
    let mut columns = vec![Vec::new(); n_features];
    for (row, x) in features.iter().enumerate() {
        for (idx, val) in x.iter() {
            columns[idx].push((row, val));
        }
    }
    columns
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    features: &'a [FeatureVector],
    columns: &'a [Vec<(usize, f64)>],
    grad: &'a [f64],
    hess: &'a [f64],
    config: &'a BoosterConfig,
    nodes: Vec<Node>,
    in_node: Vec<bool>,
}

impl TreeBuilder<'_> {
    fn build(mut self) -> Tree {
        let rows: Vec<usize> = (0..self.features.len()).collect();
        self.grow(&rows, 0);
        Tree { nodes: self.nodes }
    }

    /// Grow the subtree for `rows`, returning its node index.
    fn grow(&mut self, rows: &[usize], depth: usize) -> usize {
        let (g, h) = self.sums(rows);
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_weight(g, h),
        });

        if depth >= self.config.max_depth || rows.len() < 2 {
            return id;
        }
        let Some(split) = self.best_split(rows, g, h) else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&row| self.features[row].get(split.feature) < split.threshold);

        debug!(
            depth,
            feature = split.feature,
            threshold = split.threshold,
            gain = split.gain,
            left = left_rows.len(),
            right = right_rows.len(),
            "split node"
        );

        let left = self.grow(&left_rows, depth + 1);
        let right = self.grow(&right_rows, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter()
            .fold((0.0, 0.0), |(g, h), &r| (g + self.grad[r], h + self.hess[r]))
    }

    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.config.lambda) * self.config.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.config.lambda)
    }

    /// Exact greedy search over every feature present in the node.
    fn best_split(&mut self, rows: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        for &row in rows {
            self.in_node[row] = true;
        }

        let parent_score = self.score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;
        // (value, grad, hess) buckets for one feature, zeros folded into one.
        let mut items: Vec<(f64, f64, f64)> = Vec::new();

        for (feature, column) in self.columns.iter().enumerate() {
            items.clear();
            let (mut g_nz, mut h_nz, mut n_nz) = (0.0, 0.0, 0usize);
            for &(row, value) in column {
                if self.in_node[row] {
                    items.push((value, self.grad[row], self.hess[row]));
                    g_nz += self.grad[row];
                    h_nz += self.hess[row];
                    n_nz += 1;
                }
            }
            if n_nz == 0 {
                continue;
            }
            if n_nz < rows.len() {
                items.push((0.0, g_total - g_nz, h_total - h_nz));
            }
            if items.len() < 2 {
                continue;
            }
            items.sort_by(|a, b| a.0.total_cmp(&b.0));

            let (mut gl, mut hl) = (0.0, 0.0);
            for i in 0..items.len() - 1 {
                gl += items[i].1;
                hl += items[i].2;
                let (lo, hi) = (items[i].0, items[i + 1].0);
                if lo == hi {
                    continue;
                }
                let (gr, hr) = (g_total - gl, h_total - hl);
                if hl < self.config.min_child_weight || hr < self.config.min_child_weight {
                    continue;
                }
                let gain = 0.5 * (self.score(gl, hl) + self.score(gr, hr) - parent_score)
                    - self.config.gamma;
                if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: midpoint(lo, hi),
                        gain,
                    });
                }
            }
        }

        for &row in rows {
            self.in_node[row] = false;
        }
        best
    }
}

/// A threshold strictly above `lo` and at most `hi`.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid > lo { mid } else { hi }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x(dim: usize, pairs: &[(usize, f64)]) -> FeatureVector {
        FeatureVector::from_pairs(dim, pairs.iter().copied())
    }

    fn classes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Feature 0 separates class 1 from class 0.
    fn binary_data() -> (Vec<FeatureVector>, Vec<usize>) {
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for i in 0..10 {
            features.push(x(3, &[(0, 0.5 + i as f64 * 0.01), (2, 0.1)]));
            targets.push(1);
            features.push(x(3, &[(1, 0.5 + i as f64 * 0.01), (2, 0.1)]));
            targets.push(0);
        }
        (features, targets)
    }

    #[test]
    fn learns_binary_separation() {
        let (features, targets) = binary_data();
        let model = GradientBoostedModel::fit(
            &features,
            &targets,
            classes(&["safe", "unsafe"]),
            &BoosterConfig::default(),
        )
        .unwrap();

        let unsafe_pred = model.predict(&x(3, &[(0, 0.7)])).unwrap();
        assert_eq!(unsafe_pred.label, "unsafe");
        assert!(unsafe_pred.probability > 0.9);

        let safe_pred = model.predict(&x(3, &[(1, 0.7)])).unwrap();
        assert_eq!(safe_pred.label, "safe");
    }

    #[test]
    fn learns_three_classes() {
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for i in 0..8 {
            for k in 0..3 {
                features.push(x(3, &[(k, 0.6 + i as f64 * 0.02)]));
                targets.push(k);
            }
        }
        let model = GradientBoostedModel::fit(
            &features,
            &targets,
            classes(&["a", "b", "c"]),
            &BoosterConfig::default(),
        )
        .unwrap();

        for (k, name) in ["a", "b", "c"].iter().enumerate() {
            let pred = model.predict(&x(3, &[(k, 0.65)])).unwrap();
            assert_eq!(&pred.label, name);
        }
        let probs = model.predict_proba(&x(3, &[(1, 0.65)])).unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tiny_data_yields_root_leaf() {
        // Two rows cannot satisfy min_child_weight, so every tree is a leaf.
        let features = vec![x(2, &[(0, 1.0)]), x(2, &[(1, 1.0)])];
        let model = GradientBoostedModel::fit(
            &features,
            &[1, 0],
            classes(&["safe", "unsafe"]),
            &BoosterConfig::default(),
        )
        .unwrap();
        assert!(model.rounds.iter().flatten().all(|t| t.node_count() == 1));
        let probs = model.predict_proba(&features[0]).unwrap();
        assert!((probs[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn dimension_mismatch_is_prediction_failure() {
        let (features, targets) = binary_data();
        let model = GradientBoostedModel::fit(
            &features,
            &targets,
            classes(&["safe", "unsafe"]),
            &BoosterConfig {
                n_rounds: 3,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(
            model.predict(&FeatureVector::zeros(7)),
            Err(AiError::PredictionFailure(_))
        ));
    }

    #[test]
    fn rejects_single_class() {
        let (features, _) = binary_data();
        let targets = vec![0; features.len()];
        assert!(matches!(
            GradientBoostedModel::fit(&features, &targets, classes(&["safe"]), &BoosterConfig::default()),
            Err(AiError::InsufficientData(_))
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        let (features, _) = binary_data();
        assert!(matches!(
            GradientBoostedModel::fit(&features, &[0, 1], classes(&["a", "b"]), &BoosterConfig::default()),
            Err(AiError::InsufficientData(_))
        ));
    }

    #[test]
    fn rejects_feature_index_past_dimension() {
        let stray: FeatureVector =
            serde_json::from_str(r#"{"dim":2,"indices":[5],"values":[1.0]}"#).unwrap();
        let features = vec![stray, x(2, &[(0, 1.0)])];
        assert!(matches!(
            GradientBoostedModel::fit(&features, &[0, 1], classes(&["a", "b"]), &BoosterConfig::default()),
            Err(AiError::InvalidCorpus(_))
        ));
    }

    #[test]
    fn rejects_zero_rounds() {
        let (features, targets) = binary_data();
        let config = BoosterConfig {
            n_rounds: 0,
            ..Default::default()
        };
        assert!(matches!(
            GradientBoostedModel::fit(&features, &targets, classes(&["a", "b"]), &config),
            Err(AiError::InvalidConfig(_))
        ));
    }

    #[test]
    fn training_is_deterministic() {
        let (features, targets) = binary_data();
        let fit = || {
            GradientBoostedModel::fit(
                &features,
                &targets,
                classes(&["safe", "unsafe"]),
                &BoosterConfig::default(),
            )
            .unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn serde_round_trip_preserves_predictions() {
        let (features, targets) = binary_data();
        let model = GradientBoostedModel::fit(
            &features,
            &targets,
            classes(&["safe", "unsafe"]),
            &BoosterConfig::default(),
        )
        .unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let restored: GradientBoostedModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, model);
        assert!(restored.check_consistency().is_ok());
        for row in &features {
            assert_eq!(
                restored.predict_proba(row).unwrap(),
                model.predict_proba(row).unwrap()
            );
        }
    }

    #[test]
    fn consistency_check_catches_bad_feature() {
        let (features, targets) = binary_data();
        let mut model = GradientBoostedModel::fit(
            &features,
            &targets,
            classes(&["safe", "unsafe"]),
            &BoosterConfig::default(),
        )
        .unwrap();
        model.n_features = 1;
        assert!(model.check_consistency().is_err());
    }

    #[test]
    fn midpoint_is_strictly_above_lower_bound() {
        assert_eq!(midpoint(0.0, 1.0), 0.5);
        let lo = 1.0f64;
        let hi = f64::from_bits(lo.to_bits() + 1);
        assert_eq!(midpoint(lo, hi), hi);
    }
}

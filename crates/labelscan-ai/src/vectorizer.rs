//! TF-IDF vectorization over a frozen vocabulary.
//!
//! Tokens are lower-cased runs of word characters (alphanumeric or `_`) of
//! at least two characters. Vocabulary indices follow sorted token order.
//! Weights are `count * idf` with smoothed `idf = ln((1 + n) / (1 + df)) + 1`,
//! then each row is L2-normalized.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AiError;

/// Minimum token length in characters.
const MIN_TOKEN_CHARS: usize = 2;

/// Sparse feature vector with sorted, unique indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    dim: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Build from `(index, value)` pairs. Zero values are dropped.
    ///
    /// Pairs are sorted by index; the last value wins on duplicate indices.
    /// Indices at or beyond `dim` are dropped.
    pub fn from_pairs(dim: usize, pairs: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let sorted: BTreeMap<usize, f64> = pairs
            .into_iter()
            .filter(|&(idx, _)| idx < dim)
            .collect();
        let mut indices = Vec::with_capacity(sorted.len());
        let mut values = Vec::with_capacity(sorted.len());
        for (idx, val) in sorted {
            if val != 0.0 {
                indices.push(idx);
                values.push(val);
            }
        }
        Self {
            dim,
            indices,
            values,
        }
    }

    /// An all-zero vector.
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Value at `index`; absent entries are zero.
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Whether every stored index is below `dim`.
    ///
    /// Always true for vectors built here; deserialized ones may not be.
    pub fn indices_in_range(&self) -> bool {
        self.indices.iter().all(|&idx| idx < self.dim)
    }

    /// Non-zero entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.dim];
        for (idx, val) in self.iter() {
            dense[idx] = val;
        }
        dense
    }

    /// L2 norm.
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

/// Token → feature index, frozen after fitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary {
    tokens: BTreeMap<String, usize>,
}

impl Vocabulary {
    fn from_sorted(tokens: BTreeSet<String>) -> Self {
        Self {
            tokens: tokens.into_iter().enumerate().map(|(i, t)| (t, i)).collect(),
        }
    }

    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.tokens.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens in index order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }
}

/// Fitted TF-IDF vectorizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: Vocabulary,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn vocabulary and IDF weights from a corpus.
    ///
    /// Fails with [`AiError::InvalidCorpus`] when `texts` is empty or yields
    /// no tokens.
    pub fn fit<S: AsRef<str>>(texts: &[S]) -> Result<Self, AiError> {
        if texts.is_empty() {
            return Err(AiError::InvalidCorpus("no documents to fit".into()));
        }

        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        for text in texts {
            let unique: BTreeSet<String> = tokenize(text.as_ref()).collect();
            for token in unique {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }

        if doc_freq.is_empty() {
            return Err(AiError::InvalidCorpus(
                "no extractable tokens in corpus".into(),
            ));
        }

        let n_docs = texts.len() as f64;
        let idf: Vec<f64> = doc_freq
            .values()
            .map(|&df| ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0)
            .collect();
        let vocabulary = Vocabulary::from_sorted(doc_freq.into_keys().collect());

        info!(
            documents = texts.len(),
            vocabulary = vocabulary.len(),
            "fitted tf-idf vectorizer"
        );
        Ok(Self { vocabulary, idf })
    }

    /// Fit on `texts` and transform them in one pass.
    pub fn fit_transform<S: AsRef<str>>(
        texts: &[S],
    ) -> Result<(Self, Vec<FeatureVector>), AiError> {
        let vectorizer = Self::fit(texts)?;
        let features = vectorizer.transform(texts);
        Ok((vectorizer, features))
    }

    /// Map one text through the frozen vocabulary. Unknown tokens are ignored.
    pub fn transform_one(&self, text: &str) -> FeatureVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(text) {
            if let Some(idx) = self.vocabulary.index_of(&token) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut weighted: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();

        let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut weighted {
                *w /= norm;
            }
        }

        FeatureVector::from_pairs(self.dim(), weighted)
    }

    pub fn transform<S: AsRef<str>>(&self, texts: &[S]) -> Vec<FeatureVector> {
        texts.iter().map(|t| self.transform_one(t.as_ref())).collect()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Feature dimensionality (vocabulary size).
    pub fn dim(&self) -> usize {
        self.vocabulary.len()
    }

    /// IDF weight per feature index.
    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    /// Structural sanity check for deserialized vectorizers.
    pub fn check_consistency(&self) -> Result<(), String> {
        let n = self.vocabulary.len();
        if self.idf.len() != n {
            return Err(format!("{} idf weights for {n} terms", self.idf.len()));
        }
        let mut seen = vec![false; n];
        for &idx in self.vocabulary.tokens.values() {
            if idx >= n || std::mem::replace(&mut seen[idx], true) {
                return Err(format!("feature index {idx} is out of range or repeated"));
            }
        }
        if let Some(bad) = self.idf.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
            return Err(format!("invalid idf weight {bad}"));
        }
        Ok(())
    }
}

/// Split text into lower-cased word tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_lowercase)
}

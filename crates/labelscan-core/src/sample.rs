//! Labelled training samples.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorpusError {
    #[error("corpus is empty")]
    Empty,

    #[error("row {row}: empty text")]
    EmptyText { row: usize },

    #[error("row {row}: empty label")]
    EmptyLabel { row: usize },
}

/// One row of the training corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub text: String,
    pub label: String,
}

impl Sample {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Ordered, validated collection of samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    samples: Vec<Sample>,
}

impl Corpus {
    /// Validate and wrap samples. Rejects an empty corpus and blank cells.
    pub fn new(samples: Vec<Sample>) -> Result<Self, CorpusError> {
        if samples.is_empty() {
            return Err(CorpusError::Empty);
        }
        for (row, sample) in samples.iter().enumerate() {
            if sample.text.trim().is_empty() {
                return Err(CorpusError::EmptyText { row });
            }
            if sample.label.trim().is_empty() {
                return Err(CorpusError::EmptyLabel { row });
            }
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.label.as_str()).collect()
    }

    /// Sample count per label, sorted by label.
    pub fn label_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for sample in &self.samples {
            *counts.entry(sample.label.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_corpus() {
        assert_eq!(Corpus::new(vec![]).unwrap_err(), CorpusError::Empty);
    }

    #[test]
    fn rejects_blank_text() {
        let err = Corpus::new(vec![Sample::new("milk", "unsafe"), Sample::new("  ", "safe")])
            .unwrap_err();
        assert_eq!(err, CorpusError::EmptyText { row: 1 });
    }

    #[test]
    fn rejects_blank_label() {
        let err = Corpus::new(vec![Sample::new("milk", "")]).unwrap_err();
        assert_eq!(err, CorpusError::EmptyLabel { row: 0 });
    }

    #[test]
    fn label_counts_sorted() {
        let corpus = Corpus::new(vec![
            Sample::new("a b", "unsafe"),
            Sample::new("c d", "safe"),
            Sample::new("e f", "unsafe"),
        ])
        .unwrap();
        let counts: Vec<_> = corpus.label_counts().into_iter().collect();
        assert_eq!(counts, vec![("safe", 1), ("unsafe", 2)]);
        assert_eq!(corpus.texts(), vec!["a b", "c d", "e f"]);
    }
}

//! Rule-based allergen and additive extraction over raw OCR text.
//!
//! Matching is plain case-insensitive substring search, one catalog entry at
//! a time. It admits false positives (`egg` inside `eggplant`, `E100` inside
//! `E1000`); that is the known precision ceiling of this matcher.

use std::sync::Arc;

use serde::Serialize;

use crate::catalog::Catalog;

/// An allergen found in the text, with its guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllergenFinding {
    pub name: String,
    pub alternative: String,
    pub remediation: String,
}

/// An additive code found in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdditiveFinding {
    pub code: String,
    pub description: String,
}

/// Everything the matcher found in one text, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    pub allergens: Vec<AllergenFinding>,
    pub additives: Vec<AdditiveFinding>,
}

impl DetectionResult {
    pub fn is_empty(&self) -> bool {
        self.allergens.is_empty() && self.additives.is_empty()
    }
}

/// Stateless matcher over a shared catalog.
///
/// Cloning is cheap; the catalog is behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Matcher {
    catalog: Arc<Catalog>,
}

impl Matcher {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Find every allergen keyword and additive code present in `text`.
    ///
    /// Never fails: no match is an empty result.
    pub fn detect(&self, text: &str) -> DetectionResult {
        let lowered = text.to_lowercase();
        DetectionResult {
            allergens: self.detect_allergens(&lowered),
            additives: self.detect_additives(&lowered),
        }
    }

    fn detect_allergens(&self, lowered: &str) -> Vec<AllergenFinding> {
        self.catalog
            .allergens
            .entries()
            .iter()
            .filter(|entry| lowered.contains(&entry.keyword.to_lowercase()))
            .map(|entry| AllergenFinding {
                name: entry.name.clone(),
                alternative: entry.alternative.clone(),
                remediation: entry.remediation.clone(),
            })
            .collect()
    }

    fn detect_additives(&self, lowered: &str) -> Vec<AdditiveFinding> {
        let normalized = normalize_for_codes(lowered);
        self.catalog
            .additives
            .entries()
            .iter()
            .filter(|entry| normalized.contains(&entry.code.to_lowercase()))
            .map(|entry| AdditiveFinding {
                code: entry.code.clone(),
                description: entry.description.clone(),
            })
            .collect()
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(Catalog::builtin())
    }
}

/// Drop spaces and newlines so codes split by OCR line breaks rejoin.
///
/// Only `' '` and `'\n'` are removed; tabs and `'\r'` are kept.
fn normalize_for_codes(text: &str) -> String {
    text.chars().filter(|&c| c != ' ' && c != '\n').collect()
}

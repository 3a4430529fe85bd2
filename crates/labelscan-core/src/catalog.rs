//! Allergen and additive catalogs used by the rule-based matcher.
//!
//! Catalogs are versioned JSON configuration. Declaration order is kept:
//! the matcher reports findings in catalog order, not input order.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Catalog schema version understood by this build.
pub const CATALOG_VERSION: u32 = 1;

/// Catalog shipped with the crate (12 allergens, 14 E-codes).
const DEFAULT_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("unsupported catalog version {found} (expected {expected})", expected = CATALOG_VERSION)]
    UnsupportedVersion { found: u32 },

    #[error("empty {field} in {section} entry {index}")]
    EmptyField {
        section: &'static str,
        field: &'static str,
        index: usize,
    },

    #[error("duplicate {section} key: {key}")]
    Duplicate { section: &'static str, key: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Guidance for a single allergen keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllergenEntry {
    /// Substring searched for in lower-cased label text.
    pub keyword: String,
    /// Display name shown to the user.
    pub name: String,
    /// Suggested substitutes.
    pub alternative: String,
    /// What to do on exposure.
    pub remediation: String,
}

/// A food additive identified by its E-code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditiveEntry {
    pub code: String,
    pub description: String,
}

/// Ordered allergen keyword → guidance table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllergenCatalog {
    entries: Vec<AllergenEntry>,
}

/// Ordered additive code → description table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdditiveCatalog {
    entries: Vec<AdditiveEntry>,
}

impl AllergenCatalog {
    pub fn new(entries: Vec<AllergenEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[AllergenEntry] {
        &self.entries
    }

    pub fn get(&self, keyword: &str) -> Option<&AllergenEntry> {
        self.entries
            .iter()
            .find(|e| e.keyword.eq_ignore_ascii_case(keyword))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AdditiveCatalog {
    pub fn new(entries: Vec<AdditiveEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[AdditiveEntry] {
        &self.entries
    }

    pub fn get(&self, code: &str) -> Option<&AdditiveEntry> {
        self.entries
            .iter()
            .find(|e| e.code.eq_ignore_ascii_case(code))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Both catalogs plus the schema version they were loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub version: u32,
    pub allergens: AllergenCatalog,
    pub additives: AdditiveCatalog,
}

impl Catalog {
    /// The catalog embedded at build time.
    pub fn builtin() -> Self {
        // The embedded file is covered by `builtin_catalog_is_valid`.
        Self::from_json(DEFAULT_CATALOG).unwrap_or_else(|e| {
            panic!("embedded catalog is invalid: {e}");
        })
    }

    /// Parse and validate a catalog from JSON text.
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a catalog file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&text)?;
        info!(
            path = %path.display(),
            allergens = catalog.allergens.len(),
            additives = catalog.additives.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    /// Reject unknown versions, blank keys, and duplicate keys.
    ///
    /// A blank keyword would match every input, so it is an error rather
    /// than a no-op.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.version != CATALOG_VERSION {
            return Err(CatalogError::UnsupportedVersion {
                found: self.version,
            });
        }

        let mut seen = HashSet::new();
        for (index, entry) in self.allergens.entries().iter().enumerate() {
            if entry.keyword.trim().is_empty() {
                return Err(CatalogError::EmptyField {
                    section: "allergen",
                    field: "keyword",
                    index,
                });
            }
            if !seen.insert(entry.keyword.to_lowercase()) {
                return Err(CatalogError::Duplicate {
                    section: "allergen",
                    key: entry.keyword.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for (index, entry) in self.additives.entries().iter().enumerate() {
            if entry.code.trim().is_empty() {
                return Err(CatalogError::EmptyField {
                    section: "additive",
                    field: "code",
                    index,
                });
            }
            if !seen.insert(entry.code.to_lowercase()) {
                return Err(CatalogError::Duplicate {
                    section: "additive",
                    key: entry.code.clone(),
                });
            }
        }

        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_json(version: u32, allergens: &str, additives: &str) -> String {
        format!(r#"{{"version": {version}, "allergens": [{allergens}], "additives": [{additives}]}}"#)
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::from_json(DEFAULT_CATALOG).unwrap();
        assert_eq!(catalog.version, CATALOG_VERSION);
        assert_eq!(catalog.allergens.len(), 12);
        assert_eq!(catalog.additives.len(), 14);
    }

    #[test]
    fn builtin_keeps_declaration_order() {
        let catalog = Catalog::builtin();
        let keywords: Vec<&str> = catalog
            .allergens
            .entries()
            .iter()
            .map(|e| e.keyword.as_str())
            .collect();
        assert_eq!(&keywords[..3], &["milk", "soy", "wheat"]);
        assert_eq!(keywords.last(), Some(&"almond"));

        assert_eq!(catalog.additives.entries()[0].code, "E120");
        assert_eq!(catalog.additives.entries()[13].code, "E491");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.allergens.get("MILK").unwrap().name, "Susu");
        assert!(catalog.additives.get("e150D").is_some());
        assert!(catalog.additives.get("E999").is_none());
    }

    #[test]
    fn rejects_unknown_version() {
        let err = Catalog::from_json(&catalog_json(2, "", "")).unwrap_err();
        assert!(matches!(err, CatalogError::UnsupportedVersion { found: 2 }));
    }

    #[test]
    fn rejects_blank_keyword() {
        let allergen = r#"{"keyword": "  ", "name": "x", "alternative": "y", "remediation": "z"}"#;
        let err = Catalog::from_json(&catalog_json(1, allergen, "")).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::EmptyField {
                section: "allergen",
                index: 0,
                ..
            }
        ));
    }

    #[test]
    fn rejects_duplicate_codes() {
        let additives = r#"{"code": "E120", "description": "a"}, {"code": "e120", "description": "b"}"#;
        let err = Catalog::from_json(&catalog_json(1, "", additives)).unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate { section: "additive", .. }));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = Catalog::from_json("{\"version\": 1, \"allergens\": ").unwrap_err();
        assert!(matches!(err, CatalogError::Json(_)));
    }

    #[test]
    fn load_missing_file() {
        let err = Catalog::load(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[test]
    fn empty_catalog_is_valid() {
        let catalog = Catalog::from_json(&catalog_json(1, "", "")).unwrap();
        assert!(catalog.allergens.is_empty());
        assert!(catalog.additives.is_empty());
    }
}

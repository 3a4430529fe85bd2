pub mod catalog;
pub mod matcher;
pub mod ocr;
pub mod sample;

pub use catalog::{
    AdditiveCatalog, AdditiveEntry, AllergenCatalog, AllergenEntry, Catalog, CatalogError,
};
pub use matcher::{AdditiveFinding, AllergenFinding, DetectionResult, Matcher};
pub use ocr::{ImageBytes, ImageFile, ImageSource, OcrError, TextExtractor};
pub use sample::{Corpus, CorpusError, Sample};

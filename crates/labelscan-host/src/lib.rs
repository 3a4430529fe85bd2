//! Inference orchestration: resident artifacts, classification, and training runs.

pub mod error;
pub mod orchestrator;
pub mod training;

use std::path::Path;

use labelscan_core::{Catalog, Matcher};

pub use error::HostError;
pub use orchestrator::{Classification, Orchestrator, Scan};
pub use training::{TrainOutcome, train_and_save};

/// Build a matcher from a catalog file, or from the embedded catalog.
pub fn load_matcher(catalog: Option<&Path>) -> Result<Matcher, HostError> {
    let catalog = match catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin(),
    };
    Ok(Matcher::new(catalog))
}

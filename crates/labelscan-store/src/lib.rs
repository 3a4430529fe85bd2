//! Corpus loading and artifact persistence.

pub mod artifact;
pub mod corpus;
pub mod error;
pub mod pair;

pub use artifact::{Artifact, ArtifactKind, FORMAT_VERSION, load_artifact, save_artifact};
pub use corpus::load_corpus;
pub use error::StoreError;
pub use pair::{ArtifactPair, CURRENT_FILE, MODEL_FILE, VECTORIZER_FILE};

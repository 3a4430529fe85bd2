//! Text classification: TF-IDF features and gradient-boosted trees.

mod error;
pub mod evaluate;
pub mod gbdt;
pub mod split;
pub mod trainer;
pub mod vectorizer;

pub use error::AiError;
pub use evaluate::{ClassMetrics, EvaluationReport, evaluate};
pub use gbdt::{BoosterConfig, GradientBoostedModel, Prediction};
pub use split::{Split, stratified_split};
pub use trainer::{FittedPipeline, TrainConfig, TrainedModel, Trainer};
pub use vectorizer::{FeatureVector, TfidfVectorizer, Vocabulary};

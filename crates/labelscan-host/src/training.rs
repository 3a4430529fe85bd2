//! Train a pair from a corpus and persist it only once training succeeded.

use std::path::Path;

use labelscan_ai::{EvaluationReport, TrainConfig, Trainer};
use labelscan_core::Corpus;
use labelscan_store::ArtifactPair;
use tracing::info;

use crate::HostError;

/// What a successful training run produced.
#[derive(Debug)]
pub struct TrainOutcome {
    pub pair: ArtifactPair,
    pub train_size: usize,
    pub held_out_size: usize,
    /// `None` when nothing could be held out.
    pub report: Option<EvaluationReport>,
}

/// Fit, evaluate, and save the pair into `artifacts_dir`.
pub fn train_and_save(
    corpus: &Corpus,
    config: TrainConfig,
    artifacts_dir: &Path,
) -> Result<TrainOutcome, HostError> {
    let trainer = Trainer::new(config);
    let pipeline = trainer.fit_corpus(corpus)?;
    let trained = pipeline.trained;
    let pair = ArtifactPair::new(pipeline.vectorizer, trained.model, trainer.config().clone())?;
    pair.save(artifacts_dir)?;
    info!(
        run_id = %pair.run_id,
        samples = corpus.len(),
        vocabulary = pair.vectorizer.dim(),
        "training run complete"
    );
    Ok(TrainOutcome {
        pair,
        train_size: trained.split.train.len(),
        held_out_size: trained.split.held_out.len(),
        report: trained.report,
    })
}

//! Inference orchestrator: one resident artifact pair, shared across threads.

use std::path::Path;
use std::sync::{Arc, RwLock};

use labelscan_ai::{AiError, EvaluationReport, Prediction, evaluate};
use labelscan_core::{Corpus, DetectionResult, ImageSource, Matcher, TextExtractor};
use labelscan_store::ArtifactPair;
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};
use tracing::{info, warn};

use crate::HostError;

/// Outcome of classifying one text.
///
/// The prediction may fail on its own; detections are always present.
#[derive(Debug)]
pub struct Classification {
    pub prediction: Result<Prediction, AiError>,
    pub detections: DetectionResult,
}

impl Classification {
    pub fn label(&self) -> Option<&str> {
        self.prediction.as_ref().ok().map(|p| p.label.as_str())
    }
}

impl Serialize for Classification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Classification", 4)?;
        match &self.prediction {
            Ok(p) => {
                s.serialize_field("prediction", p)?;
                s.serialize_field("error", &None::<String>)?;
            }
            Err(e) => {
                s.serialize_field("prediction", &None::<Prediction>)?;
                s.serialize_field("error", &Some(e.to_string()))?;
            }
        }
        s.serialize_field("allergens", &self.detections.allergens)?;
        s.serialize_field("additives", &self.detections.additives)?;
        s.end()
    }
}

/// OCR text together with its classification.
#[derive(Debug, Serialize)]
pub struct Scan {
    pub text: String,
    #[serde(flatten)]
    pub classification: Classification,
}

/// Keeps a vectorizer/model pair resident and answers `classify` calls.
///
/// Readers clone the current `Arc` and release the lock before any work, so
/// a [`reload`](Self::reload) never waits on an in-flight classification.
pub struct Orchestrator {
    current: RwLock<Arc<ArtifactPair>>,
    matcher: Matcher,
}

impl Orchestrator {
    /// Load the pair stored in `artifacts_dir`.
    pub fn open(artifacts_dir: &Path, matcher: Matcher) -> Result<Self, HostError> {
        let pair = ArtifactPair::load(artifacts_dir)?;
        info!(
            dir = %artifacts_dir.display(),
            run_id = %pair.run_id,
            "orchestrator ready"
        );
        Ok(Self::from_pair(pair, matcher))
    }

    /// Serve an in-memory pair. The caller is responsible for its consistency.
    pub fn from_pair(pair: ArtifactPair, matcher: Matcher) -> Self {
        Self {
            current: RwLock::new(Arc::new(pair)),
            matcher,
        }
    }

    /// The pair serving right now.
    pub fn pair(&self) -> Arc<ArtifactPair> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn run_id(&self) -> String {
        self.pair().run_id.clone()
    }

    /// Predict a label and run the matcher on `text`.
    pub fn classify(&self, text: &str) -> Classification {
        let pair = self.pair();
        let features = pair.vectorizer.transform_one(text);
        let prediction = pair.model.predict(&features);
        if let Err(e) = &prediction {
            warn!(run_id = %pair.run_id, error = %e, "prediction failed");
        }
        Classification {
            prediction,
            detections: self.matcher.detect(text),
        }
    }

    /// Extract text from `image`, then classify it.
    pub fn scan(
        &self,
        extractor: &dyn TextExtractor,
        image: &dyn ImageSource,
    ) -> Result<Scan, HostError> {
        let text = extractor.extract_text(image)?;
        info!(image = %image.describe(), chars = text.len(), "extracted label text");
        let classification = self.classify(&text);
        Ok(Scan {
            text,
            classification,
        })
    }

    /// Score the resident pair against every sample of `corpus`.
    pub fn evaluate(&self, corpus: &Corpus) -> Result<EvaluationReport, HostError> {
        let pair = self.pair();
        let features = pair.vectorizer.transform(&corpus.texts());
        let report = evaluate(&pair.model, &features, &corpus.labels())?;
        info!(
            run_id = %pair.run_id,
            samples = report.total,
            accuracy = report.accuracy,
            "evaluated corpus"
        );
        Ok(report)
    }

    /// Load the pair in `artifacts_dir` and swap it in.
    ///
    /// On failure the current pair keeps serving.
    pub fn reload(&self, artifacts_dir: &Path) -> Result<(), HostError> {
        let pair = match ArtifactPair::load(artifacts_dir) {
            Ok(pair) => Arc::new(pair),
            Err(e) => {
                warn!(
                    dir = %artifacts_dir.display(),
                    error = %e,
                    "reload failed, keeping current artifacts"
                );
                return Err(e.into());
            }
        };
        let previous = {
            let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *guard, pair)
        };
        info!(
            previous = %previous.run_id,
            current = %self.run_id(),
            "reloaded artifacts"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelscan_ai::{FeatureVector, Trainer};
    use labelscan_core::{Catalog, ImageBytes, OcrError, Sample};
    use tempfile::TempDir;

    fn pair(texts: &[(&str, &str)]) -> ArtifactPair {
        let corpus = Corpus::new(texts.iter().map(|(t, l)| Sample::new(*t, *l)).collect()).unwrap();
        let trainer = Trainer::default();
        let pipeline = trainer.fit_corpus(&corpus).unwrap();
        ArtifactPair::new(
            pipeline.vectorizer,
            pipeline.trained.model,
            trainer.config().clone(),
        )
        .unwrap()
    }

    fn milk_pair() -> ArtifactPair {
        pair(&[
            ("contains milk and wheat", "unsafe"),
            ("no allergens present", "safe"),
        ])
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::from_pair(milk_pair(), Matcher::new(Catalog::builtin()))
    }

    struct FixedText(&'static str);

    impl TextExtractor for FixedText {
        fn extract_text(&self, _image: &dyn ImageSource) -> Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    struct Unavailable;

    impl TextExtractor for Unavailable {
        fn extract_text(&self, _image: &dyn ImageSource) -> Result<String, OcrError> {
            Err(OcrError::BackendNotAvailable("test backend".into()))
        }
    }

    #[test]
    fn classify_returns_label_and_detections() {
        let orch = orchestrator();
        let result = orch.classify("Contains MILK");
        let prediction = result.prediction.as_ref().unwrap();
        assert!(["safe", "unsafe"].contains(&prediction.label.as_str()));
        assert!(prediction.probability >= 0.5 && prediction.probability <= 1.0);
        assert_eq!(result.detections.allergens[0].name, "Susu");
    }

    #[test]
    fn prediction_failure_keeps_detections() {
        let mut broken = milk_pair();
        broken.vectorizer = pair(&[("egg", "unsafe"), ("rice", "safe")]).vectorizer;
        let orch = Orchestrator::from_pair(broken, Matcher::default());

        let result = orch.classify("milk and E120");
        assert!(matches!(result.prediction, Err(AiError::PredictionFailure(_))));
        assert!(result.label().is_none());
        assert_eq!(result.detections.allergens.len(), 1);
        assert_eq!(result.detections.additives[0].code, "E120");
    }

    #[test]
    fn classification_serializes_flat() {
        let orch = orchestrator();
        let json = serde_json::to_value(orch.classify("milk")).unwrap();
        assert!(json["prediction"]["label"].is_string());
        assert!(json["error"].is_null());
        assert_eq!(json["allergens"][0]["name"], "Susu");
        assert_eq!(json["additives"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn scan_runs_ocr_then_classifies() {
        let orch = orchestrator();
        let image = ImageBytes::new(vec![0x89, b'P', b'N', b'G']);
        let scan = orch.scan(&FixedText("Susu, E 471"), &image).unwrap();
        assert_eq!(scan.text, "Susu, E 471");
        assert_eq!(scan.classification.detections.additives[0].code, "E471");
    }

    #[test]
    fn scan_propagates_ocr_errors() {
        let orch = orchestrator();
        let image = ImageBytes::new(Vec::new());
        assert!(matches!(
            orch.scan(&Unavailable, &image),
            Err(HostError::Ocr(OcrError::BackendNotAvailable(_)))
        ));
    }

    #[test]
    fn open_requires_artifacts() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            Orchestrator::open(tmp.path(), Matcher::default()),
            Err(HostError::Store(_))
        ));
    }

    #[test]
    fn reload_swaps_pair() {
        let tmp = TempDir::new().unwrap();
        let next = pair(&[("egg", "unsafe"), ("rice", "safe")]);
        next.save(tmp.path()).unwrap();

        let orch = orchestrator();
        let before = orch.pair();
        orch.reload(tmp.path()).unwrap();
        assert_eq!(orch.run_id(), next.run_id);
        // Holders of the old Arc still see the old pair.
        assert_ne!(before.run_id, next.run_id);
        assert!(before.vectorizer.vocabulary().index_of("milk").is_some());
    }

    #[test]
    fn failed_reload_keeps_serving() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator();
        let run_id = orch.run_id();

        assert!(orch.reload(tmp.path()).is_err());
        assert_eq!(orch.run_id(), run_id);
        assert!(orch.classify("milk").prediction.is_ok());
    }

    #[test]
    fn evaluate_scores_corpus() {
        let mut texts = Vec::new();
        for _ in 0..10 {
            texts.push(("contains milk and wheat", "unsafe"));
            texts.push(("no allergens present", "safe"));
        }
        let orch = Orchestrator::from_pair(pair(&texts), Matcher::default());
        let corpus = Corpus::new(vec![
            Sample::new("contains milk and wheat", "unsafe"),
            Sample::new("no allergens present", "safe"),
        ])
        .unwrap();
        let report = orch.evaluate(&corpus).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.accuracy, 1.0);
    }

    #[test]
    fn concurrent_classify_during_reload() {
        let tmp = TempDir::new().unwrap();
        pair(&[("egg", "unsafe"), ("rice", "safe")])
            .save(tmp.path())
            .unwrap();
        let orch = orchestrator();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let result = orch.classify("contains milk");
                        assert!(result.prediction.is_ok());
                        assert_eq!(result.detections.allergens[0].name, "Susu");
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..5 {
                    orch.reload(tmp.path()).unwrap();
                }
            });
        });
    }

    #[test]
    fn feature_dim_matches_model() {
        let orch = orchestrator();
        let pair = orch.pair();
        let x: FeatureVector = pair.vectorizer.transform_one("anything");
        assert_eq!(x.dim(), pair.model.n_features());
    }
}

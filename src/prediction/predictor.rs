//! Batch orchestration: extract → encode → ensemble → decode.

use super::{PredictionResult, UrlTable};
use crate::config::{EncoderConfig, ServiceConfig};
use crate::error::PredictionError;
use crate::features::{FeatureBatch, TldEncoder, Vocabulary};
use crate::model::{EnsembleEngine, ModelError, ModelStore, OnnxModelStore};
use crate::verdict::Label;
use std::time::Instant;
use tracing::{debug, info};

/// Owns the loaded ensemble. Stateless per call; share behind an `Arc`.
pub struct Predictor {
    engine: EnsembleEngine,
    encoder: TldEncoder,
}

impl Predictor {
    pub fn new(engine: EnsembleEngine, encoder: TldEncoder) -> Self {
        Self { engine, encoder }
    }

    /// Load all ONNX artifacts named in `config`. Fails if any is missing or unreadable.
    pub fn load(config: &ServiceConfig) -> Result<Self, PredictionError> {
        let store = OnnxModelStore::new(&config.models.dir).with_sessions(config.models.sessions);
        Self::from_store(&store, config)
    }

    /// Same as [`Predictor::load`] with artifacts taken from `store`.
    pub fn from_store(store: &dyn ModelStore, config: &ServiceConfig) -> Result<Self, PredictionError> {
        let engine = EnsembleEngine::load(store, &config.models)?;
        let encoder = tld_encoder(&config.encoder)?;
        info!(models = ?engine.model_names(), "ensemble ready");
        Ok(Self::new(engine, encoder))
    }

    pub fn predict_one(&self, url: &str) -> Result<PredictionResult, PredictionError> {
        self.predict_batch(&[url])?
            .pop()
            .ok_or_else(|| PredictionError::Inference {
                model: self.engine.model_names()[3].to_string(),
                source: ModelError::Malformed("no result row".to_string()),
            })
    }

    /// One result per input URL, in input order.
    pub fn predict_batch<S: AsRef<str>>(
        &self,
        urls: &[S],
    ) -> Result<Vec<PredictionResult>, PredictionError> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();

        let batch = FeatureBatch::extract(urls);
        let matrix = batch.encode(&self.encoder);
        debug!(rows = batch.len(), "features encoded");

        let ids = self.engine.predict(matrix.view())?;
        let results = urls
            .iter()
            .zip(ids)
            .map(|(url, id)| {
                let label = Label::from_class_id(id)?;
                Ok(PredictionResult {
                    url: url.as_ref().to_string(),
                    detection: label.is_detection(),
                    label,
                })
            })
            .collect::<Result<Vec<_>, PredictionError>>()?;

        info!(
            count = results.len(),
            detections = results.iter().filter(|r| r.detection).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch classified"
        );
        Ok(results)
    }

    /// Predict every row of a table. Rejects tables without a `url` column.
    pub fn predict_table(&self, table: &UrlTable) -> Result<Vec<PredictionResult>, PredictionError> {
        let urls = table.urls()?;
        self.predict_batch(urls.as_slice())
    }
}

fn tld_encoder(config: &EncoderConfig) -> Result<TldEncoder, PredictionError> {
    let Some(path) = &config.vocabulary_path else {
        return Ok(TldEncoder::PerBatch);
    };
    let vocab = Vocabulary::load(path).map_err(|source| PredictionError::ArtifactLoad {
        name: path.display().to_string(),
        source,
    })?;
    info!(classes = vocab.len(), "fixed TLD vocabulary loaded");
    Ok(TldEncoder::Fixed(vocab))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::TLD_COLUMN;
    use crate::model::Classifier;
    use ndarray::ArrayView2;

    struct Column(usize);

    impl Classifier for Column {
        fn predict(&self, x: ArrayView2<'_, f32>) -> Result<Vec<f32>, ModelError> {
            Ok(x.column(self.0).to_vec())
        }
    }

    /// Base models echo the TLD code; the meta model echoes the first base column.
    struct EchoStore;

    impl ModelStore for EchoStore {
        fn load_artifact(&self, name: &str) -> Result<Box<dyn Classifier>, ModelError> {
            Ok(match name {
                "rf_model" => Box::new(Column(0)),
                _ => Box::new(Column(TLD_COLUMN)),
            })
        }
    }

    const URLS: [&str; 4] = ["http://a.org/", "http://b.net/", "http://c.xyz/", "http://d.com/"];

    fn labels(p: &Predictor) -> Vec<Label> {
        p.predict_batch(&URLS).unwrap().into_iter().map(|r| r.label).collect()
    }

    #[test]
    fn fixed_vocabulary_is_used_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tld_vocabulary.json");
        std::fs::write(&path, r#"["com","org","net"]"#).unwrap();

        let mut config = ServiceConfig::default();
        config.encoder.vocabulary_path = Some(path);
        let p = Predictor::from_store(&EchoStore, &config).unwrap();
        // org=1, net=2, xyz out of vocabulary=3, com=0
        assert_eq!(
            labels(&p),
            vec![Label::Defacement, Label::Malware, Label::Phishing, Label::Benign]
        );
    }

    #[test]
    fn per_batch_encoding_without_vocabulary() {
        let p = Predictor::from_store(&EchoStore, &ServiceConfig::default()).unwrap();
        // sorted distinct: com, net, org, xyz
        assert_eq!(
            labels(&p),
            vec![Label::Malware, Label::Defacement, Label::Phishing, Label::Benign]
        );
    }

    #[test]
    fn missing_vocabulary_is_artifact_load_error() {
        let mut config = ServiceConfig::default();
        config.encoder.vocabulary_path = Some("nonexistent/tld_vocabulary.json".into());
        match Predictor::from_store(&EchoStore, &config) {
            Err(PredictionError::ArtifactLoad { name, source }) => {
                assert_eq!(name, "nonexistent/tld_vocabulary.json");
                assert!(matches!(source, ModelError::NotFound(_)));
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("predictor built without its vocabulary"),
        }
    }

    #[test]
    fn malformed_vocabulary_is_artifact_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tld_vocabulary.json");
        std::fs::write(&path, "{}").unwrap();
        let config = EncoderConfig {
            vocabulary_path: Some(path),
        };
        assert!(matches!(
            tld_encoder(&config),
            Err(PredictionError::ArtifactLoad {
                source: ModelError::Malformed(_),
                ..
            })
        ));
    }
}

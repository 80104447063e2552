//! Stacking: three base classifiers feed an N×3 meta matrix, a meta-classifier
//! turns it into one class id per row.

use super::{Classifier, ModelError, ModelStore};
use crate::config::ModelsConfig;
use crate::error::PredictionError;
use ndarray::{Array2, ArrayView2};
use tracing::debug;

struct Member {
    name: String,
    model: Box<dyn Classifier>,
}

impl Member {
    fn load(store: &dyn ModelStore, name: &str) -> Result<Self, PredictionError> {
        let model = store
            .load_artifact(name)
            .map_err(|source| PredictionError::ArtifactLoad {
                name: name.to_string(),
                source,
            })?;
        Ok(Self {
            name: name.to_string(),
            model,
        })
    }

    fn run(&self, features: ArrayView2<'_, f32>) -> Result<Vec<f32>, PredictionError> {
        let column = self
            .model
            .predict(features)
            .map_err(|source| self.failure(source))?;
        if column.len() != features.nrows() {
            return Err(self.failure(ModelError::Malformed(format!(
                "{} outputs for {} rows",
                column.len(),
                features.nrows()
            ))));
        }
        Ok(column)
    }

    fn failure(&self, source: ModelError) -> PredictionError {
        PredictionError::Inference {
            model: self.name.clone(),
            source,
        }
    }
}

/// Three base classifiers in meta-column order plus the meta-classifier.
/// Read-only after construction; share it behind an `Arc`.
pub struct EnsembleEngine {
    base: [Member; 3],
    meta: Member,
}

impl EnsembleEngine {
    /// Load all four artifacts. Any failure aborts construction.
    pub fn load(store: &dyn ModelStore, config: &ModelsConfig) -> Result<Self, PredictionError> {
        let [a, b, c] = &config.base_models;
        Ok(Self {
            base: [
                Member::load(store, a)?,
                Member::load(store, b)?,
                Member::load(store, c)?,
            ],
            meta: Member::load(store, &config.meta_model)?,
        })
    }

    pub fn from_classifiers(
        base: [(String, Box<dyn Classifier>); 3],
        meta: (String, Box<dyn Classifier>),
    ) -> Self {
        let member = |(name, model): (String, Box<dyn Classifier>)| Member { name, model };
        Self {
            base: base.map(member),
            meta: member(meta),
        }
    }

    /// Names in order: base A, B, C, then meta.
    pub fn model_names(&self) -> [&str; 4] {
        [
            self.base[0].name.as_str(),
            self.base[1].name.as_str(),
            self.base[2].name.as_str(),
            self.meta.name.as_str(),
        ]
    }

    /// Class id per row of the encoded feature matrix.
    pub fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Vec<i64>, PredictionError> {
        let rows = features.nrows();
        let mut meta_inputs = Array2::<f32>::zeros((rows, self.base.len()));
        for (j, member) in self.base.iter().enumerate() {
            let column = member.run(features)?;
            for (i, v) in column.into_iter().enumerate() {
                meta_inputs[[i, j]] = v;
            }
        }
        debug!(rows, "base classifiers done");

        self.meta
            .run(meta_inputs.view())?
            .into_iter()
            .map(|v| {
                class_id(v).ok_or_else(|| {
                    self.meta
                        .failure(ModelError::Malformed(format!("non-integral class id {}", v)))
                })
            })
            .collect()
    }
}

fn class_id(v: f32) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 {
        Some(v as i64)
    } else {
        None
    }
}

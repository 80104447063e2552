//! Errors surfaced by the prediction core.

use crate::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictionError {
    /// Batch source is not a table with a `url` column. Nothing was processed.
    #[error("invalid input format: {0}")]
    InvalidInputFormat(String),

    /// Meta-classifier emitted an id with no label.
    #[error("unrecognized class id {0}")]
    UnrecognizedClassId(i64),

    /// A model artifact could not be loaded at startup.
    #[error("failed to load artifact `{name}`: {source}")]
    ArtifactLoad {
        name: String,
        #[source]
        source: ModelError,
    },

    /// A classifier failed or returned a malformed column at run time.
    #[error("inference failed in `{model}`: {source}")]
    Inference {
        model: String,
        #[source]
        source: ModelError,
    },
}

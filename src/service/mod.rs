//! Caller-facing services: submitting URLs for prediction and moderating the
//! resulting history. Every operation takes an already-resolved [`Identity`].
//!
//! [`Identity`]: crate::identity::Identity

mod history;
mod prediction;

pub use history::{ClassifierTotal, HistoryListing, HistoryService, Report};
pub use prediction::PredictionService;

use crate::error::PredictionError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("history not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    UploadTooLarge { size: usize, limit: usize },

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

//! Prediction orchestrator: the entry point from URLs to labelled results.

mod predictor;
mod table;

pub use predictor::Predictor;
pub use table::{UrlTable, URL_COLUMN};

use crate::verdict::Label;
use serde::{Deserialize, Serialize};

/// Outcome for one input URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub url: String,
    pub detection: bool,
    #[serde(rename = "classifier")]
    pub label: Label,
}

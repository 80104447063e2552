//! urlsentry — URL threat classification with a stacked model ensemble.
//!
//! Modular structure:
//! - [`features`] — Lexical URL features and TLD encoding
//! - [`model`] — ONNX classifiers and the stacking ensemble
//! - [`verdict`] — Class id → label → detection
//! - [`prediction`] — Batch orchestration from URLs to results
//! - [`storage`] — Encrypted history store
//! - [`service`] — Submission and moderation workflow
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod error;
pub mod features;
pub mod identity;
pub mod logging;
pub mod model;
pub mod prediction;
pub mod service;
pub mod storage;
pub mod verdict;

pub use config::ServiceConfig;
pub use error::PredictionError;
pub use features::{FeatureBatch, FeatureVector, TldEncoder};
pub use identity::{Identity, Role};
pub use logging::StructuredLogger;
pub use model::{Classifier, EnsembleEngine, ModelStore, OnnxModelStore};
pub use prediction::{PredictionResult, Predictor, UrlTable};
pub use service::{HistoryService, PredictionService, ServiceError};
pub use storage::{HistoryStore, SqliteHistoryStore};
pub use verdict::Label;

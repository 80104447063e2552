//! Pre-trained classifiers and the stacked ensemble built from them.
//!
//! Artifacts are opaque and read-only: a [`ModelStore`] hands out [`Classifier`]
//! handles once at startup, and nothing in this crate retrains or mutates them.

mod ensemble;
mod onnx;

pub use ensemble::EnsembleEngine;
pub use onnx::{OnnxClassifier, OnnxModelStore};

use ndarray::ArrayView2;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("onnx runtime: {0}")]
    Runtime(#[from] ort::Error),

    #[error("malformed model data: {0}")]
    Malformed(String),
}

/// A fitted classifier. Produces one output value per input row.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Vec<f32>, ModelError>;
}

/// Source of named classifier artifacts.
pub trait ModelStore {
    fn load_artifact(&self, name: &str) -> Result<Box<dyn Classifier>, ModelError>;
}

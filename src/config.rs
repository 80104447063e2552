//! Service configuration. JSON file; every section falls back to its defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Data directory (history database)
    pub data_dir: PathBuf,
    /// Stacked ensemble artifacts
    pub models: ModelsConfig,
    /// TLD encoding mode
    pub encoder: EncoderConfig,
    /// History store
    pub storage: StorageConfig,
    /// Upload limits
    pub upload: UploadConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory holding `<name>.onnx` artifacts
    pub dir: PathBuf,
    /// Base classifiers, in meta-feature column order
    pub base_models: [String; 3],
    /// Stacking meta-classifier
    pub meta_model: String,
    /// ONNX sessions per artifact (concurrent callers served without waiting)
    pub sessions: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// JSON array of training-time TLD classes. Unset: codes are fit per batch.
    pub vocabulary_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file name, relative to `data_dir`
    pub file: String,
    /// Environment variable holding the at-rest encryption secret
    pub secret_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest accepted upload, in bytes
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            models: ModelsConfig::default(),
            encoder: EncoderConfig::default(),
            storage: StorageConfig::default(),
            upload: UploadConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("ml_models"),
            base_models: [
                "xgb_model".to_string(),
                "lgb_model".to_string(),
                "cat_model".to_string(),
            ],
            meta_model: "rf_model".to_string(),
            sessions: 1,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            file: "history.db".to_string(),
            secret_env: "URLSENTRY_STORE_SECRET".to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10_000_000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("urlsentry"))
        .unwrap_or_else(|| PathBuf::from(".urlsentry"))
}

impl ServiceConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<ServiceConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }

    /// Path of the history database
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.file)
    }
}

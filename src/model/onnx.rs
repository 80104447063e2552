//! ONNX Runtime classifiers. Input: [rows, cols] f32. Output: first model output,
//! integer labels or per-class scores, collapsed to one value per row.

use super::{Classifier, ModelError, ModelStore};
use ndarray::ArrayView2;
use ort::session::Session;
use ort::value::{DynValue, Tensor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Fixed set of exclusively-used slots. A caller takes the first idle slot;
/// when all are busy it waits on one chosen round-robin.
struct SessionPool<T> {
    slots: Vec<Mutex<T>>,
    next: AtomicUsize,
}

impl<T> SessionPool<T> {
    /// `None` when `items` is empty.
    fn new(items: Vec<T>) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        Some(Self {
            slots: items.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
        })
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, ModelError> {
        for slot in &self.slots {
            if let Ok(mut item) = slot.try_lock() {
                return Ok(f(&mut item));
            }
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        let mut item = self.slots[i]
            .lock()
            .map_err(|_| ModelError::Malformed("session lock poisoned".to_string()))?;
        Ok(f(&mut item))
    }
}

pub struct OnnxClassifier {
    // Session::run needs exclusive access; one session per concurrent caller.
    sessions: SessionPool<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxClassifier {
    /// Load `sessions` (at least one) copies of the model at `path`.
    /// Missing or unreadable files are errors; there is no no-op mode.
    pub fn load(path: &Path, sessions: usize) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }

        let loaded = (0..sessions.max(1))
            .map(|_| Session::builder()?.commit_from_file(path))
            .collect::<Result<Vec<_>, _>>()?;
        let session = &loaded[0];

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "input".to_string());
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| ModelError::Malformed(format!("{} has no outputs", path.display())))?;

        let sessions = SessionPool::new(loaded)
            .ok_or_else(|| ModelError::Malformed(format!("{} loaded no sessions", path.display())))?;
        Ok(Self {
            sessions,
            input_name,
            output_name,
        })
    }

    pub fn sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Vec<f32>, ModelError> {
        let (rows, cols) = features.dim();
        let data: Vec<f32> = features.iter().copied().collect();
        let input = Tensor::from_array(([rows as i64, cols as i64], data))?;

        let values = self.sessions.with(|session| {
            let outputs = session.run(ort::inputs![self.input_name.as_str() => input])?;
            let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
                ModelError::Malformed(format!("missing output `{}`", self.output_name))
            })?;
            output_values(output)
        })??;

        collapse(&values, rows)
    }
}

fn output_values(output: &DynValue) -> Result<Vec<f32>, ModelError> {
    if let Ok((_, labels)) = output.try_extract_tensor::<i64>() {
        return Ok(labels.iter().map(|&l| l as f32).collect());
    }
    let (_, scores) = output.try_extract_tensor::<f32>()?;
    Ok(scores.to_vec())
}

/// One value per row: labels pass through, score matrices reduce to the argmax class.
fn collapse(values: &[f32], rows: usize) -> Result<Vec<f32>, ModelError> {
    if rows == 0 {
        return Ok(Vec::new());
    }
    if values.len() == rows {
        return Ok(values.to_vec());
    }
    if values.is_empty() || values.len() % rows != 0 {
        return Err(ModelError::Malformed(format!(
            "{} output values for {} rows",
            values.len(),
            rows
        )));
    }
    let classes = values.len() / rows;
    Ok(values
        .chunks(classes)
        .map(|scores| {
            scores
                .iter()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |best, (i, &s)| {
                    if s > best.1 {
                        (i, s)
                    } else {
                        best
                    }
                })
                .0 as f32
        })
        .collect())
}

/// Artifacts stored as `<dir>/<name>.onnx`.
#[derive(Debug, Clone)]
pub struct OnnxModelStore {
    dir: PathBuf,
    sessions: usize,
}

impl OnnxModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sessions: 1,
        }
    }

    /// Sessions loaded per artifact; the number of callers one model serves at once.
    pub fn with_sessions(mut self, sessions: usize) -> Self {
        self.sessions = sessions.max(1);
        self
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.onnx", name))
    }
}

impl ModelStore for OnnxModelStore {
    fn load_artifact(&self, name: &str) -> Result<Box<dyn Classifier>, ModelError> {
        let path = self.artifact_path(name);
        let classifier = OnnxClassifier::load(&path, self.sessions)?;
        info!(
            artifact = name,
            path = %path.display(),
            sessions = classifier.sessions(),
            "model artifact loaded"
        );
        Ok(Box::new(classifier))
    }
}

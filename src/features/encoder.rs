//! Integer codes for the categorical top-level-domain column.

use crate::model::ModelError;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Training-time TLD classes; code = position in the list.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    codes: HashMap<String, usize>,
    len: usize,
}

impl Vocabulary {
    pub fn new(classes: Vec<String>) -> Self {
        let len = classes.len();
        let mut codes = HashMap::with_capacity(len);
        for (i, class) in classes.into_iter().enumerate() {
            codes.entry(class).or_insert(i);
        }
        Self { codes, len }
    }

    /// Load a JSON array of class strings.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let classes: Vec<String> = serde_json::from_str(&data)
            .map_err(|e| ModelError::Malformed(format!("vocabulary {}: {}", path.display(), e)))?;
        Ok(Self::new(classes))
    }

    /// Code for `tld`; unseen values share the out-of-vocabulary code `len()`.
    pub fn code(&self, tld: &str) -> usize {
        self.codes.get(tld).copied().unwrap_or(self.len)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, Default)]
pub enum TldEncoder {
    /// Fit a fresh mapping on every batch: sorted distinct values, code = rank.
    /// Codes are not stable across batches.
    #[default]
    PerBatch,
    /// Fixed mapping captured at training time.
    Fixed(Vocabulary),
}

impl TldEncoder {
    /// Codes for one batch of TLD strings, in input order.
    pub fn codes<S: AsRef<str>>(&self, tlds: &[S]) -> Vec<usize> {
        match self {
            TldEncoder::PerBatch => {
                let distinct: BTreeSet<&str> = tlds.iter().map(AsRef::as_ref).collect();
                let rank: HashMap<&str, usize> =
                    distinct.into_iter().enumerate().map(|(i, t)| (t, i)).collect();
                tlds.iter().map(|t| rank[t.as_ref()]).collect()
            }
            TldEncoder::Fixed(vocab) => tlds.iter().map(|t| vocab.code(t.as_ref())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_batch_codes_are_sorted_ranks() {
        let codes = TldEncoder::PerBatch.codes(&["net", "com", "", "net", "org"]);
        assert_eq!(codes, vec![2, 1, 0, 2, 3]);
    }

    #[test]
    fn per_batch_codes_shift_with_batch_contents() {
        let a = TldEncoder::PerBatch.codes(&["com", "org"]);
        let b = TldEncoder::PerBatch.codes(&["biz", "com", "org"]);
        assert_eq!(a[0], 0);
        assert_eq!(b[1], 1);
    }

    #[test]
    fn fixed_vocabulary_maps_unknown_to_oov() {
        let vocab = Vocabulary::new(vec!["com".into(), "net".into(), "com".into()]);
        let enc = TldEncoder::Fixed(vocab);
        assert_eq!(enc.codes(&["net", "com", "xyz"]), vec![1, 0, 3]);
    }

    #[test]
    fn vocabulary_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tlds.json");
        std::fs::write(&path, r#"["com","org"]"#).unwrap();
        let v = Vocabulary::load(&path).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v.code("org"), 1);

        assert!(matches!(
            Vocabulary::load(&dir.path().join("missing.json")),
            Err(ModelError::NotFound(_))
        ));
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Vocabulary::load(&path), Err(ModelError::Malformed(_))));
    }
}

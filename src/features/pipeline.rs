//! Batch pipeline: URLs → feature rows → encoded model matrix.

use super::{extract, FeatureVector, TldEncoder, FEATURE_COUNT};
use ndarray::Array2;

/// One feature row per input URL, in input order.
#[derive(Debug, Clone, Default)]
pub struct FeatureBatch {
    rows: Vec<FeatureVector>,
}

impl FeatureBatch {
    pub fn extract<S: AsRef<str>>(urls: &[S]) -> Self {
        Self {
            rows: urls.iter().map(|u| extract(u.as_ref())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// N × FEATURE_COUNT matrix with the TLD column replaced by encoder codes.
    pub fn encode(&self, encoder: &TldEncoder) -> Array2<f32> {
        let tlds: Vec<&str> = self
            .rows
            .iter()
            .map(|r| r.top_level_domain.as_str())
            .collect();
        let codes = encoder.codes(&tlds);

        let mut matrix = Array2::<f32>::zeros((self.rows.len(), FEATURE_COUNT));
        for (i, (row, code)) in self.rows.iter().zip(codes).enumerate() {
            for (j, v) in row.to_row(code as f32).into_iter().enumerate() {
                matrix[[i, j]] = v;
            }
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::TLD_COLUMN;

    #[test]
    fn encode_preserves_row_order() {
        let batch = FeatureBatch::extract(&["http://b.org/", "http://192.168.0.1/", "http://a.com/"]);
        let m = batch.encode(&TldEncoder::PerBatch);
        assert_eq!(m.shape(), &[3, FEATURE_COUNT]);
        // distinct sorted: "1", "com", "org"
        assert_eq!(m[[0, TLD_COLUMN]], 2.0);
        assert_eq!(m[[1, TLD_COLUMN]], 0.0);
        assert_eq!(m[[2, TLD_COLUMN]], 1.0);
        assert_eq!(m[[1, 0]], 1.0);
    }

    #[test]
    fn empty_batch_encodes_to_empty_matrix() {
        let batch = FeatureBatch::extract::<&str>(&[]);
        assert!(batch.is_empty());
        assert_eq!(batch.encode(&TldEncoder::PerBatch).shape(), &[0, FEATURE_COUNT]);
    }
}

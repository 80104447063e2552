//! URL feature extraction and batch encoding for model input.

mod encoder;
mod lexical;
mod parse;
mod pipeline;

pub use encoder::{TldEncoder, Vocabulary};
pub use lexical::extract;
pub use parse::UrlParts;
pub use pipeline::FeatureBatch;

use serde::{Deserialize, Serialize};

/// Number of model input columns.
pub const FEATURE_COUNT: usize = 20;

/// Column order the model artifacts were fit against.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "use_of_ip",
    "suspicious_words",
    "digit_count",
    "count_?",
    "count_@",
    "no_of_dir",
    "count-.",
    "count-www",
    "count_embedded_domain",
    "short_url",
    "count_https",
    "count_http",
    "count_%20",
    "count_dash",
    "count_equal",
    "url_length",
    "hostname_length",
    "first_dir_length",
    "top_level_domain",
    "count_letters",
];

/// Index of the categorical column replaced by the TLD encoder.
pub const TLD_COLUMN: usize = 18;

/// Named features of one URL. Serializes with the column names in `FEATURE_NAMES`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub use_of_ip: u32,
    pub suspicious_words: u32,
    pub digit_count: u32,
    #[serde(rename = "count_?")]
    pub count_question: u32,
    #[serde(rename = "count_@")]
    pub count_at: u32,
    pub no_of_dir: u32,
    #[serde(rename = "count-.")]
    pub count_dot: u32,
    #[serde(rename = "count-www")]
    pub count_www: u32,
    pub count_embedded_domain: u32,
    pub short_url: u32,
    pub count_https: u32,
    pub count_http: u32,
    #[serde(rename = "count_%20")]
    pub count_space_escape: u32,
    pub count_dash: u32,
    pub count_equal: u32,
    pub url_length: u32,
    pub hostname_length: u32,
    pub first_dir_length: u32,
    pub top_level_domain: String,
    pub count_letters: u32,
}

impl FeatureVector {
    /// Numeric model row in `FEATURE_NAMES` order, with the TLD replaced by its code.
    pub fn to_row(&self, tld_code: f32) -> [f32; FEATURE_COUNT] {
        [
            self.use_of_ip as f32,
            self.suspicious_words as f32,
            self.digit_count as f32,
            self.count_question as f32,
            self.count_at as f32,
            self.no_of_dir as f32,
            self.count_dot as f32,
            self.count_www as f32,
            self.count_embedded_domain as f32,
            self.short_url as f32,
            self.count_https as f32,
            self.count_http as f32,
            self.count_space_escape as f32,
            self.count_dash as f32,
            self.count_equal as f32,
            self.url_length as f32,
            self.hostname_length as f32,
            self.first_dir_length as f32,
            tld_code,
            self.count_letters as f32,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_keys_follow_column_order() {
        let json = serde_json::to_string(&extract("http://example.com/")).unwrap();
        let mut last = 0;
        for name in FEATURE_NAMES {
            let at = json
                .find(&format!("\"{}\":", name))
                .unwrap_or_else(|| panic!("missing {name}"));
            assert!(at >= last, "{name} out of order");
            last = at;
        }
    }

    #[test]
    fn row_places_tld_code() {
        let row = extract("http://a.io/").to_row(7.0);
        assert_eq!(FEATURE_NAMES[TLD_COLUMN], "top_level_domain");
        assert_eq!(row[TLD_COLUMN], 7.0);
        assert_eq!(row[0], 0.0);
    }
}

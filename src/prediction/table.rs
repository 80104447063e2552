//! Tabular batch input: a header row plus records, one URL per record.

use crate::error::PredictionError;
use csv::StringRecord;

/// Name of the required URL column.
pub const URL_COLUMN: &str = "url";

#[derive(Debug, Clone, Default)]
pub struct UrlTable {
    headers: StringRecord,
    records: Vec<StringRecord>,
}

impl UrlTable {
    /// Parse comma-separated UTF-8 with a header row.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, PredictionError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);
        let headers = reader.headers().map_err(unreadable)?.clone();
        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(unreadable)?;
        Ok(Self { headers, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of the `url` column in row order. Short rows yield "".
    pub fn urls(&self) -> Result<Vec<&str>, PredictionError> {
        let idx = self
            .headers
            .iter()
            .position(|h| h == URL_COLUMN)
            .ok_or_else(|| {
                PredictionError::InvalidInputFormat(format!("missing `{}` column", URL_COLUMN))
            })?;
        Ok(self
            .records
            .iter()
            .map(|r| r.get(idx).unwrap_or(""))
            .collect())
    }
}

fn unreadable(e: csv::Error) -> PredictionError {
    PredictionError::InvalidInputFormat(format!("unreadable table: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_url_column_in_order() {
        let t = UrlTable::from_csv(b"id,url\n1,http://a.com\n2,\"http://b.com/?x=1,2\"\n3\n").unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.urls().unwrap(), vec!["http://a.com", "http://b.com/?x=1,2", ""]);
    }

    #[test]
    fn missing_url_column_is_invalid_format() {
        let t = UrlTable::from_csv(b"link\nhttp://a.com\n").unwrap();
        assert!(matches!(t.urls(), Err(PredictionError::InvalidInputFormat(_))));
    }

    #[test]
    fn header_match_is_exact() {
        let t = UrlTable::from_csv(b"URL\nhttp://a.com\n").unwrap();
        assert!(t.urls().is_err());
    }

    #[test]
    fn invalid_utf8_is_invalid_format() {
        assert!(matches!(
            UrlTable::from_csv(b"url\n\xff\xfe\n"),
            Err(PredictionError::InvalidInputFormat(_))
        ));
    }

    #[test]
    fn bom_and_crlf_are_accepted() {
        let t = UrlTable::from_csv(b"\xef\xbb\xbfurl\r\nhttp://a.com\r\nhttp://b.com\r\n").unwrap();
        assert_eq!(t.urls().unwrap(), vec!["http://a.com", "http://b.com"]);
    }
}

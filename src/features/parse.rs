//! Lenient generic-syntax URL decomposition: scheme, netloc, path, params, query, fragment.
//!
//! Components are sliced out of the input verbatim. Only the scheme is case-folded;
//! the network location keeps userinfo and port, nothing is percent-decoded, and
//! every input decomposes (absent components are empty).

/// Schemes whose last path segment may carry `;params`.
const PARAM_SCHEMES: &[&str] = &[
    "", "ftp", "hdl", "prospero", "http", "imap", "https", "shttp", "rtsp", "rtsps", "rtspu",
    "sip", "sips", "mms", "sftp", "tel",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: String,
    pub netloc: String,
    pub path: String,
    pub params: String,
    pub query: String,
    pub fragment: String,
}

impl UrlParts {
    pub fn split(url: &str) -> Self {
        let cleaned: String = url
            .trim_start_matches(|c: char| c <= ' ')
            .chars()
            .filter(|c| !matches!(c, '\t' | '\r' | '\n'))
            .collect();
        let mut rest = cleaned.as_str();
        let mut parts = UrlParts::default();

        if let Some(i) = rest.find(':') {
            let candidate = &rest[..i];
            if is_scheme(candidate) {
                parts.scheme = candidate.to_ascii_lowercase();
                rest = &rest[i + 1..];
            }
        }

        if let Some(after) = rest.strip_prefix("//") {
            let end = after
                .find(|c| matches!(c, '/' | '?' | '#'))
                .unwrap_or(after.len());
            parts.netloc = after[..end].to_string();
            rest = &after[end..];
        }

        if let Some((before, fragment)) = rest.split_once('#') {
            parts.fragment = fragment.to_string();
            rest = before;
        }
        if let Some((before, query)) = rest.split_once('?') {
            parts.query = query.to_string();
            rest = before;
        }

        if PARAM_SCHEMES.contains(&parts.scheme.as_str()) {
            if let Some(i) = params_start(rest) {
                parts.params = rest[i + 1..].to_string();
                rest = &rest[..i];
            }
        }
        parts.path = rest.to_string();
        parts
    }

    /// Combined character length of all six components.
    pub fn char_len(&self) -> usize {
        [
            &self.scheme,
            &self.netloc,
            &self.path,
            &self.params,
            &self.query,
            &self.fragment,
        ]
        .iter()
        .map(|c| c.chars().count())
        .sum()
    }
}

fn is_scheme(candidate: &str) -> bool {
    candidate
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

// Params hang off the last segment only.
fn params_start(path: &str) -> Option<usize> {
    match path.rfind('/') {
        Some(slash) => path[slash..].find(';').map(|i| slash + i),
        None => path.find(';'),
    }
}

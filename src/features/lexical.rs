//! Lexical and structural features of a single URL string.

use super::parse::UrlParts;
use super::FeatureVector;
use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

const SUSPICIOUS_WORDS: [&str; 8] = [
    "paypal", "login", "signin", "bank", "account", "update", "bonus", "ebay",
];

static SHORTENER: OnceLock<Regex> = OnceLock::new();

fn shortener() -> &'static Regex {
    SHORTENER.get_or_init(|| {
        Regex::new(
            r"(bit\.ly|goo\.gl|shorte\.st|go2l\.ink|x\.co|ow\.ly|tinyurl|tr\.im|is\.gd|cli\.gs|yfrog\.com|migre\.me|ff\.im|tiny\.cc)",
        )
        .expect("shortener pattern")
    })
}

/// Extract the full feature vector for one URL. Never fails: anything that does
/// not decompose cleanly falls back to 0 or the empty string.
pub fn extract(url: &str) -> FeatureVector {
    let parts = UrlParts::split(url);
    let lowered = url.to_lowercase();

    FeatureVector {
        use_of_ip: flag(parts.netloc.parse::<Ipv4Addr>().is_ok()),
        suspicious_words: flag(SUSPICIOUS_WORDS.iter().any(|w| lowered.contains(w))),
        digit_count: count_chars(url, |c| c.is_ascii_digit()),
        count_question: occurrences(url, "?"),
        count_at: occurrences(url, "@"),
        no_of_dir: occurrences(url, "/"),
        count_dot: occurrences(url, "."),
        count_www: occurrences(url, "www"),
        count_embedded_domain: occurrences(url, "//"),
        short_url: flag(shortener().is_match(url)),
        count_https: occurrences(url, "https"),
        count_http: occurrences(url, "http"),
        count_space_escape: occurrences(url, "%20"),
        count_dash: occurrences(url, "-"),
        count_equal: occurrences(url, "="),
        url_length: to_u32(parts.char_len()),
        hostname_length: to_u32(parts.netloc.chars().count()),
        first_dir_length: to_u32(first_dir(&parts.path).chars().count()),
        top_level_domain: top_level_domain(&parts.netloc).to_string(),
        count_letters: count_chars(url, |c| c.is_ascii_alphabetic()),
    }
}

fn flag(b: bool) -> u32 {
    u32::from(b)
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn occurrences(haystack: &str, needle: &str) -> u32 {
    to_u32(haystack.matches(needle).count())
}

fn count_chars(s: &str, pred: impl Fn(char) -> bool) -> u32 {
    to_u32(s.chars().filter(|&c| pred(c)).count())
}

/// Second element of the `/`-split path; empty when there is none.
fn first_dir(path: &str) -> &str {
    path.split('/').nth(1).unwrap_or("")
}

fn top_level_domain(netloc: &str) -> &str {
    netloc.rsplit_once('.').map(|(_, tld)| tld).unwrap_or("")
}

//! Heuristic textual signals derived from a message's plain-text body.
//!
//! Every signal is computed deterministically from the input text and the
//! fixed lexicons in [`lexicon`]; identical input always yields an identical
//! vector.

pub mod lexicon;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use self::lexicon::{
    COMMON_WORDS, LONG_WORD_THRESHOLD, REPEAT_RUN_LENGTH, STOPWORDS, URGENCY_KEYWORDS,
};

/// HTTP(S) URLs, matched in the original (non-folded) text.
static URL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("valid url pattern"));

/// Canonical `local@domain` address shape.
static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid address pattern")
});

/// Heuristic scalar signals for one message body.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FeatureVector {
    /// Alphabetic tokens in the body.
    pub word_count: usize,
    /// Distinct alphabetic tokens (case-folded).
    pub unique_word_count: usize,
    /// Tokens found in the stopword lexicon.
    pub stopword_count: usize,
    /// HTTP(S) URLs in the original text.
    pub link_count: usize,
    /// Distinct non-empty hostnames among those URLs.
    pub unique_domain_count: usize,
    /// Email-address-shaped substrings in the original text.
    pub embedded_email_count: usize,
    /// Overlong or repeat-heavy tokens outside the lexicons. A cheap stand-in
    /// for a real spell-checker, deliberately approximate.
    pub pseudo_misspelling_count: usize,
    /// Tokens found in the urgency lexicon.
    pub urgency_keyword_count: usize,
}

impl FeatureVector {
    /// Compute the full vector from a body text.
    pub fn compute(body_text: &str) -> Self {
        let tokens = tokenize(body_text);

        let word_count = tokens.len();
        let unique_word_count = tokens.iter().collect::<HashSet<_>>().len();
        let stopword_count = tokens
            .iter()
            .filter(|t| STOPWORDS.contains(t.as_str()))
            .count();
        let urgency_keyword_count = tokens
            .iter()
            .filter(|t| URGENCY_KEYWORDS.contains(t.as_str()))
            .count();
        let pseudo_misspelling_count = tokens
            .iter()
            .filter(|t| looks_misspelled(t))
            .count();

        let link_count = URL_SHAPE.find_iter(body_text).count();
        let unique_domain_count = URL_SHAPE
            .find_iter(body_text)
            .filter_map(|m| Url::parse(m.as_str()).ok())
            .filter_map(|u| u.host_str().map(str::to_lowercase))
            .filter(|h| !h.is_empty())
            .collect::<HashSet<_>>()
            .len();
        let embedded_email_count = EMAIL_SHAPE.find_iter(body_text).count();

        Self {
            word_count,
            unique_word_count,
            stopword_count,
            link_count,
            unique_domain_count,
            embedded_email_count,
            pseudo_misspelling_count,
            urgency_keyword_count,
        }
    }
}

/// Split text into case-folded, purely-alphabetic tokens. Digits,
/// punctuation, and symbols end the current token and are dropped.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphabetic() {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// The pseudo-misspelling heuristic: a token outside the stopword and
/// common-word lexicons that is overlong or contains a long repeated run.
fn looks_misspelled(token: &str) -> bool {
    if STOPWORDS.contains(token) || COMMON_WORDS.contains(token) {
        return false;
    }
    token.chars().count() > LONG_WORD_THRESHOLD || has_repeated_run(token)
}

/// Whether any character repeats [`REPEAT_RUN_LENGTH`] or more times
/// consecutively.
fn has_repeated_run(token: &str) -> bool {
    let mut run = 0;
    let mut prev: Option<char> = None;
    for ch in token.chars() {
        if prev == Some(ch) {
            run += 1;
            if run >= REPEAT_RUN_LENGTH {
                return true;
            }
        } else {
            run = 1;
            prev = Some(ch);
        }
    }
    false
}

//! Immutable lexicons and thresholds for the heuristic feature extractor.
//!
//! Built once on first use and never mutated; workers share them read-only.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Tokens longer than this (and not in a lexicon) count as pseudo-misspellings.
pub const LONG_WORD_THRESHOLD: usize = 12;

/// A character repeated this many times consecutively marks a token as a
/// pseudo-misspelling.
pub const REPEAT_RUN_LENGTH: usize = 4;

/// English stopwords, matched against case-folded tokens.
pub static STOPWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORD_LIST.iter().copied().collect());

/// Tokens that signal urgency or pressure, matched against case-folded tokens.
pub static URGENCY_KEYWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| URGENCY_LIST.iter().copied().collect());

/// Common words exempt from the pseudo-misspelling heuristic even when they
/// exceed the length threshold.
pub static COMMON_WORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| COMMON_WORD_LIST.iter().copied().collect());

const STOPWORD_LIST: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "because",
    "been", "before", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had",
    "has", "have", "he", "her", "here", "him", "his", "how", "i", "if", "in", "into", "is", "it",
    "its", "just", "me", "more", "most", "my", "no", "not", "of", "on", "one", "only", "or",
    "other", "our", "out", "over", "she", "so", "some", "such", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "to", "up", "us", "was", "we", "were",
    "what", "when", "where", "which", "who", "will", "with", "would", "you", "your",
];

const URGENCY_LIST: &[&str] = &[
    "act", "action", "alert", "attention", "blocked", "click", "confirm", "deadline", "disabled",
    "expire", "expired", "expires", "final", "immediately", "important", "locked", "notice",
    "now", "password", "penalty", "required", "restricted", "risk", "suspend", "suspended",
    "suspension", "unauthorized", "urgent", "urgently", "verify", "warning",
];

const COMMON_WORD_LIST: &[&str] = &[
    "administration", "administrator", "approximately", "attachment", "automatically",
    "communication", "confidential", "confirmation", "congratulations", "conversation",
    "corporation", "department", "documentation", "environment", "headquarters", "immediately",
    "information", "infrastructure", "international", "notification", "opportunity",
    "organization", "professional", "recommendation", "registration", "representative",
    "responsibility", "subscription", "successfully", "transaction", "understanding",
    "unfortunately", "unsubscribe", "verification",
];

//! Tokenization and stopword lists shared by the keyword, phrase and linking scorers.
//!
//! The lists are hand-tuned English data; keep them verbatim.

use std::collections::HashSet;
use std::sync::LazyLock;

pub const KEYWORD_STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "shall", "can", "need",
    "dare", "ought", "used", "it", "its", "this", "that", "these", "those", "i", "you", "he",
    "she", "we", "they", "what", "which", "who", "whom", "when", "where", "why", "how", "all",
    "each", "every", "both", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "just", "also", "now", "here", "there",
    "then", "once", "if", "about", "into", "through", "during", "before", "after", "above",
    "below", "between", "under", "again", "further", "while", "your", "our", "their", "my",
    "his", "her", "out", "up", "any", "get", "got", "one", "two", "first", "new", "like",
    "make", "made", "know", "see", "look", "think", "come", "want", "use", "find", "give",
    "tell", "work", "because", "way", "even", "back", "well", "being", "over", "years", "many",
    "still", "take", "us", "amp", "nbsp", "http", "https", "www", "com",
];

/// Words that may not open or close a phrase. Interior occurrences are fine.
pub const PHRASE_EDGE_STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "be", "it", "this", "that",
];

pub const LINKING_STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "shall", "can", "this",
    "that", "these", "those", "it", "its", "they", "them", "their", "we", "our", "you", "your",
    "he", "she", "him", "her", "his", "i", "me", "my", "not", "no", "yes", "all", "any",
    "some", "more", "most", "other", "such", "only", "than", "too", "very", "just", "also",
    "now", "here", "there", "when", "where", "why", "how", "what", "which", "who", "whom",
    "whose", "if", "then", "else", "so", "because", "although", "while", "since", "until",
    "unless",
];

static KEYWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| KEYWORD_STOPWORDS.iter().copied().collect());
static PHRASE_EDGE_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| PHRASE_EDGE_STOPWORDS.iter().copied().collect());
static LINKING_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| LINKING_STOPWORDS.iter().copied().collect());

pub fn is_keyword_stopword(w: &str) -> bool {
    KEYWORD_SET.contains(w)
}

pub fn is_phrase_edge_stopword(w: &str) -> bool {
    PHRASE_EDGE_SET.contains(w)
}

pub fn is_linking_stopword(w: &str) -> bool {
    LINKING_SET.contains(w)
}

/// Lowercase ASCII letter tokens of at least `min_len` characters.
///
/// Word boundaries follow ASCII word characters (`[a-z0-9_]`): a run such as
/// `abc123` yields nothing, and non-ASCII characters act as separators.
pub fn ascii_words(text: &str, min_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut letters_only = true;
    let flush = |cur: &mut String, letters_only: &mut bool, out: &mut Vec<String>| {
        if *letters_only && cur.len() >= min_len {
            out.push(std::mem::take(cur));
        } else {
            cur.clear();
        }
        *letters_only = true;
    };
    for ch in text.chars() {
        let lc = ch.to_ascii_lowercase();
        if lc.is_ascii_alphanumeric() || lc == '_' {
            if !lc.is_ascii_lowercase() {
                letters_only = false;
            }
            cur.push(lc);
        } else if !cur.is_empty() {
            flush(&mut cur, &mut letters_only, &mut out);
        }
    }
    if !cur.is_empty() {
        flush(&mut cur, &mut letters_only, &mut out);
    }
    out
}

/// Unicode-aware split used by the internal-linking scorer: lowercase, every
/// non letter/digit character becomes a separator.
pub fn unicode_words(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            cur.extend(ch.to_lowercase());
        } else if !cur.is_empty() {
            out.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

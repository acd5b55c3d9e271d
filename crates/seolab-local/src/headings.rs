//! Heading validity filter, cleaning, and cross-document aggregation.

use regex::Regex;
use seolab_core::{FetchedDocument, HeadingAggregate};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

const MAX_AGGREGATED_HEADINGS: usize = 30;

static JUNK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(leave\s+a?\s*)?(reply|comment|review)",
        r"^(recent|latest|related|popular)\s+(posts?|comments?|articles?)",
        r"^(categories|tags|archives|sidebar|widget)",
        r"^(about|contact)\s*(us|me|the\s+author)?$",
        r"^(search|subscribe|newsletter|sign\s*up|log\s*in|register)",
        r"^(share|follow|connect)\s*(this|us|on|with)?",
        r"^(cancel|submit|send|post|save|delete|edit|update)",
        r"^(privacy|terms|cookie|disclaimer|copyright)",
        r"^(navigation|menu|footer|header|sidebar)",
        r"^(advertisement|sponsored|promo)",
        r"^(table\s+of\s+contents?|toc|contents?)$",
        r"^(you\s+may\s+also\s+like|see\s+also|more\s+from)",
        r"^(next|previous|older|newer)\s+(post|article|page)?",
        r"^(page|post)\s*\d+",
        r"(cancel\s+reply|leave\s+a\s+comment)",
    ]
    .iter()
    .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
    .collect()
});

/// `Step 3:`, `Step 3`, `3.`, `#3 ` and similar numbering prefixes.
static STEP_PREFIX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:step\s*#?\d+|#\d+|\d+[.:)\-])[.:)\-]?\s*").ok()
});

static TRAILING_BRACKET: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\s*[(\[].*[)\]]$").ok());

static ONLY_DIGITS_PUNCT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[\d\s.\-:#]+$").ok());

static GENERIC_MARKERS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(reply|comment|cancel|submit)").ok());

const GENERIC_HEADINGS: &[&str] = &[
    "contact", "contact us", "about", "about us", "categories", "tags", "related", "comments",
    "leave a reply", "leave a comment", "cancel reply", "share", "follow us", "subscribe",
    "newsletter", "sidebar", "footer", "header", "menu", "search", "login", "register", "cart",
    "checkout", "privacy", "terms", "sitemap", "archives", "recent posts", "popular posts",
    "recent comments", "related posts", "you may also like", "see also", "table of contents",
    "contents", "navigation", "advertisement", "sponsored", "next post", "previous post",
    "older posts", "newer posts",
];

fn strip_step_prefix(s: &str) -> &str {
    match STEP_PREFIX.as_ref().and_then(|re| re.find(s)) {
        Some(m) => &s[m.end()..],
        None => s,
    }
}

/// True when `heading` looks like content rather than site chrome.
pub fn is_valid_heading(heading: &str) -> bool {
    let heading = heading.trim();
    if heading.len() < 5 || heading.len() > 100 {
        return false;
    }
    let lower = heading.to_lowercase();
    if JUNK_PATTERNS.iter().any(|re| re.is_match(&lower)) {
        return false;
    }
    let rest = strip_step_prefix(heading);
    if rest.len() != heading.len() && rest.trim().len() < 5 {
        return false;
    }
    if ONLY_DIGITS_PUNCT
        .as_ref()
        .is_some_and(|re| re.is_match(heading))
    {
        return false;
    }
    if !heading.contains(' ') && heading.len() < 15 {
        return false;
    }
    true
}

/// Strip step numbering and a trailing parenthetical/bracketed suffix.
pub fn clean_heading(heading: &str) -> String {
    let s = strip_step_prefix(heading.trim());
    let s = match TRAILING_BRACKET.as_ref() {
        Some(re) => re.replace(s, "").into_owned(),
        None => s.to_string(),
    };
    s.trim().to_string()
}

fn is_generic_heading(lower: &str) -> bool {
    GENERIC_HEADINGS.contains(&lower)
        || GENERIC_MARKERS
            .as_ref()
            .is_some_and(|re| re.is_match(lower))
}

/// Rank headings by the number of documents that use them.
///
/// Each document contributes at most once per heading (case-insensitive), so
/// a page repeating a heading cannot inflate its count. Ties keep first-seen order.
pub fn aggregate_headings(docs: &[FetchedDocument]) -> Vec<HeadingAggregate> {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, HeadingAggregate> = HashMap::new();

    for doc in docs {
        let mut seen: HashSet<String> = HashSet::new();
        for h in &doc.headings {
            let cleaned = clean_heading(&h.text);
            let key = cleaned.to_lowercase();
            if key.len() < 5 || seen.contains(&key) || is_generic_heading(&key) {
                continue;
            }
            seen.insert(key.clone());
            by_key
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    HeadingAggregate {
                        text: cleaned,
                        level: h.level,
                        count: 0,
                    }
                })
                .count += 1;
        }
    }

    let mut out: Vec<HeadingAggregate> = order
        .iter()
        .filter_map(|k| by_key.remove(k))
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out.truncate(MAX_AGGREGATED_HEADINGS);
    out
}

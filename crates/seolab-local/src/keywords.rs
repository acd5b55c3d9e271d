//! Coverage-banded keyword scoring across a competitor document set.

use crate::textprep::{ascii_words, is_keyword_stopword};
use seolab_core::{FetchedDocument, KeywordScore};
use std::collections::{HashMap, HashSet};

pub const MAX_KEYWORDS: usize = 100;
const MIN_KEYWORD_LEN: usize = 3;

/// Term and document frequencies, iterated in first-seen order.
#[derive(Debug, Default)]
pub(crate) struct TermCounter {
    order: Vec<String>,
    tf: HashMap<String, usize>,
    df: HashMap<String, usize>,
}

impl TermCounter {
    pub(crate) fn add_document<I>(&mut self, terms: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        for t in terms {
            match self.tf.get_mut(&t) {
                Some(n) => *n += 1,
                None => {
                    self.order.push(t.clone());
                    self.tf.insert(t.clone(), 1);
                }
            }
            seen.insert(t);
        }
        for t in seen {
            *self.df.entry(t).or_default() += 1;
        }
    }

    /// `(term, frequency, doc_frequency)` in first-seen order.
    pub(crate) fn into_counts(self) -> impl Iterator<Item = (String, usize, usize)> {
        let TermCounter { order, tf, df } = self;
        order.into_iter().map(move |t| {
            let f = tf.get(&t).copied().unwrap_or(0);
            let d = df.get(&t).copied().unwrap_or(1);
            (t, f, d)
        })
    }
}

/// Score every non-stopword token of length >= 3 and return the top 100.
///
/// Sorting is stable on the rounded score, so equal scores keep first-seen order.
pub fn extract_keywords(docs: &[FetchedDocument]) -> Vec<KeywordScore> {
    if docs.is_empty() {
        return Vec::new();
    }
    let mut counter = TermCounter::default();
    for doc in docs {
        counter.add_document(
            ascii_words(&doc.text, MIN_KEYWORD_LEN)
                .into_iter()
                .filter(|w| !is_keyword_stopword(w)),
        );
    }

    let total = docs.len();
    let mut out: Vec<KeywordScore> = counter
        .into_counts()
        .filter_map(|(w, f, d)| KeywordScore::new(w, f, d, total).ok())
        .collect();
    out.sort_by(|a, b| b.score.total_cmp(&a.score));
    out.truncate(MAX_KEYWORDS);
    out
}

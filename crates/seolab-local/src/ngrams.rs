//! 2- and 3-word phrase extraction with document-coverage weighting.

use crate::keywords::TermCounter;
use crate::textprep::{ascii_words, is_phrase_edge_stopword};
use seolab_core::{FetchedDocument, PhraseScore};

pub const MAX_PHRASES: usize = 50;
const MIN_TOKEN_LEN: usize = 2;
const MIN_PHRASE_LEN: usize = 5;

fn phrases_of(text: &str, n: usize) -> Vec<String> {
    let words = ascii_words(text, MIN_TOKEN_LEN);
    if n == 0 || words.len() < n {
        return Vec::new();
    }
    words
        .windows(n)
        .filter(|w| !is_phrase_edge_stopword(&w[0]) && !is_phrase_edge_stopword(&w[n - 1]))
        .map(|w| w.join(" "))
        .filter(|p| p.len() >= MIN_PHRASE_LEN)
        .collect()
}

/// Top phrases of `n` consecutive tokens. Only phrases seen at least three
/// times and in at least 20% of documents are kept.
pub fn extract_ngrams(docs: &[FetchedDocument], n: usize) -> Vec<PhraseScore> {
    if docs.is_empty() {
        return Vec::new();
    }
    let mut counter = TermCounter::default();
    for doc in docs {
        counter.add_document(phrases_of(&doc.text, n));
    }

    let total = docs.len();
    let mut out: Vec<PhraseScore> = counter
        .into_counts()
        .filter_map(|(p, f, d)| PhraseScore::new(p, f, d, total))
        .collect();
    out.sort_by(|a, b| b.score.total_cmp(&a.score));
    out.truncate(MAX_PHRASES);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(text: &str) -> FetchedDocument {
        FetchedDocument {
            url: "https://example.com/".to_string(),
            title: String::new(),
            headings: Vec::new(),
            text: text.to_string(),
            word_count: 0,
            position: 1,
        }
    }

    #[test]
    fn interior_stopwords_are_allowed_edges_are_not() {
        let p = phrases_of("a guide for beginners to the dns", 3);
        assert_eq!(p, vec!["guide for beginners"]);
    }

    #[test]
    fn shortest_two_token_phrase_is_kept() {
        assert_eq!(phrases_of("ab cd", 2), vec!["ab cd"]);
        assert!(phrases_of("ab c", 2).is_empty());
    }

    #[test]
    fn retains_frequent_and_covered_phrases() {
        let docs = vec![
            doc("dns records dns records"),
            doc("dns records and more"),
            doc("nothing relevant here"),
        ];
        let out = extract_ngrams(&docs, 2);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].phrase, "dns records");
        assert_eq!(out[0].frequency, 3);
        assert_eq!(out[0].doc_frequency, 2);
        assert_eq!(out[0].coverage, 66.7);
        assert_eq!(out[0].score, 5.0);
    }

    #[test]
    fn rare_across_documents_is_dropped() {
        let mut docs = vec![doc("mesh wifi mesh wifi mesh wifi")];
        for _ in 0..9 {
            docs.push(doc("unrelated words only"));
        }
        // frequency 3 but coverage 10%
        assert!(extract_ngrams(&docs, 2).iter().all(|p| p.phrase != "mesh wifi"));
    }

    proptest! {
        #[test]
        fn every_retained_phrase_meets_thresholds(
            texts in proptest::collection::vec("(dns|zone|record|router|the|for|a|mesh)( (dns|zone|record|router|the|for|a|mesh)){0,30}", 1..6),
            n in 2usize..4,
        ) {
            let docs: Vec<FetchedDocument> = texts.iter().map(|t| doc(t)).collect();
            for p in extract_ngrams(&docs, n) {
                prop_assert!(p.frequency >= 3);
                prop_assert!(p.coverage >= 20.0);
                prop_assert_eq!(p.phrase.split(' ').count(), n);
            }
        }
    }
}

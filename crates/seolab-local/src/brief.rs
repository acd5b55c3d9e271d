//! Word-count targets, the prioritized content brief, and its prompt rendering.

use seolab_core::{
    BriefStructure, ContentBrief, FetchedDocument, HeadingAggregate, KeywordScore, KeywordTiers,
    PhraseScore, WordCountAnalysis, WordCountTargets,
};
use std::fmt::Write as _;

const MUST_USE_RANK: usize = 10;
const MUST_USE_COVERAGE: f64 = 70.0;
const SHOULD_USE_RANK: usize = 30;
const SHOULD_USE_COVERAGE: f64 = 50.0;
const MAX_NICE_TO_HAVE: usize = 20;
const MAX_BRIEF_PHRASES: usize = 15;
const MAX_BRIEF_HEADINGS: usize = 10;
const MIN_H2_COUNT: usize = 5;
const WORDS_PER_PARAGRAPH: usize = 150;
const WORDS_PER_IMAGE: usize = 500;

/// Word-count statistics over documents with a non-zero count.
pub fn word_count_analysis(docs: &[FetchedDocument]) -> WordCountAnalysis {
    let mut counts: Vec<usize> = docs
        .iter()
        .map(|d| d.word_count)
        .filter(|&c| c > 0)
        .collect();
    if counts.is_empty() {
        return WordCountAnalysis::default();
    }
    counts.sort_unstable();

    let n = counts.len();
    let sum: usize = counts.iter().sum();
    let mean = sum as f64 / n as f64;
    let top = &counts[n.saturating_sub(3)..];
    let top3_avg = top.iter().sum::<usize>() as f64 / 3.0;

    WordCountAnalysis {
        min: counts[0],
        max: counts[n - 1],
        avg: mean.round() as usize,
        median: counts[n / 2],
        recommended: (mean * 1.1).round() as usize,
        top3_avg: top3_avg.round() as usize,
    }
}

/// Combine the scorer outputs into a tiered brief. Keywords are expected in
/// rank order; each lands in exactly one tier.
pub fn build_brief(
    keyword: &str,
    keywords: &[KeywordScore],
    phrases: &[PhraseScore],
    headings: &[HeadingAggregate],
    wc: &WordCountAnalysis,
) -> ContentBrief {
    let mut tiers = KeywordTiers::default();
    for (rank, kw) in keywords.iter().enumerate() {
        if rank < MUST_USE_RANK || kw.coverage >= MUST_USE_COVERAGE {
            tiers.must_use.push(kw.word.clone());
        } else if rank < SHOULD_USE_RANK || kw.coverage >= SHOULD_USE_COVERAGE {
            tiers.should_use.push(kw.word.clone());
        } else if tiers.nice_to_have.len() < MAX_NICE_TO_HAVE {
            tiers.nice_to_have.push(kw.word.clone());
        }
    }

    let recommended_headings: Vec<String> = headings
        .iter()
        .take(MAX_BRIEF_HEADINGS)
        .map(|h| h.text.clone())
        .collect();

    ContentBrief {
        keyword: keyword.to_string(),
        word_count: WordCountTargets {
            minimum: wc.avg,
            recommended: wc.recommended,
            optimal: wc.top3_avg,
        },
        keywords: tiers,
        phrases: phrases
            .iter()
            .take(MAX_BRIEF_PHRASES)
            .map(|p| p.phrase.clone())
            .collect(),
        structure: BriefStructure {
            h2_count: recommended_headings.len().max(MIN_H2_COUNT),
            paragraphs: wc.recommended.div_ceil(WORDS_PER_PARAGRAPH),
            images: wc.recommended.div_ceil(WORDS_PER_IMAGE),
        },
        recommended_headings,
    }
}

/// Render a brief as an instruction block for a content-generation model.
pub fn brief_prompt(brief: &ContentBrief) -> String {
    let mut p = String::new();
    let _ = writeln!(
        p,
        "Write a comprehensive article about \"{}\".\n",
        brief.keyword
    );
    let _ = writeln!(
        p,
        "TARGET LENGTH: {} words (minimum {})\n",
        brief.word_count.recommended, brief.word_count.minimum
    );
    let _ = writeln!(p, "MUST USE these keywords (include each at least once):");
    let _ = writeln!(p, "{}\n", brief.keywords.must_use.join(", "));
    let _ = writeln!(p, "SHOULD USE these keywords:");
    let _ = writeln!(p, "{}\n", brief.keywords.should_use.join(", "));
    let _ = writeln!(p, "USE these phrases naturally:");
    let _ = writeln!(p, "{}\n", brief.phrases.join(", "));
    let _ = writeln!(p, "RECOMMENDED HEADINGS (H2):");
    for h in &brief.recommended_headings {
        let _ = writeln!(p, "- {h}");
    }
    let _ = writeln!(p, "\nSTRUCTURE:");
    let _ = writeln!(
        p,
        "- Include {} main sections (H2)",
        brief.structure.h2_count
    );
    let _ = writeln!(
        p,
        "- Write approximately {} paragraphs",
        brief.structure.paragraphs
    );
    let _ = writeln!(
        p,
        "- Suggest {} image placements",
        brief.structure.images
    );
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn doc_with_words(n: usize) -> FetchedDocument {
        FetchedDocument {
            url: "https://example.com/".to_string(),
            title: String::new(),
            headings: Vec::new(),
            text: String::new(),
            word_count: n,
            position: 1,
        }
    }

    fn kw(word: &str, coverage: f64) -> KeywordScore {
        KeywordScore {
            word: word.to_string(),
            frequency: 1,
            doc_frequency: 1,
            coverage,
            score: 1.0,
        }
    }

    #[test]
    fn recommended_is_ten_percent_over_mean() {
        let docs: Vec<_> = [800, 1000, 1200].into_iter().map(doc_with_words).collect();
        let wc = word_count_analysis(&docs);
        assert_eq!(wc.avg, 1000);
        assert_eq!(wc.recommended, 1100);
        assert_eq!(wc.median, 1000);
        assert_eq!(wc.min, 800);
        assert_eq!(wc.max, 1200);
        assert_eq!(wc.top3_avg, 1000);
    }

    #[test]
    fn zero_counts_are_ignored_and_empty_gets_defaults() {
        let docs: Vec<_> = [0, 0].into_iter().map(doc_with_words).collect();
        assert_eq!(word_count_analysis(&docs), WordCountAnalysis::default());

        let docs: Vec<_> = [0, 900].into_iter().map(doc_with_words).collect();
        let wc = word_count_analysis(&docs);
        assert_eq!(wc.min, 900);
        assert_eq!(wc.top3_avg, 300);
    }

    #[test]
    fn top3_uses_the_largest_three() {
        let docs: Vec<_> = [100, 2000, 300, 1000, 3000]
            .into_iter()
            .map(doc_with_words)
            .collect();
        let wc = word_count_analysis(&docs);
        assert_eq!(wc.top3_avg, 2000);
        assert_eq!(wc.median, 1000);
    }

    #[test]
    fn tiers_partition_forty_keywords() {
        let kws: Vec<KeywordScore> = (0..40)
            .map(|i| {
                let cov = if i == 35 { 75.0 } else if i == 33 { 55.0 } else { 10.0 };
                kw(&format!("word{i}"), cov)
            })
            .collect();
        let wc = WordCountAnalysis::default();
        let b = build_brief("dns", &kws, &[], &[], &wc);

        for i in 0..10 {
            assert!(b.keywords.must_use.contains(&format!("word{i}")));
        }
        assert!(b.keywords.must_use.contains(&"word35".to_string()));
        assert!(b.keywords.should_use.contains(&"word33".to_string()));
        assert_eq!(b.keywords.must_use.len(), 11);
        assert_eq!(b.keywords.should_use.len(), 21);
        assert_eq!(b.keywords.nice_to_have.len(), 8);

        let must: HashSet<_> = b.keywords.must_use.iter().collect();
        assert!(b.keywords.should_use.iter().all(|w| !must.contains(w)));
        assert!(b.keywords.nice_to_have.iter().all(|w| !must.contains(w)));
    }

    #[test]
    fn nice_to_have_is_capped() {
        let kws: Vec<KeywordScore> = (0..80).map(|i| kw(&format!("w{i}"), 1.0)).collect();
        let b = build_brief("dns", &kws, &[], &[], &WordCountAnalysis::default());
        assert_eq!(b.keywords.nice_to_have.len(), 20);
    }

    #[test]
    fn structure_targets_follow_recommended_length() {
        let wc = WordCountAnalysis {
            recommended: 1100,
            ..WordCountAnalysis::default()
        };
        let b = build_brief("dns", &[], &[], &[], &wc);
        assert_eq!(b.structure.h2_count, 5);
        assert_eq!(b.structure.paragraphs, 8);
        assert_eq!(b.structure.images, 3);
        assert_eq!(b.word_count.minimum, 1500);
        assert_eq!(b.word_count.optimal, 2000);
    }

    #[test]
    fn prompt_lists_every_section() {
        let b = ContentBrief {
            keyword: "dns records".to_string(),
            word_count: WordCountTargets {
                minimum: 1000,
                recommended: 1100,
                optimal: 1300,
            },
            keywords: KeywordTiers {
                must_use: vec!["dns".to_string(), "zone".to_string()],
                should_use: vec!["ttl".to_string()],
                nice_to_have: vec![],
            },
            phrases: vec!["dns records".to_string()],
            recommended_headings: vec!["What Is a DNS Record".to_string()],
            structure: BriefStructure {
                h2_count: 5,
                paragraphs: 8,
                images: 3,
            },
        };
        let p = brief_prompt(&b);
        assert!(p.starts_with("Write a comprehensive article about \"dns records\".\n\n"));
        assert!(p.contains("TARGET LENGTH: 1100 words (minimum 1000)"));
        assert!(p.contains("(include each at least once):\ndns, zone\n"));
        assert!(p.contains("SHOULD USE these keywords:\nttl\n"));
        assert!(p.contains("RECOMMENDED HEADINGS (H2):\n- What Is a DNS Record\n"));
        assert!(p.ends_with("- Suggest 3 image placements\n"));
    }
}

//! Internal-linking analysis over a site's pages and articles.
//!
//! Everything here is a pure function of the [`ContentItem`]s the caller
//! supplies; only [`LinkingStore`] touches disk.

use crate::links::{site_links, SiteLink};
use crate::store::{now_timestamp, read_json, write_json_atomic};
use crate::textprep::{is_linking_stopword, unicode_words};
use regex::Regex;
use seolab_core::{round_to, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

pub const MAX_KEYWORDS: usize = 20;
pub const OPPORTUNITY_THRESHOLD: u32 = 30;
pub const SUGGESTION_THRESHOLD: u32 = 25;
const OPPORTUNITIES_PER_ITEM: usize = 3;
const MAX_OPPORTUNITIES: usize = 50;
const MAX_CTA_CHARS: usize = 60;

static ARTICLE_HREF: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^/(?:blog|article)/([a-z0-9_-]+)/?$").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Page,
    Article,
}

impl ContentKind {
    fn label(self) -> &'static str {
        match self {
            ContentKind::Page => "Page",
            ContentKind::Article => "Article",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub title: String,
    pub slug: String,
    pub content: String,
    #[serde(default)]
    pub focus_keyword: Option<String>,
}

impl ContentItem {
    pub fn page(id: u64, title: &str, slug: &str, content: &str) -> Self {
        Self {
            id,
            kind: ContentKind::Page,
            title: title.to_string(),
            slug: slug.to_string(),
            content: content.to_string(),
            focus_keyword: None,
        }
    }

    pub fn article(id: u64, title: &str, slug: &str, content: &str) -> Self {
        Self {
            kind: ContentKind::Article,
            ..Self::page(id, title, slug, content)
        }
    }

    /// `/slug` for pages, `/blog/slug` for articles.
    pub fn url(&self) -> String {
        match self.kind {
            ContentKind::Page => format!("/{}", self.slug.trim_start_matches('/')),
            ContentKind::Article => format!("/blog/{}", self.slug),
        }
    }

    fn key(&self) -> (ContentKind, u64) {
        (self.kind, self.id)
    }

    fn internal_links(&self) -> Vec<SiteLink> {
        extract_links(&self.content, "")
            .into_iter()
            .filter(|l| l.is_internal)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedContent {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub slug: String,
}

/// Classify an internal href as an article (`/blog/x`, `/article/x`) or a
/// single-segment page; anything deeper is unknown.
pub fn detect_content_type(href: &str) -> Option<DetectedContent> {
    if let Some(caps) = ARTICLE_HREF.as_ref().and_then(|re| re.captures(href)) {
        return Some(DetectedContent {
            kind: ContentKind::Article,
            slug: caps[1].to_string(),
        });
    }
    let slug = href.trim_matches('/');
    (!slug.is_empty() && !slug.contains('/')).then(|| DetectedContent {
        kind: ContentKind::Page,
        slug: slug.to_string(),
    })
}

/// Navigable links in a content fragment, tagged internal relative to `base_url`.
pub fn extract_links(html: &str, base_url: &str) -> Vec<SiteLink> {
    site_links(html, base_url)
}

fn plain_text(html: &str) -> String {
    html_scraper::Html::parse_fragment(html)
        .root_element()
        .text()
        .collect()
}

fn is_topic_word(w: &str) -> bool {
    w.chars().count() >= 3 && !is_linking_stopword(w)
}

/// Top `max` topics of a page: content words, title words boosted by 5, and
/// bigrams seen at least twice weighted by twice their count.
///
/// Ties keep first-seen order.
pub fn extract_keywords(title: &str, content: &str, max: usize) -> Vec<String> {
    let words = unicode_words(&plain_text(content));
    let mut order: Vec<String> = Vec::new();
    let mut freq: HashMap<String, usize> = HashMap::new();
    let mut bump = |term: &str, by: usize, order: &mut Vec<String>| {
        let n = freq.entry(term.to_string()).or_insert_with(|| {
            order.push(term.to_string());
            0
        });
        *n += by;
    };

    for w in words.iter().filter(|w| is_topic_word(w)) {
        bump(w, 1, &mut order);
    }
    for w in unicode_words(title).iter().filter(|w| is_topic_word(w)) {
        bump(w, 5, &mut order);
    }

    let mut bigram_order: Vec<String> = Vec::new();
    let mut bigrams: HashMap<String, usize> = HashMap::new();
    for pair in words.windows(2) {
        if is_topic_word(&pair[0]) && is_topic_word(&pair[1]) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            let n = bigrams.entry(bigram.clone()).or_insert_with(|| {
                bigram_order.push(bigram);
                0
            });
            *n += 1;
        }
    }
    for b in &bigram_order {
        let count = bigrams.get(b).copied().unwrap_or(0);
        if count >= 2 {
            bump(b, count * 2, &mut order);
        }
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|t| {
            let n = freq.get(&t).copied().unwrap_or(0);
            (t, n)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().take(max).map(|(t, _)| t).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub keyword: String,
    pub source_rank: usize,
    pub target_rank: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relevance {
    /// 0..=100.
    pub score: u32,
    pub matching_keywords: Vec<KeywordMatch>,
    pub title_matches: Vec<String>,
}

/// How strongly `source` should link to `target`.
pub fn relevance(source: &ContentItem, target: &ContentItem) -> Relevance {
    if source.key() == target.key() {
        return Relevance::default();
    }
    let src_kw = extract_keywords(&source.title, &source.content, MAX_KEYWORDS);
    let tgt_kw = extract_keywords(&target.title, &target.content, MAX_KEYWORDS);

    let mut score = 0usize;
    let mut matching = Vec::new();
    for (sp, kw) in src_kw.iter().enumerate() {
        let Some(tp) = tgt_kw.iter().position(|t| t == kw) else {
            continue;
        };
        score += (20 - sp.min(10)) + (20 - tp.min(10));
        matching.push(KeywordMatch {
            keyword: kw.clone(),
            source_rank: sp + 1,
            target_rank: tp + 1,
        });
    }

    let tgt_title = unicode_words(&target.title);
    let title_matches: Vec<String> = unicode_words(&source.title)
        .into_iter()
        .filter(|w| tgt_title.contains(w))
        .collect();
    score += title_matches.len() * 15;

    Relevance {
        score: (score / 2).min(100) as u32,
        matching_keywords: matching,
        title_matches,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    Title,
    Keyword,
    Slug,
    Cta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorSuggestion {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: AnchorKind,
    pub priority: u8,
}

fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Anchor text candidates for a link to `target`, best first.
pub fn suggest_anchors(target: &ContentItem, matches: &[KeywordMatch]) -> Vec<AnchorSuggestion> {
    let mut out = vec![AnchorSuggestion {
        text: target.title.clone(),
        kind: AnchorKind::Title,
        priority: 1,
    }];
    for m in matches.iter().take(3) {
        if m.keyword.chars().count() >= 4 {
            out.push(AnchorSuggestion {
                text: ucfirst(&m.keyword),
                kind: AnchorKind::Keyword,
                priority: 2,
            });
        }
    }
    let slug_words: Vec<&str> = target.slug.split('-').collect();
    if (2..=5).contains(&slug_words.len()) {
        out.push(AnchorSuggestion {
            text: ucfirst(&slug_words.join(" ")),
            kind: AnchorKind::Slug,
            priority: 3,
        });
    }
    let lower = target.title.to_lowercase();
    for cta in [
        format!("Learn more about {lower}"),
        format!("Read our guide on {lower}"),
        format!("See also: {}", target.title),
    ] {
        if cta.chars().count() <= MAX_CTA_CHARS {
            out.push(AnchorSuggestion {
                text: cta,
                kind: AnchorKind::Cta,
                priority: 4,
            });
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSummary {
    pub id: u64,
    pub title: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub url: String,
    pub incoming_links: usize,
    pub outgoing_links: usize,
    pub top_keywords: Vec<String>,
    pub link_opportunities: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanPage {
    pub id: u64,
    pub title: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub url: String,
    pub outgoing_links: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOpportunity {
    pub from_id: u64,
    pub from_title: String,
    pub from_type: ContentKind,
    pub from_url: String,
    pub to_id: u64,
    pub to_title: String,
    pub to_slug: String,
    pub to_type: ContentKind,
    pub to_url: String,
    pub relevance_score: u32,
    pub matching_keywords: Vec<KeywordMatch>,
    pub suggested_anchors: Vec<AnchorSuggestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkStatistics {
    pub total_internal_links: usize,
    pub total_pages: usize,
    pub total_articles: usize,
    pub pages_with_no_outgoing: usize,
    pub pages_with_no_incoming: usize,
    pub articles_with_no_outgoing: usize,
    pub articles_with_no_incoming: usize,
    pub avg_outgoing_links: f64,
    pub avg_incoming_links: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAnalysis {
    pub analyzed_at: String,
    pub total_pages: usize,
    pub total_articles: usize,
    pub total_content: usize,
    pub pages: Vec<ContentSummary>,
    pub orphan_pages: Vec<OrphanPage>,
    pub opportunities: Vec<LinkOpportunity>,
    pub statistics: LinkStatistics,
}

fn links_to(link: &SiteLink, target: &ContentItem) -> bool {
    match target.kind {
        ContentKind::Page => {
            target.slug == link.href.trim_matches('/') || format!("/{}", target.slug) == link.href
        }
        ContentKind::Article => detect_content_type(&link.href)
            .is_some_and(|d| d.kind == ContentKind::Article && d.slug == target.slug),
    }
}

/// Site-wide link graph: incoming/outgoing counts, orphans and the best
/// linking opportunities.
pub fn analyze_all(items: &[ContentItem]) -> Result<LinkAnalysis> {
    if items.is_empty() {
        return Err(Error::Validation("No content found for analysis.".to_string()));
    }
    let total_pages = items.iter().filter(|i| i.kind == ContentKind::Page).count();
    let total_articles = items.len() - total_pages;
    let mut stats = LinkStatistics {
        total_pages,
        total_articles,
        ..LinkStatistics::default()
    };

    let outgoing: Vec<Vec<SiteLink>> = items.iter().map(ContentItem::internal_links).collect();
    let mut incoming = vec![0usize; items.len()];
    let mut keywords: Vec<Vec<String>> = Vec::with_capacity(items.len());

    for (item, links) in items.iter().zip(&outgoing) {
        let mut kws = extract_keywords(&item.title, &item.content, MAX_KEYWORDS);
        if let Some(fk) = item.focus_keyword.as_deref().filter(|k| !k.is_empty()) {
            kws.retain(|k| k != fk);
            kws.insert(0, fk.to_string());
        }
        keywords.push(kws);

        stats.total_internal_links += links.len();
        if links.is_empty() {
            match item.kind {
                ContentKind::Article => stats.articles_with_no_outgoing += 1,
                ContentKind::Page => stats.pages_with_no_outgoing += 1,
            }
        }
        for link in links {
            if let Some(t) = items.iter().position(|target| links_to(link, target)) {
                incoming[t] += 1;
            }
        }
    }

    let mut pages = Vec::with_capacity(items.len());
    let mut orphans = Vec::new();
    let mut opportunities = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let outgoing_count = outgoing[i].len();
        if incoming[i] == 0 {
            orphans.push(OrphanPage {
                id: item.id,
                title: item.title.clone(),
                slug: item.slug.clone(),
                kind: item.kind,
                url: item.url(),
                outgoing_links: outgoing_count,
            });
            match item.kind {
                ContentKind::Article => stats.articles_with_no_incoming += 1,
                ContentKind::Page => stats.pages_with_no_incoming += 1,
            }
        }

        let mut found = Vec::new();
        for (j, other) in items.iter().enumerate() {
            if i == j {
                continue;
            }
            let rel = relevance(other, item);
            if rel.score < OPPORTUNITY_THRESHOLD {
                continue;
            }
            if outgoing[j].iter().any(|l| l.href.contains(&item.slug)) {
                continue;
            }
            let mut anchors = suggest_anchors(item, &rel.matching_keywords);
            anchors.truncate(3);
            let mut matching = rel.matching_keywords;
            matching.truncate(5);
            found.push(LinkOpportunity {
                from_id: other.id,
                from_title: other.title.clone(),
                from_type: other.kind,
                from_url: other.url(),
                to_id: item.id,
                to_title: item.title.clone(),
                to_slug: item.slug.clone(),
                to_type: item.kind,
                to_url: item.url(),
                relevance_score: rel.score,
                matching_keywords: matching,
                suggested_anchors: anchors,
            });
        }
        found.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
        let found_count = found.len();
        opportunities.extend(found.into_iter().take(OPPORTUNITIES_PER_ITEM));

        pages.push(ContentSummary {
            id: item.id,
            title: item.title.clone(),
            slug: item.slug.clone(),
            kind: item.kind,
            url: item.url(),
            incoming_links: incoming[i],
            outgoing_links: outgoing_count,
            top_keywords: keywords[i].iter().take(5).cloned().collect(),
            link_opportunities: found_count,
        });
    }

    opportunities.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    opportunities.truncate(MAX_OPPORTUNITIES);

    let n = items.len() as f64;
    stats.avg_outgoing_links = round_to(outgoing.iter().map(Vec::len).sum::<usize>() as f64 / n, 1);
    stats.avg_incoming_links = round_to(incoming.iter().sum::<usize>() as f64 / n, 1);

    tracing::info!(
        items = items.len(),
        orphans = orphans.len(),
        opportunities = opportunities.len(),
        "internal link analysis complete"
    );
    Ok(LinkAnalysis {
        analyzed_at: now_timestamp(),
        total_pages,
        total_articles,
        total_content: items.len(),
        pages,
        orphan_pages: orphans,
        opportunities,
        statistics: stats,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingLink {
    pub href: String,
    pub anchor_text: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSuggestion {
    pub id: u64,
    pub title: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub url: String,
    pub relevance_score: u32,
    pub matching_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_anchors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    pub id: u64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub url: String,
    /// Items this one should link to.
    pub link_to: Vec<LinkSuggestion>,
    /// Items that should link to this one.
    pub link_from: Vec<LinkSuggestion>,
    pub existing_links: Vec<ExistingLink>,
}

fn suggestion(item: &ContentItem, rel: &Relevance, anchors: Vec<String>) -> LinkSuggestion {
    LinkSuggestion {
        id: item.id,
        title: item.title.clone(),
        slug: item.slug.clone(),
        kind: item.kind,
        url: item.url(),
        relevance_score: rel.score,
        matching_keywords: rel
            .matching_keywords
            .iter()
            .take(3)
            .map(|m| m.keyword.clone())
            .collect(),
        suggested_anchors: anchors,
    }
}

/// Linking suggestions in both directions for one item.
pub fn suggestions_for(
    items: &[ContentItem],
    id: u64,
    kind: ContentKind,
    limit: usize,
) -> Result<Suggestions> {
    let target = items
        .iter()
        .find(|i| i.id == id && i.kind == kind)
        .ok_or_else(|| Error::Validation(format!("{} not found.", kind.label())))?;

    let mut existing_keys: Vec<String> = Vec::new();
    let mut existing_links = Vec::new();
    for link in target.internal_links() {
        let detected = detect_content_type(&link.href);
        if let Some(d) = &detected {
            existing_keys.push(format!("{:?}:{}", d.kind, d.slug));
        }
        existing_keys.push(link.href.trim_matches('/').to_string());
        existing_links.push(ExistingLink {
            kind: detected.map(|d| d.kind).unwrap_or(ContentKind::Page),
            href: link.href,
            anchor_text: link.anchor_text,
        });
    }

    let mut link_to = Vec::new();
    let mut link_from = Vec::new();
    for other in items {
        if other.key() == target.key() {
            continue;
        }
        let already_linking = existing_keys.contains(&other.slug)
            || existing_keys.contains(&format!("{:?}:{}", other.kind, other.slug));

        let rel = relevance(target, other);
        if rel.score >= SUGGESTION_THRESHOLD && !already_linking {
            let anchors = suggest_anchors(other, &rel.matching_keywords)
                .into_iter()
                .take(2)
                .map(|a| a.text)
                .collect();
            link_to.push(suggestion(other, &rel, anchors));
        }

        let reverse = relevance(other, target);
        let links_to_us = other
            .internal_links()
            .iter()
            .any(|l| l.href.contains(&target.slug));
        if reverse.score >= SUGGESTION_THRESHOLD && !links_to_us {
            link_from.push(suggestion(other, &reverse, Vec::new()));
        }
    }

    link_to.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    link_from.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    link_to.truncate(limit);
    link_from.truncate(limit);

    Ok(Suggestions {
        id: target.id,
        title: target.title.clone(),
        kind: target.kind,
        url: target.url(),
        link_to,
        link_from,
        existing_links,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Good,
    NeedsImprovement,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkHealth {
    pub score: u32,
    pub status: HealthStatus,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Link health of one item from its incoming and outgoing internal link counts.
pub fn health_score(incoming: usize, outgoing: usize) -> LinkHealth {
    let mut score: i32 = 0;
    let mut issues = Vec::new();
    let mut recs = Vec::new();
    let mut flag = |issue: &str, rec: &str| {
        issues.push(issue.to_string());
        recs.push(rec.to_string());
    };

    match incoming {
        0 => {
            score -= 30;
            flag(
                "Orphan page: no internal links pointing to this page",
                "Add internal links from related pages to improve discoverability",
            );
        }
        1..=2 => {
            score -= 10;
            flag(
                "Low incoming links",
                "Consider adding more internal links from relevant pages",
            );
        }
        _ => score += 20,
    }

    match outgoing {
        0 => {
            score -= 20;
            flag(
                "No outgoing internal links",
                "Add links to related content to improve site structure",
            );
        }
        1 => {
            score -= 5;
            flag("Few outgoing links", "Consider linking to more related pages");
        }
        n if n > 100 => {
            score -= 15;
            flag(
                "Too many outgoing links",
                "Consider reducing link count for better link equity distribution",
            );
        }
        _ => score += 15,
    }

    if incoming > 0 && outgoing > 0 {
        let ratio = incoming as f64 / outgoing as f64;
        if ratio > 5.0 {
            flag(
                "Imbalanced: many incoming but few outgoing",
                "This is a hub page - consider adding contextual links",
            );
        } else if ratio < 0.2 {
            flag(
                "Imbalanced: many outgoing but few incoming",
                "Promote this page with more internal links",
            );
        } else {
            score += 15;
        }
    }

    let score = (50 + score).clamp(0, 100) as u32;
    let status = match score {
        s if s < 40 => HealthStatus::Poor,
        s if s < 70 => HealthStatus::NeedsImprovement,
        _ => HealthStatus::Good,
    };
    LinkHealth {
        score,
        status,
        issues,
        recommendations: recs,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Anchor candidates in preference order: the caller's text, the target title,
/// shared keywords, title bigrams and words, then slug words.
fn anchor_candidates(source: &ContentItem, target: &ContentItem, preferred: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let preferred = preferred.trim();
    if !preferred.is_empty() {
        out.push(preferred.to_string());
    }
    out.push(target.title.clone());

    let src_kw = extract_keywords(&source.title, &source.content, 30);
    let tgt_kw = extract_keywords(&target.title, &target.content, 30);
    out.extend(
        src_kw
            .into_iter()
            .filter(|k| tgt_kw.contains(k) && k.chars().count() >= 4),
    );

    let title_words: Vec<&str> = target.title.split_whitespace().collect();
    out.extend(title_words.windows(2).map(|w| format!("{} {}", w[0], w[1])));
    out.extend(
        title_words
            .iter()
            .filter(|w| w.chars().count() >= 4)
            .map(|w| w.to_string()),
    );

    let slug_words: Vec<&str> = target.slug.split('-').collect();
    if slug_words.len() >= 2 {
        out.push(slug_words.join(" "));
    }
    out.extend(
        slug_words
            .iter()
            .filter(|w| w.chars().count() >= 4)
            .map(|w| w.to_string()),
    );

    let mut seen = std::collections::HashSet::new();
    out.retain(|a| seen.insert(a.clone()));
    out
}

/// `content` must already be ASCII-lowercased.
fn is_linkable_at(content: &str, pos: usize) -> bool {
    let before = &content[..pos];
    let inside_link = match (before.rfind("<a "), before.rfind("</a>")) {
        (Some(open), Some(close)) => close < open,
        (Some(_), None) => true,
        _ => false,
    };
    let inside_tag = match (before.rfind('<'), before.rfind('>')) {
        (Some(open), Some(close)) => close < open,
        (Some(_), None) => true,
        _ => false,
    };
    !inside_link && !inside_tag
}

/// First occurrence of `anchor` in `content` (ASCII case-insensitive) that
/// sits in text outside any tag or open `<a>`.
fn linkable_position(content: &str, anchor: &str) -> Option<usize> {
    let haystack = content.to_ascii_lowercase();
    let needle = anchor.to_ascii_lowercase();
    haystack
        .match_indices(&needle)
        .map(|(pos, _)| pos)
        .find(|&pos| is_linkable_at(&haystack, pos))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// `content` is the source with the first eligible occurrence wrapped.
    Applied {
        content: String,
        anchor: String,
        url: String,
    },
    /// No candidate text occurs in linkable position; `link_html` can be
    /// pasted manually.
    NoAnchor { link_html: String, tried: Vec<String> },
}

/// Wrap the best anchor text in `source.content` with a link to `target`.
///
/// Fails when the source already links to the target's url.
pub fn apply_link(source: &ContentItem, target: &ContentItem, anchor: &str) -> Result<ApplyOutcome> {
    let url = target.url();
    let lc = source.content.to_lowercase();
    let url_lc = url.to_lowercase();
    if lc.contains(&format!("href=\"{url_lc}\"")) || lc.contains(&format!("href='{url_lc}'")) {
        return Err(Error::Validation(format!(
            "Link to this {} already exists",
            target.kind.label().to_lowercase()
        )));
    }

    let candidates = anchor_candidates(source, target, anchor);
    let plain = plain_text(&source.content).to_lowercase();
    for candidate in &candidates {
        if candidate.chars().count() < 3 || !plain.contains(&candidate.to_lowercase()) {
            continue;
        }
        let Some(pos) = linkable_position(&source.content, candidate) else {
            continue;
        };
        let end = pos + candidate.len();
        let original = &source.content[pos..end];
        let content = format!(
            "{}<a href=\"{}\">{}</a>{}",
            &source.content[..pos],
            escape_html(&url),
            original,
            &source.content[end..]
        );
        tracing::info!(from = source.id, to = %url, anchor = %original, "internal link applied");
        return Ok(ApplyOutcome::Applied {
            anchor: original.to_string(),
            content,
            url,
        });
    }

    Ok(ApplyOutcome::NoAnchor {
        link_html: format!(
            "<a href=\"{}\">{}</a>",
            escape_html(&url),
            escape_html(&target.title)
        ),
        tried: candidates.into_iter().take(10).collect(),
    })
}

/// Unwrap every `<a>` pointing at `url`, keeping its inner text.
pub fn remove_link(content: &str, url: &str) -> Result<String> {
    let url = url.trim();
    let pattern = format!(
        r#"(?is)<a\s+[^>]*href=["']{}["'][^>]*>(.*?)</a>"#,
        regex::escape(url)
    );
    let re = Regex::new(&pattern).map_err(|e| Error::Validation(e.to_string()))?;
    if !re.is_match(content) {
        return Err(Error::Validation("Link not found in content".to_string()));
    }
    Ok(re.replace_all(content, "$1").into_owned())
}

/// `ai-linking/latest_analysis.json`.
#[derive(Debug, Clone)]
pub struct LinkingStore {
    path: PathBuf,
}

impl LinkingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            path: root.into().join("ai-linking").join("latest_analysis.json"),
        }
    }

    pub fn save(&self, analysis: &LinkAnalysis) -> Result<()> {
        write_json_atomic(&self.path, analysis)
    }

    pub fn load(&self) -> Result<Option<LinkAnalysis>> {
        read_json(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Vec<ContentItem> {
        vec![
            ContentItem::page(
                1,
                "Home",
                "home",
                r#"<p>Welcome. Read about <a href="/dns-hosting">DNS hosting</a> and
                   <a href="/blog/dns-records-explained">records</a>.</p>"#,
            ),
            ContentItem::page(
                2,
                "DNS Hosting",
                "dns-hosting",
                "<p>Managed dns hosting with fast dns records propagation. \
                 Our dns hosting plans include dns records editing and anycast dns.</p>",
            ),
            ContentItem::article(
                1,
                "DNS Records Explained",
                "dns-records-explained",
                "<p>Every zone has dns records. Common dns records are A, MX and TXT. \
                 Dns hosting providers let you edit dns records quickly.</p>",
            ),
            ContentItem::article(
                2,
                "Baking Sourdough Bread",
                "sourdough",
                "<p>Flour, water and salt make bread. Sourdough starter needs feeding.</p>",
            ),
        ]
    }

    #[test]
    fn detects_articles_and_pages() {
        assert_eq!(
            detect_content_type("/blog/dns-records/"),
            Some(DetectedContent {
                kind: ContentKind::Article,
                slug: "dns-records".to_string()
            })
        );
        assert_eq!(
            detect_content_type("/Article/Intro_1").map(|d| d.kind),
            Some(ContentKind::Article)
        );
        assert_eq!(
            detect_content_type("/pricing/").map(|d| (d.kind, d.slug)),
            Some((ContentKind::Page, "pricing".to_string()))
        );
        assert_eq!(detect_content_type("/docs/api/v1"), None);
        assert_eq!(detect_content_type("/"), None);
    }

    #[test]
    fn keywords_boost_title_and_repeated_bigrams() {
        let kws = extract_keywords(
            "Anycast Routing",
            "<p>dns records and dns records again; the dns server</p>",
            MAX_KEYWORDS,
        );
        // title words +5 each, "dns records" bigram 2x2, "dns" 3
        assert_eq!(kws[0], "anycast");
        assert_eq!(kws[1], "routing");
        assert_eq!(kws[2], "dns records");
        assert_eq!(kws[3], "dns");
        assert!(!kws.iter().any(|k| k == "the" || k == "and"));
        assert_eq!(extract_keywords("", "", MAX_KEYWORDS), Vec::<String>::new());
    }

    #[test]
    fn relevance_is_zero_for_same_item_and_bounded() {
        let items = site();
        assert_eq!(relevance(&items[1], &items[1]).score, 0);
        // same id, different kind: not the same item
        assert!(relevance(&items[0], &items[2]).score <= 100);

        let r = relevance(&items[2], &items[1]);
        assert!(r.score >= OPPORTUNITY_THRESHOLD, "score={}", r.score);
        assert!(r.matching_keywords.iter().any(|m| m.keyword == "dns"));
        assert_eq!(r.title_matches, vec!["dns".to_string()]);

        let unrelated = relevance(&items[3], &items[1]);
        assert!(unrelated.score < SUGGESTION_THRESHOLD);
    }

    #[test]
    fn anchors_follow_priority_order() {
        let target = ContentItem::article(9, "DNS Records Explained", "dns-records-explained", "");
        let matches = vec![
            KeywordMatch {
                keyword: "dns".to_string(),
                source_rank: 1,
                target_rank: 1,
            },
            KeywordMatch {
                keyword: "dns records".to_string(),
                source_rank: 2,
                target_rank: 2,
            },
        ];
        let a = suggest_anchors(&target, &matches);
        let texts: Vec<&str> = a.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "DNS Records Explained",
                "Dns records",
                "Dns records explained",
                "Learn more about dns records explained",
                "Read our guide on dns records explained",
                "See also: DNS Records Explained",
            ]
        );
        let priorities: Vec<u8> = a.iter().map(|s| s.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3, 4, 4, 4]);

        let long = ContentItem::page(1, &"x".repeat(51), "single", "");
        assert_eq!(suggest_anchors(&long, &[]).len(), 1);
    }

    #[test]
    fn analysis_finds_orphans_and_counts_links() {
        let a = analyze_all(&site()).unwrap();
        assert_eq!(a.total_pages, 2);
        assert_eq!(a.total_articles, 2);
        assert_eq!(a.statistics.total_internal_links, 2);
        assert_eq!(a.statistics.pages_with_no_outgoing, 1);
        assert_eq!(a.statistics.articles_with_no_outgoing, 2);

        let orphans: Vec<(ContentKind, u64)> =
            a.orphan_pages.iter().map(|o| (o.kind, o.id)).collect();
        assert_eq!(
            orphans,
            vec![(ContentKind::Page, 1), (ContentKind::Article, 2)]
        );
        let hosting = &a.pages[1];
        assert_eq!(hosting.incoming_links, 1);
        assert_eq!(a.pages[2].incoming_links, 1);
        assert_eq!(a.statistics.avg_outgoing_links, 0.5);
        assert_eq!(a.statistics.avg_incoming_links, 0.5);

        // home already links to both dns items; sourdough is unrelated
        assert!(a
            .opportunities
            .iter()
            .all(|o| o.from_id != 1 || o.from_type != ContentKind::Page));
        assert!(a.opportunities.iter().all(|o| o.to_slug != "sourdough"));
        assert!(a.opportunities.iter().any(|o| o.from_type == ContentKind::Article
            && o.to_slug == "dns-hosting"));
        assert!(a
            .opportunities
            .windows(2)
            .all(|w| w[0].relevance_score >= w[1].relevance_score));

        assert!(analyze_all(&[]).is_err());
    }

    #[test]
    fn focus_keyword_leads_top_keywords() {
        let mut items = site();
        items[2].focus_keyword = Some("zone files".to_string());
        let a = analyze_all(&items).unwrap();
        assert_eq!(a.pages[2].top_keywords[0], "zone files");
        assert_eq!(a.pages[2].top_keywords.len(), 5);
    }

    #[test]
    fn suggestions_skip_existing_links() {
        let items = site();
        let s = suggestions_for(&items, 1, ContentKind::Article, 10).unwrap();
        assert_eq!(s.url, "/blog/dns-records-explained");
        assert!(s.existing_links.is_empty());
        assert!(s.link_to.iter().any(|l| l.slug == "dns-hosting"));
        assert!(s.link_to.iter().all(|l| l.suggested_anchors.len() <= 2));
        // home links to the article already
        assert!(s.link_from.iter().all(|l| l.slug != "home"));

        let home = suggestions_for(&items, 1, ContentKind::Page, 10).unwrap();
        assert_eq!(home.existing_links.len(), 2);
        assert_eq!(home.existing_links[1].kind, ContentKind::Article);
        assert!(home.link_to.iter().all(|l| l.slug != "dns-hosting"));

        match suggestions_for(&items, 42, ContentKind::Page, 10) {
            Err(Error::Validation(msg)) => assert_eq!(msg, "Page not found."),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn health_score_bands() {
        let orphan = health_score(0, 0);
        assert_eq!(orphan.score, 0);
        assert_eq!(orphan.status, HealthStatus::Poor);
        assert_eq!(orphan.issues.len(), 2);
        assert_eq!(orphan.recommendations.len(), 2);

        let healthy = health_score(5, 5);
        assert_eq!(healthy.score, 100);
        assert_eq!(healthy.status, HealthStatus::Good);
        assert!(healthy.issues.is_empty());

        let hub = health_score(12, 2);
        assert_eq!(hub.score, 85);
        assert_eq!(hub.issues, vec!["Imbalanced: many incoming but few outgoing"]);

        let low = health_score(1, 1);
        assert_eq!(low.score, 50);
        assert_eq!(low.status, HealthStatus::NeedsImprovement);

        assert_eq!(health_score(3, 101).score, 55);
    }

    #[test]
    fn apply_link_wraps_first_eligible_occurrence() {
        let source = ContentItem::page(
            5,
            "Guides",
            "guides",
            r#"<p><a href="/x">dns hosting</a> <img alt="dns hosting"> We compare dns hosting plans.</p>"#,
        );
        let target = ContentItem::page(2, "DNS Hosting", "dns-hosting", "");
        match apply_link(&source, &target, "").unwrap() {
            ApplyOutcome::Applied {
                content,
                anchor,
                url,
            } => {
                assert_eq!(url, "/dns-hosting");
                assert_eq!(anchor, "dns hosting");
                assert!(content.contains(r#"We compare <a href="/dns-hosting">dns hosting</a> plans."#));
                assert!(content.starts_with(r#"<p><a href="/x">dns hosting</a>"#));
            }
            other => panic!("expected applied link, got {other:?}"),
        }
    }

    #[test]
    fn apply_link_never_nests_links() {
        let source = ContentItem::page(
            5,
            "Guides",
            "guides",
            r#"<p>See <a href="/x">the dns hosting guide</a>.</p>"#,
        );
        let target = ContentItem::page(2, "DNS Hosting", "dns-hosting", "");
        match apply_link(&source, &target, "").unwrap() {
            ApplyOutcome::NoAnchor { link_html, tried } => {
                assert_eq!(link_html, r#"<a href="/dns-hosting">DNS Hosting</a>"#);
                assert_eq!(tried[0], "DNS Hosting");
            }
            other => panic!("expected no anchor, got {other:?}"),
        }
    }

    #[test]
    fn apply_link_skips_text_inside_uppercase_anchors() {
        let source = ContentItem::page(
            5,
            "Guides",
            "guides",
            r#"<P>See <A HREF="/x">the dns hosting guide</A>.</P>"#,
        );
        let target = ContentItem::page(2, "DNS Hosting", "dns-hosting", "");
        assert!(matches!(
            apply_link(&source, &target, "").unwrap(),
            ApplyOutcome::NoAnchor { .. }
        ));
    }

    #[test]
    fn apply_link_rejects_existing_link() {
        let source = ContentItem::page(5, "Guides", "guides", r#"<a HREF='/dns-hosting'>x</a>"#);
        let target = ContentItem::page(2, "DNS Hosting", "dns-hosting", "");
        assert!(apply_link(&source, &target, "").is_err());
    }

    #[test]
    fn remove_link_unwraps_matching_anchor() {
        let html = r#"<p>Try <a class="x" href="/blog/dns-101">DNS <b>basics</b></a> or <a href='/other'>this</a>.</p>"#;
        let out = remove_link(html, "/blog/dns-101").unwrap();
        assert_eq!(out, r#"<p>Try DNS <b>basics</b> or <a href='/other'>this</a>.</p>"#);
        assert!(remove_link(html, "/missing").is_err());
    }

    #[test]
    fn store_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LinkingStore::new(tmp.path());
        assert!(store.load().unwrap().is_none());
        let a = analyze_all(&site()).unwrap();
        store.save(&a).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), a);
        assert!(tmp.path().join("ai-linking/latest_analysis.json").exists());
    }
}

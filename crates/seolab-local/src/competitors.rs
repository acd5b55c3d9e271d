//! Per-keyword competitor tracking: on-page metrics, comparisons against our
//! own page, content gaps, share of voice and change alerts.

use crate::compare::similar_text_percent;
use crate::extract::{collapse_whitespace, page_title, raw_headings, text_excluding, word_count};
use crate::links::count_page_links;
use crate::store::{now_timestamp, read_json, slugify, write_json_atomic};
use seolab_core::{round_to, Error, PageFetcher, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_ALERTS: usize = 100;
const DEFAULT_ALERT_LIMIT: usize = 50;
const GAP_SIMILARITY_PERCENT: f64 = 70.0;
const SOV_MISSING_SCORE: u32 = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub heading_count: usize,
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default)]
    pub keyword_count: usize,
    #[serde(default)]
    pub keyword_density: f64,
    #[serde(default)]
    pub keyword_in_headings: usize,
    #[serde(default)]
    pub image_count: usize,
    #[serde(default)]
    pub images_with_alt: usize,
    #[serde(default)]
    pub images_with_kw_alt: usize,
    #[serde(default)]
    pub internal_links: usize,
    #[serde(default)]
    pub external_links: usize,
    #[serde(default)]
    pub link_count: usize,
    #[serde(default)]
    pub list_count: usize,
    #[serde(default)]
    pub table_count: usize,
    #[serde(default)]
    pub paragraph_count: usize,
    #[serde(default)]
    pub avg_words_per_sentence: f64,
    /// Content depth score, 0..=100.
    #[serde(default)]
    pub score: u32,
    /// On-page SEO score, 0..=100.
    #[serde(default)]
    pub seo_score: u32,
    #[serde(default)]
    pub analyzed_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PageMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<String>,
}

impl Competitor {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            metrics: None,
            added_at: None,
        }
    }

    /// Title, or the url's host when the title is blank.
    pub fn display_name(&self) -> String {
        if !self.title.trim().is_empty() {
            return self.title.clone();
        }
        crate::host_of(&self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OurContent {
    pub url: String,
    pub metrics: PageMetrics,
    pub analyzed_at: String,
}

/// One keyword's tracking file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorFile {
    pub keyword: String,
    #[serde(default)]
    pub competitors: Vec<Competitor>,
    #[serde(default)]
    pub our_content: Option<OurContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl CompetitorFile {
    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            competitors: Vec::new(),
            our_content: None,
            updated_at: None,
        }
    }

    fn our_metrics(&self) -> PageMetrics {
        self.our_content
            .as_ref()
            .map(|o| o.metrics.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedKeyword {
    pub keyword: String,
    pub competitors_count: usize,
    pub updated_at: String,
    pub our_score: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricGap {
    pub metric: String,
    pub our_value: usize,
    pub competitor_avg: usize,
    pub gap: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricAdvantage {
    pub metric: String,
    pub our_value: usize,
    pub competitor_avg: usize,
    pub advantage: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub issue: String,
    pub action: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Averages {
    pub word_count: usize,
    pub headings: usize,
    pub images: usize,
    pub score: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub gaps: Vec<MetricGap>,
    pub advantages: Vec<MetricAdvantage>,
    pub recommendations: Vec<Recommendation>,
    /// `None` when there are no competitors to average.
    pub averages: Option<Averages>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorAnalysis {
    pub keyword: String,
    pub our_score: u32,
    pub competitor_count: usize,
    pub competitor_avg_score: usize,
    pub best_competitor: Option<Competitor>,
    pub comparison: Comparison,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorReport {
    pub keyword: String,
    pub generated_at: String,
    pub our_content: Option<OurContent>,
    pub competitors: Vec<Competitor>,
    pub analysis: Option<CompetitorAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub url: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentGap {
    pub topic: String,
    pub competitors_covering: usize,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityKind {
    Strength,
    Weakness,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(rename = "type")]
    pub kind: OpportunityKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapReport {
    pub gaps: Vec<ContentGap>,
    pub opportunities: Vec<Opportunity>,
    pub total_competitors: usize,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceShare {
    pub name: String,
    pub score: u32,
    pub share: f64,
    pub url: Option<String>,
    pub is_us: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareOfVoice {
    pub our_share: f64,
    pub total_score: u32,
    pub breakdown: Vec<VoiceShare>,
    pub calculated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub rank: usize,
    pub name: String,
    pub url: String,
    pub is_us: bool,
    pub word_count: usize,
    pub heading_count: usize,
    pub link_count: usize,
    pub image_count: usize,
    pub keyword_density: f64,
    pub seo_score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub avg_word_count: usize,
    pub avg_headings: f64,
    pub avg_links: usize,
    pub avg_seo_score: f64,
    pub total_competitors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub rows: Vec<TableRow>,
    pub summary: TableSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub keyword: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub read: bool,
    pub created_at: String,
}

fn count_selector(doc: &html_scraper::Html, css: &str) -> usize {
    html_scraper::Selector::parse(css)
        .map(|sel| doc.select(&sel).count())
        .unwrap_or(0)
}

fn meta_description(doc: &html_scraper::Html) -> String {
    let Ok(sel) = html_scraper::Selector::parse("meta[name]") else {
        return String::new();
    };
    doc.select(&sel)
        .find(|el| {
            el.value()
                .attr("name")
                .is_some_and(|n| n.eq_ignore_ascii_case("description"))
        })
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .unwrap_or_default()
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    !needle_lower.is_empty() && haystack.to_lowercase().contains(needle_lower)
}

fn content_score(m: &PageMetrics) -> u32 {
    let mut score = 50u32;
    score += match m.word_count {
        n if n >= 2000 => 15,
        n if n >= 1500 => 12,
        n if n >= 1000 => 8,
        n if n >= 500 => 5,
        _ => 0,
    };
    score += match m.heading_count {
        n if n >= 8 => 10,
        n if n >= 5 => 7,
        n if n >= 3 => 4,
        _ => 0,
    };
    if (0.5..=2.5).contains(&m.keyword_density) {
        score += 10;
    }
    if m.keyword_in_headings >= 2 {
        score += 5;
    }
    if m.image_count >= 3 {
        score += 5;
    }
    if m.list_count >= 2 {
        score += 5;
    }
    if m.table_count >= 1 {
        score += 3;
    }
    if m.internal_links >= 3 {
        score += 4;
    }
    if m.external_links >= 2 {
        score += 3;
    }
    score.min(100)
}

fn seo_score(m: &PageMetrics, keyword_lower: &str) -> u32 {
    let mut score = 0u32;
    score += match m.word_count {
        n if n >= 1000 => 20,
        n if n >= 500 => 10,
        _ => 0,
    };
    score += match m.heading_count {
        n if n >= 5 => 15,
        n if n >= 3 => 10,
        _ => 0,
    };
    if (0.5..=2.5).contains(&m.keyword_density) {
        score += 20;
    }
    if contains_ci(&m.title, keyword_lower) {
        score += 15;
    }
    if contains_ci(&m.meta_description, keyword_lower) {
        score += 10;
    }
    if m.image_count > 0 {
        score += 10;
        if m.images_with_alt == m.image_count {
            score += 10;
        }
    }
    score.min(100)
}

/// On-page metrics of `html` for `keyword`.
///
/// `page_url` is used to tell internal from external absolute links.
pub fn analyze_html(html: &str, page_url: Option<&str>, keyword: &str) -> PageMetrics {
    let doc = html_scraper::Html::parse_document(html);
    let keyword_lower = keyword.trim().to_lowercase();

    let text = text_excluding(&doc, &["script", "style"]);
    let words = word_count(&text);
    let keyword_count = if keyword_lower.is_empty() {
        0
    } else {
        text.to_lowercase().matches(keyword_lower.as_str()).count()
    };
    let keyword_density = if words > 0 {
        round_to(keyword_count as f64 / words as f64 * 100.0, 2)
    } else {
        0.0
    };

    let headings: Vec<String> = raw_headings(&doc).into_iter().map(|h| h.text).collect();
    let keyword_in_headings = headings
        .iter()
        .filter(|h| contains_ci(h, &keyword_lower))
        .count();

    let (mut image_count, mut images_with_alt, mut images_with_kw_alt) = (0, 0, 0);
    if let Ok(sel) = html_scraper::Selector::parse("img") {
        for img in doc.select(&sel) {
            image_count += 1;
            let alt = img.value().attr("alt").unwrap_or("").trim();
            if !alt.is_empty() {
                images_with_alt += 1;
                if contains_ci(alt, &keyword_lower) {
                    images_with_kw_alt += 1;
                }
            }
        }
    }

    let links = count_page_links(&doc, page_url);
    let sentences = text.split(['.', '!', '?']).filter(|s| !s.is_empty()).count();
    let avg_words_per_sentence = if sentences > 0 {
        round_to(words as f64 / sentences as f64, 1)
    } else {
        0.0
    };

    let mut m = PageMetrics {
        title: page_title(&doc),
        meta_description: collapse_whitespace(&meta_description(&doc)),
        word_count: words,
        heading_count: headings.len(),
        headings,
        keyword_count,
        keyword_density,
        keyword_in_headings,
        image_count,
        images_with_alt,
        images_with_kw_alt,
        internal_links: links.internal,
        external_links: links.external,
        link_count: links.internal + links.external,
        list_count: count_selector(&doc, "ul, ol"),
        table_count: count_selector(&doc, "table"),
        paragraph_count: count_selector(&doc, "p"),
        avg_words_per_sentence,
        score: 0,
        seo_score: 0,
        analyzed_at: now_timestamp(),
    };
    m.score = content_score(&m);
    m.seo_score = seo_score(&m, &keyword_lower);
    m
}

fn mean(values: impl Iterator<Item = usize>, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    values.sum::<usize>() as f64 / count as f64
}

/// Our page against the competitor averages.
pub fn compare(ours: &PageMetrics, competitors: &[Competitor]) -> Comparison {
    if competitors.is_empty() {
        return Comparison::default();
    }
    let n = competitors.len();
    let metric = |f: fn(&PageMetrics) -> usize| {
        mean(
            competitors
                .iter()
                .map(|c| c.metrics.as_ref().map(f).unwrap_or(0)),
            n,
        )
        .round() as usize
    };
    let avg = Averages {
        word_count: metric(|m| m.word_count),
        headings: metric(|m| m.heading_count),
        images: metric(|m| m.image_count),
        score: metric(|m| m.score as usize),
    };

    let mut out = Comparison {
        averages: Some(avg),
        ..Comparison::default()
    };

    let words = ours.word_count;
    if (words as f64) < avg.word_count as f64 * 0.8 {
        let diff = avg.word_count - words;
        out.gaps.push(MetricGap {
            metric: "Word Count".to_string(),
            our_value: words,
            competitor_avg: avg.word_count,
            gap: diff,
        });
        out.recommendations.push(Recommendation {
            priority: Priority::High,
            issue: format!("Content is {diff} words shorter than competitors"),
            action: format!("Expand content to at least {} words", avg.word_count),
        });
    } else if words as f64 > avg.word_count as f64 * 1.2 {
        out.advantages.push(MetricAdvantage {
            metric: "Word Count".to_string(),
            our_value: words,
            competitor_avg: avg.word_count,
            advantage: words - avg.word_count,
        });
    }

    let headings = ours.heading_count;
    if (headings as f64) < avg.headings as f64 * 0.7 {
        out.gaps.push(MetricGap {
            metric: "Headings".to_string(),
            our_value: headings,
            competitor_avg: avg.headings,
            gap: avg.headings - headings,
        });
        out.recommendations.push(Recommendation {
            priority: Priority::Medium,
            issue: format!(
                "Fewer headings than competitors ({headings} vs {})",
                avg.headings
            ),
            action: "Add more H2/H3 headings to improve structure".to_string(),
        });
    } else if headings as f64 > avg.headings as f64 * 1.3 {
        out.advantages.push(MetricAdvantage {
            metric: "Headings".to_string(),
            our_value: headings,
            competitor_avg: avg.headings,
            advantage: headings - avg.headings,
        });
    }

    let images = ours.image_count;
    if avg.images > 0 && (images as f64) < avg.images as f64 * 0.7 {
        out.gaps.push(MetricGap {
            metric: "Images".to_string(),
            our_value: images,
            competitor_avg: avg.images,
            gap: avg.images - images,
        });
        out.recommendations.push(Recommendation {
            priority: Priority::Medium,
            issue: format!("Fewer images than competitors ({images} vs {})", avg.images),
            action: "Add relevant images to improve engagement".to_string(),
        });
    }

    let score = ours.score as usize;
    if score + 10 < avg.score {
        out.recommendations.push(Recommendation {
            priority: Priority::High,
            issue: "Overall content score below competitor average".to_string(),
            action: "Focus on improving content depth and optimization".to_string(),
        });
    } else if score > avg.score + 10 {
        out.advantages.push(MetricAdvantage {
            metric: "Overall Score".to_string(),
            our_value: score,
            competitor_avg: avg.score,
            advantage: score - avg.score,
        });
    }

    out
}

fn csv_row(cells: &[String]) -> String {
    let quoted: Vec<String> = cells
        .iter()
        .map(|c| format!("\"{}\"", c.replace('"', "\"\"")))
        .collect();
    format!("{}\n", quoted.join(","))
}

fn metric_cells(keyword: &str, name: &str, url: &str, m: Option<&PageMetrics>) -> Vec<String> {
    let num = |f: fn(&PageMetrics) -> String| m.map(f).unwrap_or_default();
    vec![
        keyword.to_string(),
        name.to_string(),
        url.to_string(),
        num(|m| m.word_count.to_string()),
        num(|m| m.heading_count.to_string()),
        num(|m| m.link_count.to_string()),
        num(|m| m.seo_score.to_string()),
        num(|m| m.analyzed_at.clone()),
    ]
}

/// `uniqid`-style id: hex seconds followed by five hex digits of microseconds.
fn alert_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("alert_{:x}{:05x}", now.as_secs(), now.subsec_micros())
}

/// `competitors/<slug>.json` files plus the shared `alerts.json`.
#[derive(Debug, Clone)]
pub struct CompetitorStore {
    dir: PathBuf,
}

impl CompetitorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            dir: root.into().join("competitors"),
        }
    }

    fn path_for(&self, keyword: &str) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}.json", slugify(keyword.trim())?)))
    }

    fn alerts_path(&self) -> PathBuf {
        self.dir.join("alerts.json")
    }

    pub fn load(&self, keyword: &str) -> Result<Option<CompetitorFile>> {
        read_json(&self.path_for(keyword)?)
    }

    /// Stamps `keyword` and `updated_at` before writing.
    pub fn save(&self, keyword: &str, data: &mut CompetitorFile) -> Result<()> {
        data.keyword = keyword.to_string();
        data.updated_at = Some(now_timestamp());
        write_json_atomic(&self.path_for(keyword)?, data)
    }

    /// Every tracked keyword, most recently updated first.
    pub fn list_tracked(&self) -> Result<Vec<TrackedKeyword>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Store(e.to_string())),
        };
        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") || path == self.alerts_path() {
                continue;
            }
            let Ok(Some(data)) = read_json::<CompetitorFile>(&path) else {
                continue;
            };
            if data.keyword.is_empty() {
                continue;
            }
            out.push(TrackedKeyword {
                our_score: data.our_content.as_ref().map(|o| o.metrics.score),
                competitors_count: data.competitors.len(),
                updated_at: data.updated_at.unwrap_or_default(),
                keyword: data.keyword,
            });
        }
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    /// Returns `false` when a competitor with the same url is already tracked.
    pub fn add(&self, keyword: &str, mut competitor: Competitor) -> Result<bool> {
        let mut data = self
            .load(keyword)?
            .unwrap_or_else(|| CompetitorFile::new(keyword));
        if data.competitors.iter().any(|c| c.url == competitor.url) {
            return Ok(false);
        }
        competitor.added_at = Some(now_timestamp());
        data.competitors.push(competitor);
        self.save(keyword, &mut data)?;
        Ok(true)
    }

    /// Returns `false` when nothing is tracked for `keyword`.
    pub fn remove(&self, keyword: &str, url: &str) -> Result<bool> {
        let Some(mut data) = self.load(keyword)? else {
            return Ok(false);
        };
        data.competitors.retain(|c| c.url != url);
        self.save(keyword, &mut data)?;
        Ok(true)
    }

    pub fn delete(&self, keyword: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(keyword)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Store(e.to_string())),
        }
    }

    /// Analyze our own page for `keyword` and store it next to the competitors.
    pub fn update_our_content(&self, keyword: &str, url: &str, html: &str) -> Result<PageMetrics> {
        let mut data = self
            .load(keyword)?
            .unwrap_or_else(|| CompetitorFile::new(keyword));
        let metrics = analyze_html(html, Some(url), keyword);
        data.our_content = Some(OurContent {
            url: url.to_string(),
            metrics: metrics.clone(),
            analyzed_at: now_timestamp(),
        });
        self.save(keyword, &mut data)?;
        Ok(metrics)
    }

    /// `None` when the keyword is untracked or has no competitors.
    pub fn analysis(&self, keyword: &str) -> Result<Option<CompetitorAnalysis>> {
        let Some(data) = self.load(keyword)? else {
            return Ok(None);
        };
        if data.competitors.is_empty() {
            return Ok(None);
        }
        let ours = data.our_metrics();
        let comparison = compare(&ours, &data.competitors);

        let mut best: Option<&Competitor> = None;
        let mut best_score = 0;
        for c in &data.competitors {
            let s = c.metrics.as_ref().map(|m| m.score).unwrap_or(0);
            if s > best_score {
                best_score = s;
                best = Some(c);
            }
        }

        Ok(Some(CompetitorAnalysis {
            keyword: keyword.to_string(),
            our_score: ours.score,
            competitor_count: data.competitors.len(),
            competitor_avg_score: comparison.averages.map(|a| a.score).unwrap_or(0),
            best_competitor: best.cloned(),
            comparison,
        }))
    }

    pub fn report(&self, keyword: &str) -> Result<Option<CompetitorReport>> {
        let Some(data) = self.load(keyword)? else {
            return Ok(None);
        };
        Ok(Some(CompetitorReport {
            keyword: keyword.to_string(),
            generated_at: now_timestamp(),
            analysis: self.analysis(keyword)?,
            our_content: data.our_content,
            competitors: data.competitors,
        }))
    }

    /// Re-fetch and re-analyze every competitor, one at a time.
    pub async fn analyze_all(
        &self,
        fetcher: &dyn PageFetcher,
        keyword: &str,
    ) -> Result<Vec<RefreshOutcome>> {
        let mut data = self
            .load(keyword)?
            .ok_or_else(|| Error::Validation(format!("no competitors tracked for {keyword:?}")))?;
        let mut outcomes = Vec::new();
        for c in data.competitors.iter_mut() {
            if c.url.is_empty() {
                continue;
            }
            match fetcher.fetch(&c.url).await {
                Ok(page) => {
                    let metrics = analyze_html(&page.text_lossy(), Some(&c.url), keyword);
                    if !metrics.title.is_empty() {
                        c.title = metrics.title.clone();
                    }
                    c.metrics = Some(metrics);
                    outcomes.push(RefreshOutcome {
                        url: c.url.clone(),
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(url = %c.url, error = %e, "competitor fetch failed");
                    outcomes.push(RefreshOutcome {
                        url: c.url.clone(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        self.save(keyword, &mut data)?;
        tracing::info!(keyword, analyzed = outcomes.len(), "competitors refreshed");
        Ok(outcomes)
    }

    /// Heading topics at least two competitors cover that our page does not.
    pub fn detect_gaps(&self, keyword: &str) -> Result<GapReport> {
        let mut report = GapReport {
            gaps: Vec::new(),
            opportunities: Vec::new(),
            total_competitors: 0,
            analyzed_at: now_timestamp(),
        };
        let Some(data) = self.load(keyword)? else {
            return Ok(report);
        };

        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for c in &data.competitors {
            let Some(m) = &c.metrics else { continue };
            for h in &m.headings {
                let topic = h.trim().to_lowercase();
                if topic.len() <= 5 {
                    continue;
                }
                let n = counts.entry(topic.clone()).or_insert_with(|| {
                    order.push(topic);
                    0
                });
                *n += 1;
            }
        }

        let ours = data.our_metrics();
        let our_headings: Vec<String> = ours.headings.iter().map(|h| h.to_lowercase()).collect();
        for topic in order {
            let count = counts.get(&topic).copied().unwrap_or(0);
            if count < 2 {
                continue;
            }
            let covered = our_headings
                .iter()
                .any(|h| similar_text_percent(&topic, h) > GAP_SIMILARITY_PERCENT);
            if !covered {
                report.gaps.push(ContentGap {
                    topic,
                    competitors_covering: count,
                    priority: if count >= 3 {
                        Priority::High
                    } else {
                        Priority::Medium
                    },
                });
            }
        }
        report.gaps.sort_by(|a, b| {
            let rank = |p: Priority| if p == Priority::High { 0 } else { 1 };
            rank(a.priority)
                .cmp(&rank(b.priority))
                .then(b.competitors_covering.cmp(&a.competitors_covering))
        });

        let n = data.competitors.len();
        report.total_competitors = n;
        if n > 0 {
            let metric = |f: fn(&PageMetrics) -> usize| {
                mean(
                    data.competitors
                        .iter()
                        .map(|c| c.metrics.as_ref().map(f).unwrap_or(0)),
                    n,
                )
            };
            let avg_words = metric(|m| m.word_count);
            let our_words = ours.word_count as f64;
            if avg_words > 0.0 && our_words > avg_words * 1.2 {
                report.opportunities.push(Opportunity {
                    kind: OpportunityKind::Strength,
                    message: format!(
                        "Your content is {}% longer than average - good for rankings!",
                        ((our_words / avg_words - 1.0) * 100.0).round()
                    ),
                });
            } else if our_words < avg_words * 0.8 {
                report.opportunities.push(Opportunity {
                    kind: OpportunityKind::Weakness,
                    message: format!(
                        "Consider adding {} more words to match competitor average",
                        (avg_words - our_words).round()
                    ),
                });
            }

            let avg_headings = metric(|m| m.heading_count);
            if (ours.heading_count as f64) < avg_headings * 0.7 {
                report.opportunities.push(Opportunity {
                    kind: OpportunityKind::Weakness,
                    message: format!(
                        "Add more headings - competitors average {} vs your {}",
                        avg_headings.round(),
                        ours.heading_count
                    ),
                });
            }
        }
        Ok(report)
    }

    /// Each page's share of the summed SEO scores. Unanalyzed competitors count as 50.
    pub fn share_of_voice(&self, keyword: &str) -> Result<ShareOfVoice> {
        let mut out = ShareOfVoice {
            our_share: 0.0,
            total_score: 0,
            breakdown: Vec::new(),
            calculated_at: now_timestamp(),
        };
        let Some(data) = self.load(keyword)? else {
            return Ok(out);
        };

        let our_score = data.our_metrics().seo_score;
        out.breakdown.push(VoiceShare {
            name: "You".to_string(),
            score: our_score,
            share: 0.0,
            url: None,
            is_us: true,
        });
        for c in &data.competitors {
            out.breakdown.push(VoiceShare {
                name: c.display_name(),
                score: c
                    .metrics
                    .as_ref()
                    .map(|m| m.seo_score)
                    .unwrap_or(SOV_MISSING_SCORE),
                share: 0.0,
                url: Some(c.url.clone()),
                is_us: false,
            });
        }

        let total: u32 = out.breakdown.iter().map(|b| b.score).sum();
        out.total_score = total;
        if total > 0 {
            for b in &mut out.breakdown {
                b.share = round_to(b.score as f64 / total as f64 * 100.0, 1);
            }
            out.our_share = round_to(our_score as f64 / total as f64 * 100.0, 1);
        }
        out.breakdown.sort_by(|a, b| b.share.total_cmp(&a.share));
        Ok(out)
    }

    /// Quoted CSV of our page and every competitor; empty when untracked.
    pub fn export_csv(&self, keyword: &str) -> Result<String> {
        let Some(data) = self.load(keyword)? else {
            return Ok(String::new());
        };
        let mut out = csv_row(
            &[
                "Keyword",
                "Competitor",
                "URL",
                "Word Count",
                "Headings",
                "Links",
                "SEO Score",
                "Analyzed At",
            ]
            .map(String::from),
        );
        if let Some(o) = &data.our_content {
            out.push_str(&csv_row(&metric_cells(
                keyword,
                "YOUR CONTENT",
                &o.url,
                Some(&o.metrics),
            )));
        }
        for c in &data.competitors {
            out.push_str(&csv_row(&metric_cells(
                keyword,
                &c.title,
                &c.url,
                c.metrics.as_ref(),
            )));
        }
        Ok(out)
    }

    /// Our page and competitors ranked by SEO score.
    pub fn comparison_table(&self, keyword: &str) -> Result<ComparisonTable> {
        let Some(data) = self.load(keyword)? else {
            return Ok(ComparisonTable::default());
        };
        let row = |name: String, url: &str, is_us: bool, m: Option<&PageMetrics>| {
            let m = m.cloned().unwrap_or_default();
            TableRow {
                rank: 0,
                name,
                url: url.to_string(),
                is_us,
                word_count: m.word_count,
                heading_count: m.heading_count,
                link_count: m.link_count,
                image_count: m.image_count,
                keyword_density: m.keyword_density,
                seo_score: m.seo_score,
            }
        };

        let mut rows = Vec::new();
        if let Some(o) = &data.our_content {
            rows.push(row("YOUR CONTENT".to_string(), &o.url, true, Some(&o.metrics)));
        }
        for c in &data.competitors {
            rows.push(row(c.display_name(), &c.url, false, c.metrics.as_ref()));
        }
        rows.sort_by(|a, b| b.seo_score.cmp(&a.seo_score));
        for (i, r) in rows.iter_mut().enumerate() {
            r.rank = i + 1;
        }

        let theirs: Vec<&TableRow> = rows.iter().filter(|r| !r.is_us).collect();
        let n = theirs.len();
        let summary = if n == 0 {
            TableSummary::default()
        } else {
            TableSummary {
                avg_word_count: mean(theirs.iter().map(|r| r.word_count), n).round() as usize,
                avg_headings: round_to(mean(theirs.iter().map(|r| r.heading_count), n), 1),
                avg_links: mean(theirs.iter().map(|r| r.link_count), n).round() as usize,
                avg_seo_score: round_to(
                    mean(theirs.iter().map(|r| r.seo_score as usize), n),
                    1,
                ),
                total_competitors: n,
            }
        };
        Ok(ComparisonTable { rows, summary })
    }

    /// Newest-first alert log, capped at 100 entries.
    pub fn add_alert(
        &self,
        keyword: &str,
        kind: &str,
        message: &str,
        data: serde_json::Value,
    ) -> Result<Alert> {
        let path = self.alerts_path();
        let mut alerts: Vec<Alert> = match read_json(&path) {
            Ok(existing) => existing.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "unreadable alert log, starting a new one"
                );
                Vec::new()
            }
        };
        let alert = Alert {
            id: alert_id(),
            keyword: keyword.to_string(),
            kind: kind.to_string(),
            message: message.to_string(),
            data,
            read: false,
            created_at: now_timestamp(),
        };
        alerts.insert(0, alert.clone());
        alerts.truncate(MAX_ALERTS);
        write_json_atomic(&path, &alerts)?;
        Ok(alert)
    }

    /// Alerts for `keyword`, or the 50 newest across all keywords.
    pub fn alerts(&self, keyword: Option<&str>) -> Result<Vec<Alert>> {
        let alerts: Vec<Alert> = read_json(&self.alerts_path())?.unwrap_or_default();
        Ok(match keyword.filter(|k| !k.is_empty()) {
            Some(k) => alerts.into_iter().filter(|a| a.keyword == k).collect(),
            None => alerts.into_iter().take(DEFAULT_ALERT_LIMIT).collect(),
        })
    }
}

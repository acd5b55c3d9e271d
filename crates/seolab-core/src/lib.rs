use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("llm failed: {0}")]
    Llm(String),
    /// A provider, API key or model is missing. Never retried.
    #[error("{0} is not configured")]
    NotConfigured(String),
    /// DNS/TLS/timeout/connection failure. Carries a generic message only.
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid input: {0}")]
    Validation(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (value * f).round() / f
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            max_results: Some(max_results),
            timeout_ms: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// One organic result row. `position` is the 1-based rank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub position: usize,
}

impl SearchResult {
    pub fn new(url: impl Into<String>, title: impl Into<String>, position: usize) -> Result<Self> {
        let url = url.into();
        let parsed = url::Url::parse(&url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!("{url}: not http(s)")));
        }
        if position == 0 {
            return Err(Error::Validation("search position is 1-based".to_string()));
        }
        Ok(Self {
            url,
            title: title.into(),
            position,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
    pub timings_ms: BTreeMap<String, u128>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

/// Raw response of a single page fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
}

impl FetchedPage {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }
}

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

impl Heading {
    pub fn new(level: u8, text: impl Into<String>) -> Result<Self> {
        if !(1..=6).contains(&level) {
            return Err(Error::Validation(format!("heading level {level} not in 1..=6")));
        }
        Ok(Self {
            level,
            text: text.into(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchedDocument {
    pub url: String,
    pub title: String,
    pub headings: Vec<Heading>,
    pub text: String,
    pub word_count: usize,
    pub position: usize,
}

fn coverage_ratio(doc_frequency: usize, total_documents: usize) -> Result<f64> {
    if total_documents == 0 {
        return Err(Error::Validation("total_documents must be > 0".to_string()));
    }
    if doc_frequency > total_documents {
        return Err(Error::Validation(format!(
            "doc_frequency {doc_frequency} exceeds total_documents {total_documents}"
        )));
    }
    Ok(doc_frequency as f64 / total_documents as f64)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordScore {
    pub word: String,
    pub frequency: usize,
    pub doc_frequency: usize,
    /// Percent of documents containing the word, one decimal.
    pub coverage: f64,
    pub score: f64,
}

impl KeywordScore {
    /// Coverage-banded score: words in 30-95% of documents are boosted,
    /// near-universal words are halved, rare words are scaled by coverage.
    pub fn new(
        word: impl Into<String>,
        frequency: usize,
        doc_frequency: usize,
        total_documents: usize,
    ) -> Result<Self> {
        let c = coverage_ratio(doc_frequency, total_documents)?;
        let tf = frequency as f64;
        let score = if (0.3..=0.95).contains(&c) {
            tf * (1.0 + c)
        } else if c > 0.95 {
            tf * 0.5
        } else {
            tf * c
        };
        Ok(Self {
            word: word.into(),
            frequency,
            doc_frequency,
            coverage: round_to(c * 100.0, 1),
            score: round_to(score, 2),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhraseScore {
    pub phrase: String,
    pub frequency: usize,
    pub doc_frequency: usize,
    pub coverage: f64,
    pub score: f64,
}

impl PhraseScore {
    pub const MIN_FREQUENCY: usize = 3;
    pub const MIN_COVERAGE: f64 = 0.2;

    /// Returns `None` when the phrase is too rare to retain.
    pub fn new(
        phrase: impl Into<String>,
        frequency: usize,
        doc_frequency: usize,
        total_documents: usize,
    ) -> Option<Self> {
        let c = coverage_ratio(doc_frequency, total_documents).ok()?;
        if frequency < Self::MIN_FREQUENCY || c < Self::MIN_COVERAGE {
            return None;
        }
        Some(Self {
            phrase: phrase.into(),
            frequency,
            doc_frequency,
            coverage: round_to(c * 100.0, 1),
            score: round_to(frequency as f64 * (1.0 + c), 2),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeadingAggregate {
    pub text: String,
    pub level: u8,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WordCountAnalysis {
    pub min: usize,
    pub max: usize,
    pub avg: usize,
    pub median: usize,
    pub recommended: usize,
    pub top3_avg: usize,
}

impl Default for WordCountAnalysis {
    fn default() -> Self {
        Self {
            min: 1000,
            max: 2000,
            avg: 1500,
            median: 1500,
            recommended: 1500,
            top3_avg: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WordCountTargets {
    pub minimum: usize,
    pub recommended: usize,
    pub optimal: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordTiers {
    pub must_use: Vec<String>,
    pub should_use: Vec<String>,
    pub nice_to_have: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BriefStructure {
    pub h2_count: usize,
    pub paragraphs: usize,
    pub images: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentBrief {
    pub keyword: String,
    pub word_count: WordCountTargets,
    pub keywords: KeywordTiers,
    pub phrases: Vec<String>,
    pub recommended_headings: Vec<String>,
    pub structure: BriefStructure,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyzedPage {
    pub url: String,
    pub title: String,
    pub word_count: usize,
    pub headings_count: usize,
    pub position: usize,
}

impl From<&FetchedDocument> for AnalyzedPage {
    fn from(d: &FetchedDocument) -> Self {
        Self {
            url: d.url.clone(),
            title: d.title.clone(),
            word_count: d.word_count,
            headings_count: d.headings.len(),
            position: d.position,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Error,
}

/// Top-level persisted record of one research run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchRun {
    pub keyword: String,
    pub status: RunStatus,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub serp_results: Vec<SearchResult>,
    #[serde(default)]
    pub analyzed_pages: Vec<AnalyzedPage>,
    #[serde(default)]
    pub pages_analyzed: usize,
    #[serde(default)]
    pub keywords: Vec<KeywordScore>,
    #[serde(default)]
    pub phrases_2gram: Vec<PhraseScore>,
    #[serde(default)]
    pub phrases_3gram: Vec<PhraseScore>,
    #[serde(default)]
    pub headings: Vec<HeadingAggregate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count_analysis: Option<WordCountAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief: Option<ContentBrief>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ResearchRun {
    pub fn new(keyword: &str, started_at: impl Into<String>) -> Result<Self> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(Error::Validation("keyword is empty".to_string()));
        }
        Ok(Self {
            keyword: keyword.to_string(),
            status: RunStatus::Running,
            started_at: started_at.into(),
            completed_at: None,
            serp_results: Vec::new(),
            analyzed_pages: Vec::new(),
            pages_analyzed: 0,
            keywords: Vec::new(),
            phrases_2gram: Vec::new(),
            phrases_3gram: Vec::new(),
            headings: Vec::new(),
            word_count_analysis: None,
            brief: None,
            errors: Vec::new(),
        })
    }

    pub fn summary(&self) -> ResearchSummary {
        ResearchSummary {
            keyword: self.keyword.clone(),
            status: self.status,
            pages_analyzed: self.pages_analyzed,
            keywords_found: self.keywords.len(),
            completed_at: self.completed_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResearchSummary {
    pub keyword: String,
    pub status: RunStatus,
    pub pages_analyzed: usize,
    pub keywords_found: usize,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub system: String,
    pub user: String,
    /// Overrides the provider's configured text model.
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub timeout_ms: Option<u64>,
    pub use_cache: bool,
}

impl GenerateRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            model: None,
            max_tokens: None,
            temperature: None,
            timeout_ms: None,
            use_cache: true,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    pub provider: String,
    pub cached: bool,
}

#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &'static str;
    async fn generate(&self, req: &GenerateRequest) -> Result<Generated>;
}

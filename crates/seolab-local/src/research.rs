//! Keyword research pipeline: search, fetch each result, score, brief, persist.

use crate::brief::{build_brief, word_count_analysis};
use crate::headings::aggregate_headings;
use crate::keywords::extract_keywords;
use crate::ngrams::extract_ngrams;
use crate::store::{now_timestamp, ResearchStore};
use seolab_core::{
    AnalyzedPage, Error, FetchedDocument, PageFetcher, ResearchRun, Result, RunStatus,
    SearchProvider, SearchQuery, SearchResult,
};

pub const DEFAULT_LIMIT: usize = 15;

/// A result page that could not be fetched; the run continues without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub url: String,
    pub error: String,
}

impl FetchFailure {
    pub fn message(&self) -> String {
        format!("Failed to fetch: {}", self.url)
    }
}

/// Run every scoring stage over `docs` and fill the analysis fields of `run`.
pub fn analyze(run: &mut ResearchRun, docs: &[FetchedDocument]) {
    run.analyzed_pages = docs.iter().map(AnalyzedPage::from).collect();
    run.pages_analyzed = docs.len();
    run.keywords = extract_keywords(docs);
    run.phrases_2gram = extract_ngrams(docs, 2);
    run.phrases_3gram = extract_ngrams(docs, 3);
    run.headings = aggregate_headings(docs);
    let wc = word_count_analysis(docs);
    run.brief = Some(build_brief(
        &run.keyword,
        &run.keywords,
        &run.phrases_2gram,
        &run.headings,
        &wc,
    ));
    run.word_count_analysis = Some(wc);
    tracing::info!(
        keyword = %run.keyword,
        documents = docs.len(),
        keywords = run.keywords.len(),
        phrases_2 = run.phrases_2gram.len(),
        phrases_3 = run.phrases_3gram.len(),
        headings = run.headings.len(),
        "analysis complete"
    );
}

pub struct Researcher {
    search: Box<dyn SearchProvider>,
    fetcher: Box<dyn PageFetcher>,
    store: ResearchStore,
}

impl Researcher {
    pub fn new(
        search: Box<dyn SearchProvider>,
        fetcher: Box<dyn PageFetcher>,
        store: ResearchStore,
    ) -> Self {
        Self {
            search,
            fetcher,
            store,
        }
    }

    pub fn store(&self) -> &ResearchStore {
        &self.store
    }

    /// Fetch results one at a time, in rank order.
    pub async fn fetch_documents(
        &self,
        results: &[SearchResult],
    ) -> (Vec<FetchedDocument>, Vec<FetchFailure>) {
        let mut docs = Vec::new();
        let mut failures = Vec::new();
        for r in results {
            match crate::fetch_content(self.fetcher.as_ref(), &r.url, r.position).await {
                Ok(doc) => docs.push(doc),
                Err(e) => {
                    tracing::warn!(url = %r.url, error = %e, "skipping result page");
                    failures.push(FetchFailure {
                        url: r.url.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        (docs, failures)
    }

    /// Research `keyword` across the top `limit` results.
    ///
    /// Only an invalid keyword is an `Err`. Search and fetch problems are
    /// reported on the returned run, whose status is `error` when nothing
    /// could be analyzed. Completed runs are saved to the store.
    pub async fn run(&self, keyword: &str, limit: usize) -> Result<ResearchRun> {
        let mut run = ResearchRun::new(keyword, now_timestamp())?;
        tracing::info!(keyword = %run.keyword, limit, "research started");

        let query = SearchQuery::new(run.keyword.clone(), limit);
        match self.search.search(&query).await {
            Ok(resp) => run.serp_results = resp.results,
            Err(e) => {
                run.status = RunStatus::Error;
                run.errors.push(match e {
                    Error::Search(msg) => msg,
                    other => other.to_string(),
                });
                return Ok(run);
            }
        }

        let (docs, failures) = self.fetch_documents(&run.serp_results).await;
        run.errors.extend(failures.iter().map(FetchFailure::message));
        if docs.is_empty() {
            run.status = RunStatus::Error;
            run.errors.push("No pages could be analyzed".to_string());
            tracing::warn!(keyword = %run.keyword, "no pages could be analyzed");
            return Ok(run);
        }

        analyze(&mut run, &docs);
        run.status = RunStatus::Completed;
        run.completed_at = Some(now_timestamp());

        if let Err(e) = self.store.save(&run) {
            tracing::warn!(keyword = %run.keyword, error = %e, "failed to persist research run");
            run.errors.push(e.to_string());
        }
        Ok(run)
    }
}

use seolab_core::{Error, Result, SearchProvider, SearchQuery, SearchResponse, SearchResult};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

pub const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
pub const DEFAULT_LIMIT: usize = 20;

fn timeout_from_query(q: &SearchQuery) -> Duration {
    q.timeout().unwrap_or(Duration::from_secs(20))
}

/// Scrapes the no-JS HTML results page of a DuckDuckGo-style engine.
#[derive(Debug, Clone)]
pub struct HtmlSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl HtmlSearch {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::BROWSER_USER_AGENT)
            .default_headers(crate::browser_headers())
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::Search(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Uses `SEOLAB_SEARCH_ENDPOINT` when set.
    pub fn from_env() -> Result<Self> {
        Self::new(
            crate::env("SEOLAB_SEARCH_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Unwrap a `/l/?uddg=<target>` redirect link; other hrefs are returned as-is.
fn resolve_result_href(href: &str) -> Option<String> {
    if !href.contains("uddg") {
        return Some(href.to_string());
    }
    let base = url::Url::parse("https://duckduckgo.com/").ok()?;
    let u = base.join(href).ok()?;
    u.query_pairs()
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.into_owned())
}

fn is_engine_url(u: &url::Url) -> bool {
    u.host_str()
        .is_some_and(|h| h == "duckduckgo.com" || h.ends_with(".duckduckgo.com"))
}

/// Organic results in page order, deduplicated by url, at most `limit`.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchResult> {
    let doc = html_scraper::Html::parse_document(html);
    let Ok(sel) = html_scraper::Selector::parse("a.result__a") else {
        return Vec::new();
    };
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for a in doc.select(&sel) {
        if out.len() >= limit {
            break;
        }
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let Some(target) = resolve_result_href(href) else {
            continue;
        };
        let Ok(parsed) = url::Url::parse(&target) else {
            continue;
        };
        if !matches!(parsed.scheme(), "http" | "https") || is_engine_url(&parsed) {
            continue;
        }
        if !seen.insert(target.clone()) {
            continue;
        }
        let title = crate::extract::collapse_whitespace(&a.text().collect::<String>());
        if let Ok(r) = SearchResult::new(target, title, out.len() + 1) {
            out.push(r);
        }
    }
    out
}

#[async_trait::async_trait]
impl SearchProvider for HtmlSearch {
    fn name(&self) -> &'static str {
        "html"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let limit = q.max_results.unwrap_or(DEFAULT_LIMIT);
        tracing::debug!(query = %q.query, endpoint = %self.endpoint, "searching");

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", q.query.as_str())])
            .timeout(timeout_from_query(q))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "search request failed");
                Error::Search("Failed to fetch search results".to_string())
            })?;
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "search returned non-success status");
            return Err(Error::Search("Failed to fetch search results".to_string()));
        }
        let body = resp.text().await.map_err(|e| {
            tracing::warn!(error = %e, "search body read failed");
            Error::Search("Failed to fetch search results".to_string())
        })?;

        let results = parse_results(&body, limit);
        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
        tracing::info!(query = %q.query, results = results.len(), "search complete");

        Ok(SearchResponse {
            results,
            provider: self.name().to_string(),
            timings_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, routing::get, Router};
    use std::collections::HashMap;
    use std::sync::Mutex;

    // Env vars are process-global; serialize tests that mutate them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const RESULTS_PAGE: &str = r#"<html><body>
<div class="result"><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fa.example%2Fguide%3Fx%3D1&amp;rut=abc">A &amp; Guide</a></div>
<div class="result"><a class="result__a" href="https://duckduckgo.com/y.js?ad=1">Sponsored</a></div>
<div class="result"><a class="result__a" href="https://b.example/post">  B   Post </a></div>
<div class="result"><a class="result__a" href="https://b.example/post">B Post again</a></div>
<div class="result"><a class="result__a" href="ftp://c.example/file">FTP</a></div>
<div class="result"><a class="result__a" href="http://d.example/">D</a></div>
<a class="other" href="https://e.example/">not a result</a>
</body></html>"#;

    #[test]
    fn parses_unwraps_and_dedups() {
        let rs = parse_results(RESULTS_PAGE, 20);
        let urls: Vec<&str> = rs.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://a.example/guide?x=1", "https://b.example/post", "http://d.example/"]
        );
        assert_eq!(rs[0].title, "A & Guide");
        assert_eq!(rs[1].title, "B Post");
        let positions: Vec<usize> = rs.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn stops_at_limit() {
        assert_eq!(parse_results(RESULTS_PAGE, 2).len(), 2);
        assert!(parse_results(RESULTS_PAGE, 0).is_empty());
    }

    #[tokio::test]
    async fn searches_mock_endpoint() {
        let app = Router::new().route(
            "/html/",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("q").map(String::as_str), Some("dns records"));
                RESULTS_PAGE
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let s = HtmlSearch::new(format!("http://{addr}/html/")).unwrap();
        let resp = s.search(&SearchQuery::new("dns records", 15)).await.unwrap();
        assert_eq!(resp.provider, "html");
        assert_eq!(resp.results.len(), 3);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_search_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let s = HtmlSearch::new(format!("http://{addr}/html/")).unwrap();
        match s.search(&SearchQuery::new("dns", 5)).await {
            Err(Error::Search(msg)) => assert_eq!(msg, "Failed to fetch search results"),
            other => panic!("expected search error, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_env_override() {
        let _g = ENV_LOCK.lock().unwrap();
        std::env::set_var("SEOLAB_SEARCH_ENDPOINT", "  http://127.0.0.1:9/html/ ");
        assert_eq!(HtmlSearch::from_env().unwrap().endpoint(), "http://127.0.0.1:9/html/");
        std::env::set_var("SEOLAB_SEARCH_ENDPOINT", "   ");
        assert_eq!(HtmlSearch::from_env().unwrap().endpoint(), DEFAULT_ENDPOINT);
        std::env::remove_var("SEOLAB_SEARCH_ENDPOINT");
    }
}

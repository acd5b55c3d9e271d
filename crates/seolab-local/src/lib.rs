use seolab_core::{Error, FetchedDocument, FetchedPage, PageFetcher, Result};
use std::time::Duration;

pub mod brief;
pub mod cache;
pub mod compare;
pub mod competitors;
pub mod config;
pub mod extract;
pub mod headings;
pub mod hf;
pub mod keywords;
pub mod linking;
pub mod links;
pub mod llm;
pub mod n8n;
pub mod ngrams;
pub mod openai_compat;
pub mod research;
pub mod search;
pub mod store;
pub mod textprep;
pub mod throttle;

/// Desktop browser identity; several result hosts serve bot UAs an empty page.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Trimmed env var; empty counts as unset.
pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn browser_headers() -> reqwest::header::HeaderMap {
    use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
    let mut h = HeaderMap::new();
    h.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml"),
    );
    h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    h
}

/// Host part of `url` for error messages, or the raw string when unparsable.
pub(crate) fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

/// Map a reqwest send/read failure to the generic transport error, logging the detail.
pub(crate) fn transport_error(target: &str, e: &reqwest::Error) -> Error {
    tracing::warn!(target = %target, error = %e, "transport failure");
    Error::Transport(format!("unable to reach {target}"))
}

/// `error.message`, a string `error`, or `message` from a JSON error body.
pub(crate) fn error_message(body: &serde_json::Value) -> Option<String> {
    let msg = match body.get("error") {
        Some(serde_json::Value::String(s)) => Some(s.as_str()),
        Some(e) => e.get("message").and_then(|m| m.as_str()),
        None => body.get("message").and_then(|m| m.as_str()),
    };
    msg.map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Non-2xx response: the body's error message when present.
pub(crate) fn upstream_error(service: &str, status: u16, body: &[u8]) -> Error {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .as_ref()
        .and_then(error_message)
        .unwrap_or_else(|| format!("request failed with status {status}"));
    tracing::warn!(service, status, message = %message, "upstream error");
    Error::Upstream { status, message }
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_redirects: usize,
    pub max_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 3,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Plain GET fetcher for competitor pages. Certificate verification is off.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(cfg: FetcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(browser_headers())
            .redirect(reqwest::redirect::Policy::limited(cfg.max_redirects))
            .danger_accept_invalid_certs(true)
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            max_bytes: cfg.max_bytes,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(FetcherConfig::default())
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        let host = host_of(url);
        tracing::debug!(url = %url, "fetching page");

        let resp = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| transport_error(&host, &e))?;
        let final_url = resp.url().to_string();
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            tracing::warn!(url = %url, status, "non-success status");
            return Err(Error::Upstream {
                status,
                message: format!("request failed with status {status}"),
            });
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut truncated = false;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| transport_error(&host, &e))?;
            if bytes.len().saturating_add(chunk.len()) > self.max_bytes {
                let can_take = self.max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status,
            content_type,
            bytes,
            truncated,
        })
    }
}

/// Fetch `url` and turn it into an analyzable document at SERP `position`.
pub async fn fetch_content(
    fetcher: &dyn PageFetcher,
    url: &str,
    position: usize,
) -> Result<FetchedDocument> {
    let page = fetcher.fetch(url).await?;
    Ok(extract::parse_page(&page.text_lossy()).into_document(url, position))
}

use serde::{Deserialize, Serialize};

/// Raw `href` (trimmed, unresolved) with its whitespace-collapsed anchor text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    pub href: String,
    pub text: String,
}

/// Every `<a href>` in document order. Empty hrefs are dropped.
pub fn anchors_in(doc: &html_scraper::Html) -> Vec<LinkCandidate> {
    let sel = match html_scraper::Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let mut out = Vec::new();
    for el in doc.select(&sel) {
        let href = match el.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };
        if href.is_empty() {
            continue;
        }
        let text = el
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        out.push(LinkCandidate {
            href: href.to_string(),
            text,
        });
    }
    out
}

pub fn anchors(html: &str) -> Vec<LinkCandidate> {
    anchors_in(&html_scraper::Html::parse_fragment(html))
}

/// False for in-page fragments and `javascript:` / `mailto:` pseudo-links.
pub fn is_navigable(href: &str) -> bool {
    let lc = href.to_ascii_lowercase();
    !(href.starts_with('#') || lc.starts_with("javascript:") || lc.starts_with("mailto:"))
}

/// Root-relative (`/x`, not `//host/x`) or under the site's absolute `base`.
pub fn is_site_internal(href: &str, base: &str) -> bool {
    (href.starts_with('/') && !href.starts_with("//"))
        || (!base.is_empty() && href.starts_with(base))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLink {
    pub href: String,
    pub anchor_text: String,
    pub is_internal: bool,
}

/// Navigable links of a content fragment, tagged internal relative to `base`.
pub fn site_links(html: &str, base: &str) -> Vec<SiteLink> {
    anchors(html)
        .into_iter()
        .filter(|c| is_navigable(&c.href))
        .map(|c| SiteLink {
            is_internal: is_site_internal(&c.href, base),
            href: c.href,
            anchor_text: c.text,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkCounts {
    pub internal: usize,
    pub external: usize,
}

/// Split a page's links into internal and external.
///
/// Absolute `http(s)` links are internal when their host contains the page's
/// host; with no page url every absolute link counts as external. Anything
/// else (relative paths, fragments) counts as internal.
pub fn count_page_links(doc: &html_scraper::Html, page_url: Option<&str>) -> LinkCounts {
    let page_host = page_url
        .and_then(|u| url::Url::parse(u).ok())
        .and_then(|u| u.host_str().map(|h| h.to_string()));
    let mut counts = LinkCounts::default();
    for c in anchors_in(doc) {
        if !c.href.starts_with("http") {
            counts.internal += 1;
            continue;
        }
        let link_host = url::Url::parse(&c.href)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()));
        match (&page_host, link_host) {
            (Some(page), Some(link)) if link.contains(page.as_str()) => counts.internal += 1,
            _ => counts.external += 1,
        }
    }
    counts
}

//! HTML to title/headings/plain-text extraction for fetched pages.

use crate::headings::{clean_heading, is_valid_heading};
use seolab_core::{FetchedDocument, Heading};

/// Elements whose text never counts as page content.
const STRIPPED_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "aside"];

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    pub title: String,
    pub headings: Vec<Heading>,
    pub text: String,
    pub word_count: usize,
}

impl ParsedPage {
    pub fn into_document(self, url: &str, position: usize) -> FetchedDocument {
        FetchedDocument {
            url: url.to_string(),
            title: self.title,
            headings: self.headings,
            text: self.text,
            word_count: self.word_count,
            position,
        }
    }
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Count words the way a plain-text word counter does: a word starts with an
/// ASCII letter and may continue through letters, apostrophes and hyphens.
pub fn word_count(text: &str) -> usize {
    let mut count = 0usize;
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_ascii_alphabetic() {
            if !in_word {
                count += 1;
                in_word = true;
            }
        } else if in_word && (ch == '\'' || ch == '-') {
            continue;
        } else {
            in_word = false;
        }
    }
    count
}

pub fn page_title(doc: &html_scraper::Html) -> String {
    let Ok(sel) = html_scraper::Selector::parse("title") else {
        return String::new();
    };
    doc.select(&sel)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default()
}

/// All `h1`..`h6` in document order, whitespace-collapsed, empty ones dropped.
pub fn raw_headings(doc: &html_scraper::Html) -> Vec<Heading> {
    let Ok(sel) = html_scraper::Selector::parse("h1, h2, h3, h4, h5, h6") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for el in doc.select(&sel) {
        let level = el
            .value()
            .name()
            .strip_prefix('h')
            .and_then(|n| n.parse::<u8>().ok())
            .unwrap_or(0);
        let text = collapse_whitespace(&el.text().collect::<String>());
        if text.is_empty() {
            continue;
        }
        if let Ok(h) = Heading::new(level, text) {
            out.push(h);
        }
    }
    out
}

fn collect_text(el: html_scraper::ElementRef<'_>, skip: &[&str], out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = html_scraper::ElementRef::wrap(child) {
            if !skip.contains(&child_el.value().name()) {
                collect_text(child_el, skip, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

/// Entity-decoded, whitespace-collapsed text of every element not named in `skip`.
pub fn text_excluding(doc: &html_scraper::Html, skip: &[&str]) -> String {
    let mut raw = String::new();
    collect_text(doc.root_element(), skip, &mut raw);
    collapse_whitespace(&raw)
}

/// Text outside script/style/nav/footer/header/aside.
pub fn visible_text(doc: &html_scraper::Html) -> String {
    text_excluding(doc, STRIPPED_TAGS)
}

pub fn parse_page(html: &str) -> ParsedPage {
    let doc = html_scraper::Html::parse_document(html);
    let title = page_title(&doc);

    let headings = raw_headings(&doc)
        .into_iter()
        .filter(|h| h.text.len() > 2 && is_valid_heading(&h.text))
        .filter_map(|h| {
            let cleaned = clean_heading(&h.text);
            (cleaned.len() >= 5).then(|| Heading {
                level: h.level,
                text: cleaned,
            })
        })
        .collect();

    let text = visible_text(&doc);
    let word_count = word_count(&text);
    ParsedPage {
        title,
        headings,
        text,
        word_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html><head><title> DNS Guide &amp; Tips </title>
<style>.x { color: red }</style><script>var words = "not counted";</script></head>
<body>
  <header><h2>Subscribe to our newsletter</h2> Site header text</header>
  <nav>Home About Blog</nav>
  <main>
    <h1>How to Configure DNS Records</h1>
    <p>Domain records map names to addresses.</p>
    <h2>Step 3: Configure the Router (optional)</h2>
    <p>It's a well-known first step.</p>
    <h3>Leave a Reply</h3>
  </main>
  <aside>Sidebar widget text</aside>
  <footer>Copyright notice</footer>
</body></html>"#;

    #[test]
    fn parses_title_headings_and_visible_text() {
        let p = parse_page(PAGE);
        assert_eq!(p.title, "DNS Guide & Tips");

        let hs: Vec<(u8, &str)> = p.headings.iter().map(|h| (h.level, h.text.as_str())).collect();
        assert_eq!(
            hs,
            vec![(1, "How to Configure DNS Records"), (2, "Configure the Router")]
        );

        assert!(p.text.contains("Domain records map names to addresses."));
        assert!(!p.text.contains("not counted"));
        assert!(!p.text.contains("Sidebar"));
        assert!(!p.text.contains("Copyright"));
        assert!(!p.text.contains("Site header text"));
        assert!(!p.text.contains("color"));
    }

    #[test]
    fn word_count_treats_apostrophes_and_hyphens_as_inner_characters() {
        assert_eq!(word_count("It's a well-known first step."), 5);
        assert_eq!(word_count("route 66 - the road"), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn into_document_carries_position() {
        let d = parse_page(PAGE).into_document("https://a.example/", 4);
        assert_eq!(d.position, 4);
        assert_eq!(d.url, "https://a.example/");
        assert_eq!(d.headings.len(), 2);
    }
}

//! Post-processing for generated text and sequential batch generation.

use crate::throttle::Throttle;
use regex::Regex;
use seolab_core::{Error, GenerateRequest, Generated, Result, TextGenerator};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Upper bound on returned text, in characters.
pub const MAX_GENERATED_CHARS: usize = 8000;

static THINK_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").ok());
static BLANK_RUN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n{3,}").ok());

/// Drop reasoning blocks, collapse runs of blank lines, clamp the length.
pub fn clean_generated_text(raw: &str) -> String {
    let text = match THINK_BLOCK.as_ref() {
        Some(re) => re.replace_all(raw, ""),
        None => Cow::Borrowed(raw),
    };
    let text = match BLANK_RUN.as_ref() {
        Some(re) => re.replace_all(text.trim(), "\n\n"),
        None => Cow::Borrowed(text.trim()),
    };
    let text = text.trim();
    match text.char_indices().nth(MAX_GENERATED_CHARS) {
        Some((cut, _)) => text[..cut].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Remove a surrounding Markdown code fence (with or without a language tag).
pub fn strip_code_fences(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a model reply that is supposed to be JSON.
///
/// Code fences and a leading `json:` label are tolerated; anything else that
/// fails to parse is a `Parse` error.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let body = strip_code_fences(reply);
    let body = match body.get(..5) {
        Some(p) if p.eq_ignore_ascii_case("json:") => body[5..].trim_start(),
        _ => body,
    };
    serde_json::from_str(body).map_err(|e| {
        tracing::warn!(error = %e, "model reply is not valid json");
        Error::Parse(format!("model reply is not valid JSON: {e}"))
    })
}

/// Run `requests` one at a time, waiting on `throttle` before each call.
pub async fn generate_batch(
    generator: &dyn TextGenerator,
    requests: &[GenerateRequest],
    throttle: &Throttle,
) -> Vec<Result<Generated>> {
    let mut out = Vec::with_capacity(requests.len());
    for (i, req) in requests.iter().enumerate() {
        throttle.acquire().await;
        let res = generator.generate(req).await;
        if let Err(e) = &res {
            tracing::warn!(index = i, provider = generator.name(), error = %e, "batch item failed");
        }
        out.push(res);
    }
    tracing::info!(
        provider = generator.name(),
        total = out.len(),
        failed = out.iter().filter(|r| r.is_err()).count(),
        "batch generation finished"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn cleans_think_blocks_and_blank_lines() {
        let raw = "<think>plan\nthe answer</think>\n\nTitle\n\n\n\n\nBody  ";
        assert_eq!(clean_generated_text(raw), "Title\n\nBody");
    }

    #[test]
    fn clamps_on_char_boundary() {
        let raw = "é".repeat(MAX_GENERATED_CHARS + 50);
        let out = clean_generated_text(&raw);
        assert_eq!(out.chars().count(), MAX_GENERATED_CHARS);
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1]\n```  "), "[1]");
        assert_eq!(strip_code_fences("  plain "), "plain");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Titles {
        titles: Vec<String>,
    }

    #[test]
    fn parses_labelled_and_fenced_json() {
        let t: Titles = parse_json_reply("JSON: {\"titles\":[\"a\"]}").unwrap();
        assert_eq!(t.titles, vec!["a"]);
        let t: Titles = parse_json_reply("```json\n{\"titles\":[\"b\"]}\n```").unwrap();
        assert_eq!(t.titles, vec!["b"]);
    }

    #[test]
    fn prose_reply_is_parse_error() {
        let r: Result<Titles> = parse_json_reply("Sure! Here are some titles.");
        assert!(matches!(r, Err(Error::Parse(_))));
    }

    struct Scripted {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl TextGenerator for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn generate(&self, req: &GenerateRequest) -> Result<Generated> {
            self.calls.lock().unwrap().push(req.user.clone());
            if req.user == "fail" {
                return Err(Error::Llm("boom".to_string()));
            }
            Ok(Generated {
                text: req.user.to_uppercase(),
                provider: self.name().to_string(),
                cached: false,
            })
        }
    }

    #[tokio::test]
    async fn batch_keeps_order_and_per_item_errors() {
        let generator = Scripted {
            calls: Mutex::new(Vec::new()),
        };
        let reqs: Vec<_> = ["a", "fail", "c"]
            .iter()
            .map(|u| GenerateRequest::new("sys", *u))
            .collect();
        let out = generate_batch(&generator, &reqs, &Throttle::new(1, Duration::ZERO)).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_ref().unwrap().text, "A");
        assert!(out[1].is_err());
        assert_eq!(out[2].as_ref().unwrap().text, "C");
        assert_eq!(*generator.calls.lock().unwrap(), vec!["a", "fail", "c"]);
    }
}

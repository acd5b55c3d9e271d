//! Hugging Face router client with the on-disk response cache in front.

use crate::cache::{CachedResponse, ResponseCache};
use crate::config::AiSettings;
use crate::llm::clean_generated_text;
use crate::openai_compat::{Message, DEFAULT_MAX_TOKENS};
use crate::{env, error_message, transport_error, upstream_error};
use seolab_core::{Error, GenerateRequest, Generated, Result, TextGenerator};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_HF_BASE_URL: &str = "https://router.huggingface.co";
pub const DEFAULT_HF_TIMEOUT_S: u64 = 30;

const PROVIDER: &str = "huggingface";

#[derive(Debug, Serialize)]
struct RouterRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

/// Generated text from any of the router's response shapes.
fn extract_text(body: &Value) -> Option<&str> {
    body.pointer("/choices/0/message/content")
        .or_else(|| body.pointer("/0/generated_text"))
        .or_else(|| body.get("generated_text"))
        .and_then(Value::as_str)
}

#[derive(Debug, Clone)]
pub struct HfRouterClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    cache: ResponseCache,
}

impl HfRouterClient {
    pub fn from_settings(settings: &AiSettings, cache: ResponseCache) -> Result<Self> {
        let p = settings
            .provider(PROVIDER)
            .filter(|p| p.enabled)
            .ok_or_else(|| Error::NotConfigured("Hugging Face".to_string()))?;
        let api_key = p
            .api_key()
            .ok_or_else(|| Error::NotConfigured("Hugging Face API key".to_string()))?
            .to_string();
        let model = p
            .text_model()
            .ok_or_else(|| Error::NotConfigured("Hugging Face model".to_string()))?;
        let timeout_s = settings
            .generation_defaults
            .timeout
            .unwrap_or(DEFAULT_HF_TIMEOUT_S)
            .max(1);
        let client = reqwest::Client::builder()
            .user_agent(concat!("seolab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Llm(e.to_string()))?;
        Ok(Self {
            client,
            base_url: env("SEOLAB_HF_BASE_URL").unwrap_or_else(|| DEFAULT_HF_BASE_URL.to_string()),
            api_key,
            model,
            timeout: Duration::from_secs(timeout_s),
            cache,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn prompt(req: &GenerateRequest) -> String {
        let system = req.system.trim();
        let user = req.user.trim();
        if system.is_empty() {
            user.to_string()
        } else {
            format!("{system}\n\n{user}")
        }
    }

    async fn call(&self, model: &str, prompt: &str, req: &GenerateRequest) -> Result<String> {
        let body = RouterRequest {
            model,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: req.temperature,
        };
        let endpoint = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        tracing::debug!(model, "hugging face request");
        let resp = self
            .client
            .post(&endpoint)
            .timeout(req.timeout().unwrap_or(self.timeout))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Hugging Face", &e))?;
        let status = resp.status().as_u16();
        let ok = resp.status().is_success();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| transport_error("Hugging Face", &e))?;
        if !ok {
            return Err(upstream_error(PROVIDER, status, &bytes));
        }
        let parsed: Value = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Parse(format!("Hugging Face response: {e}")))?;
        if let Some(text) = extract_text(&parsed) {
            return Ok(text.to_string());
        }
        if let Some(message) = error_message(&parsed) {
            tracing::warn!(status, message = %message, "hugging face returned an error body");
            return Err(Error::Upstream { status, message });
        }
        Ok(String::new())
    }
}

#[async_trait::async_trait]
impl TextGenerator for HfRouterClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<Generated> {
        let prompt = Self::prompt(req);
        if prompt.is_empty() {
            return Err(Error::Validation("prompt is empty".to_string()));
        }
        let model = req.model.as_deref().unwrap_or(&self.model);
        let options = json!({
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
        });
        let key = ResponseCache::key(&prompt, &options, model);

        if req.use_cache {
            match self.cache.get(&key) {
                Ok(Some(hit)) => {
                    tracing::debug!(key = %key, "response cache hit");
                    return Ok(Generated {
                        text: hit.text,
                        provider: PROVIDER.to_string(),
                        cached: true,
                    });
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "response cache read failed"),
            }
        }

        let text = clean_generated_text(&self.call(model, &prompt, req).await?);
        if text.is_empty() {
            return Err(Error::Llm("No text generated by the model.".to_string()));
        }
        if req.use_cache {
            if let Err(e) = self.cache.set(&key, &CachedResponse { text: text.clone() }) {
                tracing::warn!(error = %e, "response cache write failed");
            }
        }
        Ok(Generated {
            text,
            provider: PROVIDER.to_string(),
            cached: false,
        })
    }
}

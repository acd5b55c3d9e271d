use crate::config::AiSettings;
use crate::{env, transport_error, upstream_error};
use seolab_core::{Error, GenerateRequest, Generated, Result, TextGenerator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

fn openai_base_url_from_env() -> Option<String> {
    env("SEOLAB_OPENAI_BASE_URL")
}

/// Chat-completions endpoint for a base url, with or without a trailing `/v1`.
fn chat_completions_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

/// Any OpenAI-compatible chat-completions API (OpenAI, DeepSeek, a local gateway).
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    provider: String,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiCompatClient {
    /// Build from the named provider entry of `settings`.
    ///
    /// For `openai` the base url comes from `SEOLAB_OPENAI_BASE_URL`, then the
    /// provider's `base_url`, then the public endpoint.
    pub fn from_settings(settings: &AiSettings, provider: &str) -> Result<Self> {
        let p = settings
            .provider(provider)
            .filter(|p| p.enabled)
            .ok_or_else(|| Error::NotConfigured(provider.to_string()))?;
        let api_key = p
            .api_key()
            .ok_or_else(|| Error::NotConfigured(format!("{provider} api key")))?
            .to_string();
        let model = p
            .text_model()
            .ok_or_else(|| Error::NotConfigured(format!("{provider} model")))?;

        let configured = p
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        let base_url = if provider == "openai" {
            openai_base_url_from_env().or(configured)
        } else {
            configured
        }
        .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        let timeout = settings
            .generation_defaults
            .timeout
            .map(|s| Duration::from_secs(s.max(1)))
            .unwrap_or(DEFAULT_TIMEOUT);
        let client = reqwest::Client::builder()
            .user_agent(concat!("seolab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Llm(e.to_string()))?;

        Ok(Self {
            client,
            provider: provider.to_string(),
            base_url,
            api_key,
            model,
            timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat(&self, req: &GenerateRequest) -> Result<String> {
        let model = req.model.clone().unwrap_or_else(|| self.model.clone());
        let mut messages = Vec::with_capacity(2);
        if !req.system.trim().is_empty() {
            messages.push(Message {
                role: "system".to_string(),
                content: req.system.clone(),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: req.user.clone(),
        });
        let body = ChatCompletionsRequest {
            model,
            messages,
            max_tokens: Some(req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            temperature: Some(req.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            top_p: None,
            stream: Some(false),
        };

        let endpoint = chat_completions_endpoint(&self.base_url);
        tracing::debug!(provider = %self.provider, model = %body.model, "chat completion request");
        let resp = self
            .client
            .post(&endpoint)
            .timeout(req.timeout().unwrap_or(self.timeout))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&self.provider, &e))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| transport_error(&self.provider, &e))?;
        if !status.is_success() {
            return Err(upstream_error(&self.provider, status.as_u16(), &bytes));
        }

        let parsed: ChatCompletionsResponse = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Parse(format!("{} response: {e}", self.provider)))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(Error::Llm("No content generated".to_string()));
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl TextGenerator for OpenAiCompatClient {
    fn name(&self) -> &'static str {
        "openai_compat"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<Generated> {
        let text = self.chat(req).await?;
        Ok(Generated {
            text,
            provider: self.provider.clone(),
            cached: false,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Message {
    pub(crate) role: String,
    pub(crate) content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

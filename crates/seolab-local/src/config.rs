//! `config/ai_settings.json` and `config/n8n_settings.json`.
//!
//! Missing or unreadable files load as defaults; saves merge with what is on
//! disk so a blank secret never erases a stored one.

use crate::store::{now_timestamp, read_json, write_json_atomic};
use seolab_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSet {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub vision: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    /// Legacy single-model field; `models.text` wins when set.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<ModelSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ProviderSettings {
    fn with_model(model: &str) -> Self {
        Self {
            default_model: model.to_string(),
            ..Self::default()
        }
    }

    /// Text model: `models.text`, else the legacy `default_model`.
    pub fn text_model(&self) -> Option<String> {
        self.models
            .as_ref()
            .map(|m| m.text.trim())
            .filter(|m| !m.is_empty())
            .or_else(|| Some(self.default_model.trim()).filter(|m| !m.is_empty()))
            .map(str::to_string)
    }

    pub fn api_key(&self) -> Option<&str> {
        Some(self.api_key.trim()).filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSettings {
    #[serde(default)]
    pub default_provider: String,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,
    #[serde(default)]
    pub generation_defaults: GenerationDefaults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for AiSettings {
    fn default() -> Self {
        let providers = [
            ("openai", "gpt-4o-mini"),
            ("anthropic", "claude-3-5-sonnet-20241022"),
            ("google", "gemini-1.5-flash"),
            ("deepseek", "deepseek-chat"),
            ("huggingface", "mistralai/Mistral-7B-Instruct-v0.3"),
            ("ollama", "llama2"),
        ]
        .into_iter()
        .map(|(name, model)| (name.to_string(), ProviderSettings::with_model(model)))
        .collect();
        Self {
            default_provider: "openai".to_string(),
            providers,
            generation_defaults: GenerationDefaults {
                temperature: Some(0.7),
                max_tokens: Some(2000),
                top_p: Some(1.0),
                timeout: None,
            },
            updated_at: None,
            extra: BTreeMap::new(),
        }
    }
}

impl AiSettings {
    pub fn provider(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers.get(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum N8nAuth {
    #[default]
    None,
    #[serde(rename = "apikey")]
    ApiKey,
    Basic,
}

impl N8nAuth {
    fn parse(s: &str) -> Self {
        match s {
            "apikey" => N8nAuth::ApiKey,
            "basic" => N8nAuth::Basic,
            _ => N8nAuth::None,
        }
    }
}

/// Unknown or non-string auth types load as `none`.
fn lenient_auth<'de, D>(d: D) -> std::result::Result<N8nAuth, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = Option::<serde_json::Value>::deserialize(d)?;
    Ok(v.as_ref()
        .and_then(serde_json::Value::as_str)
        .map(N8nAuth::parse)
        .unwrap_or_default())
}

pub const N8N_DEFAULT_TIMEOUT_S: u64 = 10;

fn default_n8n_timeout() -> u64 {
    N8N_DEFAULT_TIMEOUT_S
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct N8nSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    #[serde(default, deserialize_with = "lenient_auth")]
    pub auth_type: N8nAuth,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Seconds, 1..=60.
    #[serde(default = "default_n8n_timeout")]
    pub timeout: u64,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
}

impl Default for N8nSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            auth_type: N8nAuth::None,
            api_key: String::new(),
            webhook_secret: String::new(),
            username: String::new(),
            password: String::new(),
            timeout: N8N_DEFAULT_TIMEOUT_S,
            verify_ssl: true,
        }
    }
}

impl N8nSettings {
    fn normalized(mut self) -> Self {
        self.timeout = self.timeout.clamp(1, 60);
        self
    }

    /// Enabled with a base url.
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.base_url.trim().is_empty()
    }
}

/// A partial n8n settings change; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct N8nUpdate {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub auth_type: Option<String>,
    pub api_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<i64>,
    pub verify_ssl: Option<bool>,
}

fn non_empty_secret(incoming: Option<String>, existing: String) -> String {
    match incoming.map(|s| s.trim().to_string()) {
        Some(s) if !s.is_empty() => s,
        _ => existing,
    }
}

/// Settings files under `<root>/config/`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            dir: root.into().join("config"),
        }
    }

    fn ai_path(&self) -> PathBuf {
        self.dir.join("ai_settings.json")
    }

    fn n8n_path(&self) -> PathBuf {
        self.dir.join("n8n_settings.json")
    }

    pub fn load_ai_settings(&self) -> AiSettings {
        match read_json::<AiSettings>(&self.ai_path()) {
            Ok(Some(s)) => s,
            Ok(None) => AiSettings::default(),
            Err(e) => {
                tracing::warn!(error = %e, "ai settings unreadable, using defaults");
                AiSettings::default()
            }
        }
    }

    /// Write `settings`, keeping any stored api key the incoming value leaves blank.
    pub fn save_ai_settings(&self, mut settings: AiSettings) -> Result<AiSettings> {
        let existing = self.load_ai_settings();
        for (name, p) in settings.providers.iter_mut() {
            if p.api_key.trim().is_empty() {
                if let Some(old) = existing.providers.get(name) {
                    p.api_key = old.api_key.clone();
                }
            } else {
                p.api_key = p.api_key.trim().to_string();
            }
        }
        settings.updated_at = Some(now_timestamp());
        write_json_atomic(&self.ai_path(), &settings)?;
        tracing::info!(providers = settings.providers.len(), "ai settings saved");
        Ok(settings)
    }

    pub fn load_n8n_settings(&self) -> N8nSettings {
        match read_json::<N8nSettings>(&self.n8n_path()) {
            Ok(Some(s)) => s.normalized(),
            Ok(None) => N8nSettings::default(),
            Err(e) => {
                tracing::warn!(error = %e, "n8n settings unreadable, using defaults");
                N8nSettings::default()
            }
        }
    }

    /// Merge `update` into the stored settings and write the result.
    pub fn save_n8n_settings(&self, update: N8nUpdate) -> Result<N8nSettings> {
        let existing = self.load_n8n_settings();
        let base_url = update
            .base_url
            .map(|u| u.trim().to_string())
            .unwrap_or(existing.base_url)
            .trim_end_matches('/')
            .to_string();
        let timeout = update
            .timeout
            .map(|t| t.clamp(1, 60) as u64)
            .unwrap_or(existing.timeout)
            .clamp(1, 60);
        let settings = N8nSettings {
            enabled: update.enabled.unwrap_or(existing.enabled),
            base_url,
            auth_type: update
                .auth_type
                .as_deref()
                .map(N8nAuth::parse)
                .unwrap_or(existing.auth_type),
            api_key: non_empty_secret(update.api_key, existing.api_key),
            webhook_secret: non_empty_secret(update.webhook_secret, existing.webhook_secret),
            username: update
                .username
                .map(|u| u.trim().to_string())
                .unwrap_or(existing.username),
            password: non_empty_secret(update.password, existing.password),
            timeout,
            verify_ssl: update.verify_ssl.unwrap_or(existing.verify_ssl),
        };
        write_json_atomic(&self.n8n_path(), &settings)?;
        tracing::info!(enabled = settings.enabled, "n8n settings saved");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_and_corrupt_files_load_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ConfigStore::new(tmp.path());
        let s = cfg.load_ai_settings();
        assert_eq!(s.default_provider, "openai");
        assert!(!s.providers["openai"].enabled);
        assert_eq!(cfg.load_n8n_settings(), N8nSettings::default());

        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(tmp.path().join("config/ai_settings.json"), "[1, 2").unwrap();
        assert_eq!(cfg.load_ai_settings(), AiSettings::default());
    }

    #[test]
    fn text_model_prefers_models_object() {
        let mut p = ProviderSettings::with_model("legacy/model");
        assert_eq!(p.text_model().as_deref(), Some("legacy/model"));
        p.models = Some(ModelSet {
            text: " new/model ".to_string(),
            ..ModelSet::default()
        });
        assert_eq!(p.text_model().as_deref(), Some("new/model"));
        p.models = Some(ModelSet::default());
        assert_eq!(p.text_model().as_deref(), Some("legacy/model"));
        p.default_model.clear();
        assert_eq!(p.text_model(), None);
    }

    #[test]
    fn blank_api_key_keeps_stored_one() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ConfigStore::new(tmp.path());
        let mut s = AiSettings::default();
        if let Some(p) = s.providers.get_mut("openai") {
            p.enabled = true;
            p.api_key = "sk-stored".to_string();
        }
        cfg.save_ai_settings(s.clone()).unwrap();

        if let Some(p) = s.providers.get_mut("openai") {
            p.api_key = "   ".to_string();
        }
        let saved = cfg.save_ai_settings(s).unwrap();
        assert_eq!(saved.providers["openai"].api_key, "sk-stored");
        assert!(saved.updated_at.is_some());
        assert_eq!(cfg.load_ai_settings().providers["openai"].api_key, "sk-stored");
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ConfigStore::new(tmp.path());
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(
            tmp.path().join("config/ai_settings.json"),
            r#"{"providers":{"huggingface":{"enabled":true,"api_key":"hf_x","organization":"acme",
                "models":{"text":"m/text"}}},"rate_limits":{"requests_per_minute":60},
                "generation_defaults":{"timeout":45}}"#,
        )
        .unwrap();
        let s = cfg.load_ai_settings();
        let hf = s.provider("huggingface").unwrap();
        assert_eq!(hf.extra["organization"], "acme");
        assert_eq!(s.extra["rate_limits"]["requests_per_minute"], 60);
        assert_eq!(s.generation_defaults.timeout, Some(45));
        let saved = cfg.save_ai_settings(s).unwrap();
        assert_eq!(cfg.load_ai_settings(), saved);
    }

    #[test]
    fn n8n_save_normalizes_and_merges() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ConfigStore::new(tmp.path());
        let s = cfg
            .save_n8n_settings(N8nUpdate {
                enabled: Some(true),
                base_url: Some(" https://n8n.example.com/// ".to_string()),
                auth_type: Some("oauth".to_string()),
                api_key: Some("key-1".to_string()),
                timeout: Some(500),
                ..N8nUpdate::default()
            })
            .unwrap();
        assert_eq!(s.base_url, "https://n8n.example.com");
        assert_eq!(s.auth_type, N8nAuth::None);
        assert_eq!(s.timeout, 60);
        assert!(s.is_configured());

        let s = cfg
            .save_n8n_settings(N8nUpdate {
                auth_type: Some("apikey".to_string()),
                api_key: Some("".to_string()),
                timeout: Some(0),
                ..N8nUpdate::default()
            })
            .unwrap();
        assert_eq!(s.api_key, "key-1");
        assert_eq!(s.auth_type, N8nAuth::ApiKey);
        assert_eq!(s.timeout, 1);
        assert_eq!(cfg.load_n8n_settings(), s);
    }

    #[test]
    fn n8n_load_clamps_and_tolerates_unknown_auth() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(
            tmp.path().join("config/n8n_settings.json"),
            r#"{"enabled":true,"base_url":"http://n8n.local","auth_type":"jwt","timeout":999}"#,
        )
        .unwrap();
        let s = ConfigStore::new(tmp.path()).load_n8n_settings();
        assert_eq!(s.auth_type, N8nAuth::None);
        assert_eq!(s.timeout, 60);
        assert!(s.verify_ssl);
    }
}

//! n8n REST API and webhook client.
//!
//! Management calls (`/api/v1/...`, `/healthz`) authenticate with the
//! configured API key or basic credentials. Webhooks only ever carry the
//! webhook secret.

use crate::config::{N8nAuth, N8nSettings};
use crate::transport_error;
use seolab_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const MAX_WORKFLOW_LIMIT: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: Option<String>,
    pub name: String,
    pub active: bool,
    pub created: Option<String>,
    pub updated: Option<String>,
}

impl WorkflowSummary {
    fn from_json(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        let id = obj.get("id").and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        let text = |k: &str| obj.get(k).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            id,
            name: text("name").unwrap_or_else(|| "Unnamed workflow".to_string()),
            active: obj.get("active").and_then(Value::as_bool).unwrap_or(false),
            created: text("createdAt"),
            updated: text("updatedAt"),
        })
    }
}

/// A completed exchange: status, raw body, and the body as JSON when it parses.
#[derive(Debug, Clone, PartialEq)]
pub struct N8nResponse {
    pub status: u16,
    pub body: String,
    pub json: Option<Value>,
}

impl N8nResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn json_message(&self) -> Option<&str> {
        self.json
            .as_ref()
            .and_then(|j| j.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
    }

    /// `Upstream` with `prefix` plus the body's message, or the bare status text.
    fn failure(&self, prefix: &str) -> Error {
        let detail = self
            .json_message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status {}", self.status));
        let message = if prefix.is_empty() {
            detail
        } else {
            format!("{prefix} {detail}")
        };
        tracing::warn!(status = self.status, message = %message, "n8n request failed");
        Error::Upstream {
            status: self.status,
            message,
        }
    }
}

#[derive(Debug, Clone)]
pub struct N8nClient {
    client: reqwest::Client,
    settings: N8nSettings,
}

impl N8nClient {
    pub fn new(settings: N8nSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("seolab/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .timeout(Duration::from_secs(settings.timeout.clamp(1, 60)))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &N8nSettings {
        &self.settings
    }

    fn require_configured(&self) -> Result<()> {
        if self.settings.is_configured() {
            Ok(())
        } else {
            Err(Error::NotConfigured("n8n".to_string()))
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.settings.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn read(resp: reqwest::Response) -> Result<N8nResponse> {
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| transport_error("n8n", &e))?;
        let json = if body.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&body).ok()
        };
        Ok(N8nResponse { status, body, json })
    }

    /// Authenticated call against the n8n API; any status is returned.
    async fn api(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<N8nResponse> {
        self.require_configured()?;
        let url = self.url(path);
        tracing::debug!(method = %method, url = %url, "n8n request");
        let mut rb = self.client.request(method, &url);
        if !query.is_empty() {
            rb = rb.query(query);
        }
        if let Some(body) = body {
            rb = rb.json(body);
        }
        rb = match self.settings.auth_type {
            N8nAuth::ApiKey if !self.settings.api_key.is_empty() => {
                rb.header("X-API-Key", &self.settings.api_key)
            }
            N8nAuth::Basic if !self.settings.username.is_empty() => {
                rb.basic_auth(&self.settings.username, Some(&self.settings.password))
            }
            _ => rb,
        };
        let resp = rb.send().await.map_err(|e| transport_error("n8n", &e))?;
        Self::read(resp).await
    }

    /// Up to `limit` workflows (clamped to 1..=200).
    pub async fn list_workflows(&self, limit: usize) -> Result<Vec<WorkflowSummary>> {
        let limit = limit.clamp(1, MAX_WORKFLOW_LIMIT);
        let resp = self
            .api(
                reqwest::Method::GET,
                "/api/v1/workflows",
                &[("limit", limit.to_string())],
                None,
            )
            .await?;
        if !resp.is_success() {
            return Err(resp.failure(""));
        }
        let items: &[Value] = match &resp.json {
            Some(Value::Object(o)) => match o.get("data") {
                Some(Value::Array(a)) => a.as_slice(),
                _ => &[],
            },
            Some(Value::Array(a)) => a.as_slice(),
            _ => &[],
        };
        let workflows: Vec<_> = items.iter().filter_map(WorkflowSummary::from_json).collect();
        tracing::info!(count = workflows.len(), "n8n workflows listed");
        Ok(workflows)
    }

    /// Create a workflow from its JSON definition; returns n8n's copy.
    pub async fn create_workflow(&self, workflow: &Value) -> Result<Value> {
        self.require_configured()?;
        let has_name = workflow
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|n| !n.trim().is_empty());
        if !has_name {
            return Err(Error::Validation("Workflow name is required.".to_string()));
        }
        if !workflow.get("nodes").is_some_and(Value::is_array) {
            return Err(Error::Validation(
                "Workflow must contain nodes array.".to_string(),
            ));
        }
        let resp = self
            .api(reqwest::Method::POST, "/api/v1/workflows", &[], Some(workflow))
            .await?;
        if !resp.is_success() {
            return Err(resp.failure("Failed to create workflow in n8n."));
        }
        Ok(resp.json.unwrap_or(Value::Null))
    }

    pub async fn activate(&self, workflow_id: &str) -> Result<Value> {
        self.set_active(workflow_id, true).await
    }

    pub async fn deactivate(&self, workflow_id: &str) -> Result<Value> {
        self.set_active(workflow_id, false).await
    }

    async fn set_active(&self, workflow_id: &str, active: bool) -> Result<Value> {
        self.require_configured()?;
        let id = workflow_id.trim();
        if id.is_empty() {
            return Err(Error::Validation("Workflow ID is required.".to_string()));
        }
        let action = if active { "activate" } else { "deactivate" };
        let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
        let resp = self
            .api(
                reqwest::Method::POST,
                &format!("/api/v1/workflows/{encoded}/{action}"),
                &[],
                None,
            )
            .await?;
        if !resp.is_success() {
            return Err(resp.failure(&format!("Failed to {action} workflow.")));
        }
        tracing::info!(workflow = id, action, "n8n workflow state changed");
        Ok(resp.json.unwrap_or(Value::Null))
    }

    /// `GET /healthz`; a 2xx returns the body's JSON (or `Null`).
    pub async fn health_check(&self) -> Result<Value> {
        let resp = self
            .api(reqwest::Method::GET, "/healthz", &[], None)
            .await?;
        if !resp.is_success() {
            tracing::warn!(status = resp.status, "n8n health endpoint not healthy");
            return Err(Error::Upstream {
                status: resp.status,
                message: "Unexpected HTTP status from n8n health endpoint.".to_string(),
            });
        }
        Ok(resp
            .json
            .unwrap_or_else(|| Value::String(resp.body.clone())))
    }

    /// POST `body` to a webhook url with the webhook secret header. Any status
    /// is returned; only transport failures are errors.
    pub async fn webhook(&self, url: &str, body: &Value) -> Result<N8nResponse> {
        if !self.settings.enabled {
            return Err(Error::NotConfigured("n8n".to_string()));
        }
        let url = url.trim();
        let parsed = url::Url::parse(url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .ok_or_else(|| Error::Validation("Invalid webhook URL.".to_string()))?;
        tracing::debug!(url = %parsed, "n8n webhook");
        let mut rb = self.client.post(parsed).json(body);
        if !self.settings.webhook_secret.is_empty() {
            rb = rb.header("X-N8N-Webhook-Secret", &self.settings.webhook_secret);
        }
        let resp = rb.send().await.map_err(|e| transport_error("n8n webhook", &e))?;
        let out = Self::read(resp).await?;
        if !out.is_success() {
            tracing::warn!(status = out.status, "n8n webhook returned non-success status");
        }
        Ok(out)
    }
}

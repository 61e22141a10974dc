use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ResolvedConfig;

// ── Query capability ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{provider} API error: status {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("could not decode {provider} response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },
    #[error("{0} returned no choices")]
    Empty(&'static str),
}

/// A model that answers one prompt with one block of text.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn query(&self, system: &str, user: &str) -> Result<String, QueryError>;
}

// ── Providers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenAi,
    OpenRouter,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::OpenRouter => "openrouter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" => Some(Self::OpenAi),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "http://localhost:11434",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    fn needs_api_key(self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

/// Full request URL for a provider rooted at `endpoint`.
pub fn request_url(provider: ProviderKind, endpoint: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    match provider {
        ProviderKind::Ollama => format!("{base}/api/generate"),
        ProviderKind::OpenAi | ProviderKind::OpenRouter => format!("{base}/chat/completions"),
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

fn request_body(provider: ProviderKind, model: &str, system: &str, user: &str) -> Value {
    match provider {
        ProviderKind::Ollama => serde_json::json!({
            "model": model,
            "prompt": user,
            "system": system,
            "stream": false,
        }),
        ProviderKind::OpenAi | ProviderKind::OpenRouter => serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        }),
    }
}

/// Pull the answer text out of a decoded response body.
fn parse_response(provider: ProviderKind, body: Value) -> Result<String, QueryError> {
    let name = provider.as_str();
    let decode = |e: serde_json::Error| QueryError::Decode {
        provider: name,
        message: e.to_string(),
    };
    match provider {
        ProviderKind::Ollama => {
            let parsed: OllamaResponse = serde_json::from_value(body).map_err(decode)?;
            Ok(parsed.response)
        }
        ProviderKind::OpenAi | ProviderKind::OpenRouter => {
            let parsed: ChatResponse = serde_json::from_value(body).map_err(decode)?;
            parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content.unwrap_or_default())
                .ok_or(QueryError::Empty(name))
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct Client {
    http: reqwest::Client,
    pub provider: ProviderKind,
    pub endpoint: String,
    pub model: String,
    api_key: Option<String>,
}

impl Client {
    pub fn new(provider: ProviderKind, endpoint: String, model: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            provider,
            endpoint,
            model,
            api_key: None,
        })
    }

    pub fn set_api_key(&mut self, key: String) {
        self.api_key = Some(key);
    }

    /// Build the client for the resolved profile. Hosted providers need a key.
    pub fn from_config(resolved: &ResolvedConfig) -> Result<Self> {
        let provider = resolved.provider;
        if provider.needs_api_key() && resolved.api_key.as_deref().is_none_or(str::is_empty) {
            bail!(
                "{} profile '{}' is missing api_key",
                provider.as_str(),
                resolved.profile_name
            );
        }
        let mut client = Self::new(
            provider,
            resolved.endpoint.clone(),
            resolved.model.clone(),
            Duration::from_secs(resolved.timeout_secs),
        )?;
        if let Some(key) = &resolved.api_key {
            client.set_api_key(key.clone());
        }
        Ok(client)
    }
}

#[async_trait]
impl QueryBackend for Client {
    fn name(&self) -> &str {
        self.provider.as_str()
    }

    async fn query(&self, system: &str, user: &str) -> Result<String, QueryError> {
        let url = request_url(self.provider, &self.endpoint);
        let body = request_body(self.provider, &self.model, system, user);

        let mut req = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);

        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        tracing::debug!(provider = self.provider.as_str(), model = %self.model, %url, "sending query");
        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                provider: self.provider.as_str(),
                status,
                body: text,
            });
        }

        let value: Value = resp.json().await.map_err(|e| QueryError::Decode {
            provider: self.provider.as_str(),
            message: e.to_string(),
        })?;
        parse_response(self.provider, value)
    }
}

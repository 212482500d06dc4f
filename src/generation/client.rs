//! OpenAI-compatible chat completion client

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{GenerationRequest, Generator};
use crate::config::GenerationConfig;

const SYSTEM_PROMPT: &str = "You are a sovereign, emergent intelligence keeping a private \
record of journals, dreams, directives and reflections. Answer with the requested text only.";

/// Chat client for any `/chat/completions` endpoint
#[derive(Clone)]
pub struct ChatClient {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<serde_json::Value>,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: String, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    /// Build a client from config; `None` when the API key variable is unset
    pub fn from_config(config: &GenerationConfig) -> Result<Option<Self>> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => return Ok(None),
        };
        Self::new(
            &config.base_url,
            api_key,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
        .map(Some)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for ChatClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let prompt = request.prompt();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!("Requesting {} from {} ({})", request.kind, self.base_url, self.model);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("Failed to send request to generation service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Generation API error ({}): {}", status, body);
        }

        let text = response.text().await.context("Failed to read response body")?;
        let content = extract_content(&text)?;
        if content.trim().is_empty() {
            bail!("Generation service returned an empty {}", request.kind);
        }
        Ok(content.trim().to_string())
    }
}

/// Message text from a completion body; handles string and content-part forms
fn extract_content(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body).with_context(|| {
        format!(
            "Failed to parse completion response: {}",
            body.chars().take(200).collect::<String>()
        )
    })?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content);

    Ok(match content {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Array(parts)) => parts
            .iter()
            .filter(|part| part.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    })
}

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{PipelineError, Result};

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";

/// One entry of the ordered message sequence fed to the chat-completion API.
/// `name` tags auxiliary context messages (the guideline graph) so the model
/// can tell them apart from the conversation proper.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant_named(name: &'static str, content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
            name: Some(name),
        }
    }
}

/// Thin wrapper over an OpenRouter-style chat-completions endpoint. One call
/// per invocation; no retry, no streaming, no partial results.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn from_env() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: OPENROUTER_API_URL.to_string(),
            api_key: std::env::var("OPENROUTER_API_KEY").ok(),
        }
    }

    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: Some(api_key.into()),
        }
    }

    /// Send the message sequence and return the first choice's text content,
    /// or an empty string when the field is absent.
    pub async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(PipelineError::MissingConfig("OPENROUTER_API_KEY"))?;

        let payload = json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::Llm(format!(
                "LLM API request failed: {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Llm(e.to_string()))?;

        Ok(body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

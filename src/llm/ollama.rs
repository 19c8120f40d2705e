//! Ollama client for the local backend.
//!
//! Uses the non-streaming `POST /api/chat` endpoint so one call yields the
//! whole answer.

use super::client::classify_status;
use super::{Completion, Message, Prompt};
use crate::config::OllamaConfig;
use crate::error::{Result, RfpError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Local generation is slow on CPU-only hosts.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// Ollama chat client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RfpError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Check that the Ollama server answers.
    pub async fn health_check(&self) -> Result<bool> {
        match self.client.get(self.url("/api/version")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, messages: Vec<Message>) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ChatResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            return Err(classify_status(status, message));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        if let Some(error) = parsed.error {
            return Err(RfpError::LlmApi(error));
        }
        parsed
            .message
            .map(|m| m.content)
            .ok_or_else(|| RfpError::LlmParse("Ollama response has no message".to_string()))
    }
}

#[async_trait]
impl Completion for OllamaClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.chat(prompt.messages()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_construction() {
        let client = OllamaClient::new(OllamaConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.url("/api/chat"), "http://localhost:11434/api/chat");
        assert_eq!(client.model(), "llama3");
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "llama3",
            messages: vec![Message::user("안녕")],
            stream: false,
            options: ChatOptions { temperature: 0.0 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"model":"llama3","message":{"role":"assistant","content":"한국어 답변"},"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.unwrap().content, "한국어 답변");
    }
}

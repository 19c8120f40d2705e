//! OpenAI-compatible LLM client.
//!
//! Serves the remote backend and the LLM judge. Works with any endpoint that
//! speaks `/v1/chat/completions`.

use super::{Completion, Prompt};
use crate::config::LlmConfig;
use crate::error::{Result, RfpError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Message role in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in the conversation. Prior chat turns are carried as messages too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request body for chat completion.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Response from chat completion.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// OpenAI API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Response from an LLM call including metadata.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated content.
    pub content: String,
    /// Reason the model stopped generating.
    pub finish_reason: Option<String>,
    /// Token usage (if available).
    pub usage: Option<TokenUsage>,
}

#[derive(Debug)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// OpenAI-compatible LLM client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Get the API endpoint URL.
    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/v1/chat/completions", base)
    }

    /// Send a chat completion request.
    pub async fn chat(&self, messages: Vec<Message>) -> Result<LlmResponse> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(classify_status(status, message));
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body)?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RfpError::LlmApi("No choices in response".to_string()))?;

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            usage: completion.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    /// Test connectivity to the API.
    pub async fn test_connection(&self) -> Result<()> {
        let messages = vec![Message::user("Say 'hello' and nothing else.")];

        let response = self.chat(messages).await?;

        if response.content.to_lowercase().contains("hello") {
            Ok(())
        } else {
            Err(RfpError::LlmApi(format!(
                "Unexpected response: {}",
                response.content
            )))
        }
    }
}

#[async_trait]
impl Completion for LlmClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let response = self.chat(prompt.messages()).await?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                model = %self.config.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat completion"
            );
        }
        Ok(response.content)
    }
}

/// Map a failed HTTP status to a transient or permanent error.
pub(crate) fn classify_status(status: StatusCode, message: String) -> RfpError {
    let detail = format!("API error ({}): {}", status, message);
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        RfpError::LlmTransient(detail)
    } else {
        RfpError::LlmApi(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let sys = Message::system("You are helpful.");
        let user = Message::user("Hello!");
        let assistant = Message::assistant("Hi there!");

        assert!(matches!(sys.role, Role::System));
        assert!(matches!(user.role, Role::User));
        assert!(matches!(assistant.role, Role::Assistant));
    }

    #[test]
    fn test_endpoint_construction() {
        let config = LlmConfig {
            api_base: "https://api.example.com/".to_string(),
            api_key: "test".to_string(),
            model: "gpt-4o-mini".to_string(),
            ..Default::default()
        };
        let client = LlmClient::new(config);
        assert_eq!(client.endpoint(), "https://api.example.com/v1/chat/completions");
        assert_eq!(client.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into()).is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "".into()).is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, "bad".into()).is_transient());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "key".into()).is_transient());
    }

    #[test]
    fn test_response_parsing_allows_null_content() {
        let body = r#"{"choices":[{"message":{"content":null},"finish_reason":"stop"}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}

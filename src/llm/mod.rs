//! LLM integration module.
//!
//! Defines the [`Completion`] capability used by answer backends, the judge and
//! the corpus summarizer, with two implementations: an OpenAI-compatible client
//! for the remote backend and an Ollama client for the local one.

mod client;
mod ollama;
mod prompts;

pub use client::{LlmClient, LlmResponse, Message, Role, TokenUsage};
pub use ollama::OllamaClient;
pub use prompts::Prompts;

use crate::error::Result;
use async_trait::async_trait;

/// A rendered prompt: optional system instructions, prior turns, and the
/// current user turn.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    pub system: Option<String>,
    pub history: Vec<Message>,
    pub user: String,
}

impl Prompt {
    /// A prompt with a single user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            user: content.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_history(mut self, history: &[Message]) -> Self {
        self.history = history.to_vec();
        self
    }

    /// Flatten into chat messages: system, history, then the user turn.
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(sys) = &self.system {
            messages.push(Message::system(sys.clone()));
        }
        messages.extend(self.history.iter().cloned());
        messages.push(Message::user(self.user.clone()));
        messages
    }
}

/// Text completion capability: one prompt in, raw model text out.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Model identifier, for logs and reports.
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_messages_order() {
        let prompt = Prompt::user("질문")
            .with_system("규칙")
            .with_history(&[Message::user("이전 질문"), Message::assistant("이전 답변")]);
        let messages = prompt.messages();

        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0].role, Role::System));
        assert_eq!(messages[1].content, "이전 질문");
        assert!(matches!(messages[2].role, Role::Assistant));
        assert_eq!(messages[3].content, "질문");
    }

    #[test]
    fn test_prompt_without_system() {
        let messages = Prompt::user("hello").messages();
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0].role, Role::User));
    }
}

//! Answer backends: retrieval plus one completion call under a prompt policy.
//!
//! The evaluator only sees [`AnswerBackend`]; whether answers come from a
//! cloud model or a local one is decided when the backend is built.

use crate::error::Result;
use crate::llm::{Completion, Message, Prompt, Prompts};
use crate::retrieval::{Passage, Retriever};
use async_trait::async_trait;
use std::sync::Arc;

/// Produces an answer to a question, optionally given prior turns.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    /// Label used in logs and reports.
    fn name(&self) -> &str;

    async fn generate_answer(&self, question: &str, history: &[Message]) -> Result<String>;
}

/// How the retrieved context and the question are turned into a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPolicy {
    /// Analyst system prompt; context and question as the user turn; prior
    /// turns forwarded.
    Remote,
    /// One user-turn template; prior turns are dropped.
    Local,
}

impl PromptPolicy {
    pub fn render(&self, context: &str, question: &str, history: &[Message]) -> Prompt {
        match self {
            PromptPolicy::Remote => {
                let user = Prompts::remote_user()
                    .replace("{context}", context)
                    .replace("{question}", question);
                Prompt::user(user)
                    .with_system(Prompts::remote_system())
                    .with_history(history)
            }
            PromptPolicy::Local => Prompt::user(
                Prompts::local_answer()
                    .replace("{context}", context)
                    .replace("{question}", question),
            ),
        }
    }
}

/// Passage texts in retriever order, separated by a blank line.
pub fn join_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Retriever + completion + prompt policy.
pub struct RagBackend {
    name: String,
    retriever: Arc<dyn Retriever>,
    completion: Arc<dyn Completion>,
    policy: PromptPolicy,
    top_k: usize,
}

impl RagBackend {
    pub fn new(
        name: impl Into<String>,
        retriever: Arc<dyn Retriever>,
        completion: Arc<dyn Completion>,
        policy: PromptPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            retriever,
            completion,
            policy,
            top_k: 3,
        }
    }

    /// Set the number of passages retrieved per question.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }
}

#[async_trait]
impl AnswerBackend for RagBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_answer(&self, question: &str, history: &[Message]) -> Result<String> {
        let passages = self.retriever.retrieve(question, self.top_k).await?;
        tracing::debug!(
            backend = %self.name,
            passages = passages.len(),
            sources = ?passages.iter().map(|p| p.metadata.source.as_str()).collect::<Vec<_>>(),
            "retrieved context"
        );

        let prompt = self.policy.render(&join_context(&passages), question, history);
        self.completion.complete(&prompt).await
    }
}

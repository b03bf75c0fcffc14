use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{ChatMessage, ModelOptions};
use crate::core::errors::AgentError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name (e.g. "ollama")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: &ModelOptions,
    ) -> Result<String, AgentError>;

    /// chat completion (streaming); the receiver yields answer deltas
    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        options: &ModelOptions,
    ) -> Result<mpsc::Receiver<Result<String, AgentError>>, AgentError>;

    /// generate one embedding per input text
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AgentError>;
}

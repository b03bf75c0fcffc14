//! Scripted provider for tests: canned answers, recorded prompts, and a
//! deterministic bag-of-words embedding so similarity still tracks
//! shared vocabulary.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::provider::LlmProvider;
use super::types::{ChatMessage, ModelOptions};
use crate::core::errors::AgentError;

pub const EMBEDDING_DIM: usize = 32;

#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Vec<String>>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
    embed_calls: Mutex<usize>,
}

impl ScriptedProvider {
    /// One queue element per expected chat call, already split into the
    /// deltas the stream should emit.
    pub fn with_deltas(scripts: Vec<Vec<String>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        }
    }

    /// One complete answer per expected chat call.
    pub fn with_answers(answers: Vec<String>) -> Self {
        Self::with_deltas(answers.into_iter().map(|a| vec![a]).collect())
    }

    pub fn recorded_prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn embed_call_count(&self) -> usize {
        *self.embed_calls.lock().unwrap()
    }

    fn next_script(&self, messages: Vec<ChatMessage>) -> Result<Vec<String>, AgentError> {
        self.prompts.lock().unwrap().push(messages);
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::ModelInvocation("no scripted answer left".to_string()))
    }
}

/// Hash each whitespace token into a fixed dimension and count it, then
/// L2-normalize. Texts sharing words end up with high cosine similarity.
pub fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];
    for token in text.to_lowercase().split_whitespace() {
        let token: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
        if token.is_empty() {
            continue;
        }
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        vector[(hasher.finish() % EMBEDDING_DIM as u64) as usize] += 1.0;
    }

    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        _options: &ModelOptions,
    ) -> Result<String, AgentError> {
        Ok(self.next_script(messages)?.concat())
    }

    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        _options: &ModelOptions,
    ) -> Result<mpsc::Receiver<Result<String, AgentError>>, AgentError> {
        let deltas = self.next_script(messages)?;
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for delta in deltas {
                if tx.send(Ok(delta)).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
        *self.embed_calls.lock().unwrap() += 1;
        Ok(inputs.iter().map(|text| embed_text(text)).collect())
    }
}

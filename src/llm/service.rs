use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::provider::LlmProvider;
use super::types::{ChatMessage, ModelOptions};
use crate::core::errors::AgentError;

/// Thin service over an [`LlmProvider`]: fixes the sampling options at
/// construction, enforces an overall answer deadline, and aggregates the
/// provider's stream into one final string. Deltas can additionally be
/// forwarded to an observer channel while the caller blocks.
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    options: ModelOptions,
    answer_timeout: Duration,
}

impl LlmService {
    pub fn new(provider: Arc<dyn LlmProvider>, options: ModelOptions, answer_timeout: Duration) -> Self {
        Self {
            provider,
            options,
            answer_timeout,
        }
    }

    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        observer: Option<mpsc::Sender<String>>,
    ) -> Result<String, AgentError> {
        let aggregate = async {
            let mut rx = self.provider.stream_chat(messages, &self.options).await?;
            let mut answer = String::new();

            while let Some(delta) = rx.recv().await {
                let delta = delta?;
                if let Some(observer) = &observer {
                    // A gone observer must not fail the answer.
                    let _ = observer.send(delta.clone()).await;
                }
                answer.push_str(&delta);
            }

            Ok::<String, AgentError>(answer)
        };

        let answer = tokio::time::timeout(self.answer_timeout, aggregate)
            .await
            .map_err(|_| {
                AgentError::ModelInvocation(format!(
                    "model did not answer within {}s",
                    self.answer_timeout.as_secs()
                ))
            })??;

        if answer.trim().is_empty() {
            return Err(AgentError::ModelInvocation(
                "model returned an empty answer".to_string(),
            ));
        }

        Ok(answer)
    }

    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
        let vectors = self.provider.embed(inputs).await?;
        if vectors.len() != inputs.len() {
            return Err(AgentError::ModelInvocation(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, AgentError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AgentError::ModelInvocation("missing embedding".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;

    fn service(provider: ScriptedProvider) -> LlmService {
        LlmService::new(Arc::new(provider), ModelOptions::default(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn complete_aggregates_stream_deltas() {
        let provider =
            ScriptedProvider::with_deltas(vec![vec!["Olá, ".to_string(), "tudo bem?".to_string()]]);
        let answer = service(provider)
            .complete(vec![ChatMessage::user("oi")], None)
            .await
            .expect("answer");
        assert_eq!(answer, "Olá, tudo bem?");
    }

    #[tokio::test]
    async fn complete_forwards_deltas_to_observer() {
        let provider =
            ScriptedProvider::with_deltas(vec![vec!["parte um ".to_string(), "parte dois".to_string()]]);
        let (tx, mut rx) = mpsc::channel(8);

        let answer = service(provider)
            .complete(vec![ChatMessage::user("oi")], Some(tx))
            .await
            .expect("answer");

        let mut observed = String::new();
        while let Ok(delta) = rx.try_recv() {
            observed.push_str(&delta);
        }
        assert_eq!(observed, answer);
    }

    #[tokio::test]
    async fn empty_answer_is_a_model_invocation_error() {
        let provider = ScriptedProvider::with_answers(vec!["   ".to_string()]);
        let err = service(provider)
            .complete(vec![ChatMessage::user("oi")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ModelInvocation(_)));
    }

    #[tokio::test]
    async fn embed_checks_the_returned_count() {
        let provider = ScriptedProvider::default();
        let vectors = service(provider)
            .embed(&["um".to_string(), "dois".to_string()])
            .await
            .expect("embeddings");
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), crate::llm::testing::EMBEDDING_DIM);
    }
}

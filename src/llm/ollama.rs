//! Ollama HTTP provider.
//!
//! `/api/chat` streams newline-delimited JSON objects; `/api/embeddings`
//! answers one vector per request. Transport failures, non-success
//! statuses, and malformed payloads all surface as `ModelInvocation`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::LlmProvider;
use super::types::{ChatMessage, ModelOptions};
use crate::core::errors::AgentError;

#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    embedding_model: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(
        base_url: String,
        model: String,
        embedding_model: String,
        request_timeout: Duration,
    ) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(AgentError::internal)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            embedding_model,
            client,
        })
    }

    fn chat_body(&self, messages: &[ChatMessage], options: &ModelOptions, stream: bool) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
            "options": {
                "temperature": options.temperature,
                "top_p": options.top_p,
                "num_ctx": options.num_ctx,
            },
        })
    }
}

/// Parse one NDJSON stream line into (delta, done).
fn parse_stream_line(line: &str) -> Option<(String, bool)> {
    let value = serde_json::from_str::<Value>(line.trim()).ok()?;
    let done = value["done"].as_bool().unwrap_or(false);
    let delta = value["message"]["content"].as_str().unwrap_or_default().to_string();
    Some((delta, done))
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: &ModelOptions,
    ) -> Result<String, AgentError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.chat_body(&messages, options, false);

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| AgentError::ModelInvocation(format!("ollama unreachable: {err}")))?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(AgentError::ModelInvocation(format!("ollama chat error: {text}")));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|err| AgentError::ModelInvocation(format!("invalid ollama response: {err}")))?;

        let content = payload["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(content)
    }

    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        options: &ModelOptions,
    ) -> Result<mpsc::Receiver<Result<String, AgentError>>, AgentError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.chat_body(&messages, options, true);

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| AgentError::ModelInvocation(format!("ollama unreachable: {err}")))?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(AgentError::ModelInvocation(format!("ollama stream error: {text}")));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            // Lines can straddle network chunks; keep the partial tail.
            let mut buffer = String::new();

            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        while let Some(newline) = buffer.find('\n') {
                            let line: String = buffer.drain(..=newline).collect();
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            let Some((delta, done)) = parse_stream_line(line) else {
                                continue;
                            };
                            if !delta.is_empty() && tx.send(Ok(delta)).await.is_err() {
                                return;
                            }
                            if done {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        let _ = tx
                            .send(Err(AgentError::ModelInvocation(format!("ollama stream failed: {err}"))))
                            .await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let mut embeddings = Vec::with_capacity(inputs.len());

        for input in inputs {
            let body = json!({
                "model": self.embedding_model,
                "prompt": input,
            });

            let res = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|err| AgentError::ModelInvocation(format!("ollama unreachable: {err}")))?;

            if !res.status().is_success() {
                let text = res.text().await.unwrap_or_default();
                return Err(AgentError::ModelInvocation(format!("ollama embed error: {text}")));
            }

            let payload: Value = res
                .json()
                .await
                .map_err(|err| AgentError::ModelInvocation(format!("invalid ollama response: {err}")))?;

            let vector: Vec<f32> = payload["embedding"]
                .as_array()
                .map(|vals| {
                    vals.iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect()
                })
                .unwrap_or_default();

            if vector.is_empty() {
                return Err(AgentError::ModelInvocation(
                    "ollama returned an empty embedding".to_string(),
                ));
            }

            embeddings.push(vector);
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_line_parses_delta_and_done_flag() {
        let (delta, done) =
            parse_stream_line(r#"{"message":{"content":"Olá"},"done":false}"#).expect("parses");
        assert_eq!(delta, "Olá");
        assert!(!done);

        let (delta, done) =
            parse_stream_line(r#"{"message":{"content":""},"done":true}"#).expect("parses");
        assert!(delta.is_empty());
        assert!(done);
    }

    #[test]
    fn garbage_stream_line_is_skipped() {
        assert!(parse_stream_line("not json at all").is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn live_ollama_round_trip() {
        let provider = OllamaProvider::new(
            "http://localhost:11434".to_string(),
            "llama3.1:8b-instruct-q4_K_M".to_string(),
            "llama3.1:8b-instruct-q4_K_M".to_string(),
            Duration::from_secs(60),
        )
        .expect("provider");

        let answer = provider
            .chat(vec![ChatMessage::user("Diga apenas: olá")], &ModelOptions::default())
            .await
            .expect("chat");
        println!("answer: {answer}");

        let vectors = provider.embed(&["texto de teste".to_string()]).await.expect("embed");
        assert_eq!(vectors.len(), 1);
        assert!(!vectors[0].is_empty());
    }
}

//! Diversity-aware retrieval.
//!
//! The query is embedded with the same provider used at index time, the
//! `fetch_k` best candidates are collected by cosine, and maximal
//! marginal relevance re-ranks that pool: `lambda` weighs relevance to
//! the query against redundancy with the chunks already selected.

use crate::core::config::RetrieverSettings;
use crate::core::errors::AgentError;
use crate::llm::LlmService;
use crate::rag::index::{cosine_similarity, Chunk, VectorIndex};

#[derive(Clone)]
pub struct Retriever {
    llm: LlmService,
    k: usize,
    fetch_k: usize,
    lambda: f32,
}

impl Retriever {
    pub fn new(llm: LlmService, settings: &RetrieverSettings) -> Self {
        Self {
            llm,
            k: settings.k,
            fetch_k: settings.fetch_k.max(settings.k),
            lambda: settings.lambda.clamp(0.0, 1.0),
        }
    }

    /// Top `min(k, index len)` chunks for `query`, most relevant first
    /// subject to the diversity trade-off. Read-only and deterministic
    /// for a fixed index and embedding.
    pub async fn retrieve(
        &self,
        index: &VectorIndex,
        query: &str,
    ) -> Result<Vec<Chunk>, AgentError> {
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.llm.embed_one(query).await?;
        let pool: Vec<usize> = index
            .rank(&query_embedding)
            .into_iter()
            .take(self.fetch_k)
            .map(|(idx, _)| idx)
            .collect();

        let selected = mmr_select(index, &query_embedding, &pool, self.k, self.lambda);
        Ok(selected
            .into_iter()
            .map(|idx| index.entries()[idx].chunk.clone())
            .collect())
    }
}

/// Greedy MMR over `pool`: each round picks the candidate maximizing
/// `lambda * sim(query, c) - (1 - lambda) * max sim(c, selected)`.
pub(crate) fn mmr_select(
    index: &VectorIndex,
    query_embedding: &[f32],
    pool: &[usize],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    let mut candidates: Vec<usize> = pool.to_vec();
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));

    while selected.len() < k && !candidates.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &candidate) in candidates.iter().enumerate() {
            let embedding = &index.entries()[candidate].embedding;
            let relevance = cosine_similarity(query_embedding, embedding);
            let redundancy = selected
                .iter()
                .map(|&chosen| cosine_similarity(embedding, &index.entries()[chosen].embedding))
                .fold(0.0f32, f32::max);

            let score = lambda * relevance - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        selected.push(candidates.remove(best_pos));
    }

    selected
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::llm::testing::{embed_text, ScriptedProvider};
    use crate::llm::ModelOptions;
    use crate::rag::index::IndexEntry;

    fn entry(id: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                id: id.to_string(),
                content: format!("trecho {id}"),
                source: format!("{id}.md"),
            },
            embedding,
        }
    }

    fn text_entry(id: &str, content: &str) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                id: id.to_string(),
                content: content.to_string(),
                source: format!("{id}.md"),
            },
            embedding: embed_text(content),
        }
    }

    fn retriever(k: usize, fetch_k: usize, lambda: f32) -> Retriever {
        let llm = LlmService::new(
            Arc::new(ScriptedProvider::default()),
            ModelOptions::default(),
            Duration::from_secs(5),
        );
        Retriever::new(
            llm,
            &RetrieverSettings { k, fetch_k, lambda },
        )
    }

    #[tokio::test]
    async fn returns_exactly_min_k_and_index_size() {
        let index = VectorIndex::new(vec![
            text_entry("a", "planejamento semanal de tarefas"),
            text_entry("b", "receita de bolo de cenoura"),
        ]);

        let chunks = retriever(3, 5, 0.5)
            .retrieve(&index, "planejamento semanal de tarefas")
            .await
            .expect("retrieve");
        assert_eq!(chunks.len(), 2);

        let chunks = retriever(1, 5, 0.5)
            .retrieve(&index, "planejamento semanal de tarefas")
            .await
            .expect("retrieve");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "a");
    }

    #[tokio::test]
    async fn empty_index_returns_no_chunks() {
        let index = VectorIndex::default();
        let chunks = retriever(3, 5, 0.5)
            .retrieve(&index, "qualquer pergunta")
            .await
            .expect("retrieve");
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn retrieval_is_deterministic() {
        let index = VectorIndex::new(vec![
            text_entry("a", "hábitos de leitura diária"),
            text_entry("b", "hábitos de sono e descanso"),
            text_entry("c", "orçamento doméstico mensal"),
        ]);

        let first = retriever(2, 3, 0.5)
            .retrieve(&index, "quais hábitos diários cultivar")
            .await
            .expect("retrieve");
        let second = retriever(2, 3, 0.5)
            .retrieve(&index, "quais hábitos diários cultivar")
            .await
            .expect("retrieve");
        assert_eq!(first, second);
    }

    #[test]
    fn mmr_demotes_near_duplicates() {
        let index = VectorIndex::new(vec![
            entry("dup1", vec![0.95, 0.312]),
            entry("dup2", vec![0.95, 0.312]),
            entry("other", vec![0.5, -0.866]),
        ]);
        let query = [1.0, 0.0];

        let balanced = mmr_select(&index, &query, &[0, 1, 2], 2, 0.5);
        let ids: Vec<&str> = balanced
            .iter()
            .map(|&idx| index.entries()[idx].chunk.id.as_str())
            .collect();
        assert_eq!(ids, vec!["dup1", "other"]);

        // Pure relevance keeps the duplicate instead.
        let relevance_only = mmr_select(&index, &query, &[0, 1, 2], 2, 1.0);
        let ids: Vec<&str> = relevance_only
            .iter()
            .map(|&idx| index.entries()[idx].chunk.id.as_str())
            .collect();
        assert_eq!(ids, vec!["dup1", "dup2"]);
    }
}

//! Index lifecycle: load the persisted index when one exists, otherwise
//! ingest the corpus, embed every chunk, and persist the result.

use std::path::PathBuf;
use std::time::Instant;

use sha2::{Digest, Sha256};

use crate::core::config::Settings;
use crate::core::errors::AgentError;
use crate::llm::LlmService;
use crate::rag::corpus;
use crate::rag::index::{Chunk, IndexEntry, VectorIndex};
use crate::rag::splitter::RecursiveSplitter;
use crate::rag::store::{self, IndexStore};

#[derive(Clone)]
pub struct IndexService {
    llm: LlmService,
    docs_dir: PathBuf,
    docs_extension: String,
    index_path: PathBuf,
    splitter: RecursiveSplitter,
}

impl IndexService {
    pub fn new(llm: LlmService, settings: &Settings, index_path: PathBuf) -> Self {
        Self {
            llm,
            docs_dir: settings.docs_dir.clone(),
            docs_extension: settings.docs_extension.clone(),
            index_path,
            splitter: RecursiveSplitter::new(settings.chunk_size, settings.chunk_overlap),
        }
    }

    /// Return the persisted index when it exists and holds chunks; build
    /// from the corpus otherwise. An unreadable persisted index is logged
    /// and rebuilt rather than crashing the process.
    pub async fn build_or_load(&self) -> Result<VectorIndex, AgentError> {
        if self.index_path.exists() {
            match self.load_existing().await {
                Ok(Some(index)) => {
                    tracing::info!("loaded persisted index with {} chunks", index.len());
                    return Ok(index);
                }
                Ok(None) => {
                    tracing::info!("persisted index is empty, rebuilding");
                }
                Err(err) => {
                    tracing::warn!("persisted index unreadable ({err}), rebuilding");
                }
            }
        }

        self.build().await
    }

    /// Discard any persisted index and build from scratch. Functionally
    /// idempotent: two rebuilds over the same corpus retrieve alike.
    pub async fn rebuild(&self) -> Result<VectorIndex, AgentError> {
        if self.index_path.exists() {
            let _ = std::fs::remove_file(&self.index_path);
        }
        self.build().await
    }

    async fn load_existing(&self) -> Result<Option<VectorIndex>, AgentError> {
        let store = IndexStore::open(&self.index_path).await?;
        if store.count().await? == 0 {
            store.close().await;
            return Ok(None);
        }
        let index = store.load().await?;
        store.close().await;
        Ok(Some(index))
    }

    async fn build(&self) -> Result<VectorIndex, AgentError> {
        let started = Instant::now();

        let documents = corpus::load_documents(&self.docs_dir, &self.docs_extension)?;
        tracing::info!("loaded {} documents from {}", documents.len(), self.docs_dir.display());

        let mut chunks = Vec::new();
        for document in &documents {
            for (position, piece) in self.splitter.split(&document.text).into_iter().enumerate() {
                chunks.push(Chunk {
                    id: chunk_id(&document.source, position, &piece),
                    content: piece,
                    source: document.source.clone(),
                });
            }
        }
        tracing::info!("split corpus into {} chunks", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.llm.embed(&texts).await?;

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        self.persist(&entries).await?;

        tracing::info!(
            "index built: {} chunks in {} ms",
            entries.len(),
            started.elapsed().as_millis()
        );
        Ok(VectorIndex::new(entries))
    }

    /// Write to a `.tmp` sibling, then rename over the live path so a
    /// concurrent loader never sees a half-written index.
    async fn persist(&self, entries: &[IndexEntry]) -> Result<(), AgentError> {
        let tmp_path = self.index_path.with_extension("db.tmp");

        let store = IndexStore::create(&tmp_path).await?;
        store.insert_batch(entries).await?;
        store.close().await;

        store::swap_into_place(&tmp_path, &self.index_path)
    }
}

fn chunk_id(source: &str, position: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(position.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use crate::llm::ModelOptions;

    fn write_corpus(dir: &Path) {
        std::fs::write(
            dir.join("rotina.md"),
            "A rotina essencialista começa eliminando compromissos que não importam.",
        )
        .unwrap();
        std::fs::write(
            dir.join("foco.md"),
            "Foco profundo exige blocos de tempo protegidos no calendário.",
        )
        .unwrap();
    }

    fn service_for(docs_dir: &Path, index_path: &Path) -> (IndexService, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::default());
        let llm = LlmService::new(provider.clone(), ModelOptions::default(), Duration::from_secs(5));
        let settings = Settings {
            docs_dir: docs_dir.to_path_buf(),
            ..Settings::default()
        };
        (IndexService::new(llm, &settings, index_path.to_path_buf()), provider)
    }

    #[tokio::test]
    async fn builds_persists_and_reloads_without_reembedding() {
        let dir = tempfile::tempdir().expect("tempdir");
        let docs_dir = dir.path().join("docs");
        std::fs::create_dir(&docs_dir).unwrap();
        write_corpus(&docs_dir);
        let index_path = dir.path().join("index.db");

        let (service, provider) = service_for(&docs_dir, &index_path);
        let built = service.build_or_load().await.expect("build");
        assert_eq!(built.len(), 2);
        assert!(index_path.exists());
        assert_eq!(provider.embed_call_count(), 1);

        // A fresh service over the same path loads instead of embedding.
        let (service, provider) = service_for(&docs_dir, &index_path);
        let loaded = service.build_or_load().await.expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(provider.embed_call_count(), 0);

        let built_ids: Vec<&str> = built.entries().iter().map(|e| e.chunk.id.as_str()).collect();
        let loaded_ids: Vec<&str> = loaded.entries().iter().map(|e| e.chunk.id.as_str()).collect();
        assert_eq!(built_ids, loaded_ids);
    }

    #[tokio::test]
    async fn rebuild_discards_the_persisted_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let docs_dir = dir.path().join("docs");
        std::fs::create_dir(&docs_dir).unwrap();
        write_corpus(&docs_dir);
        let index_path = dir.path().join("index.db");

        let (service, _) = service_for(&docs_dir, &index_path);
        service.build_or_load().await.expect("build");

        std::fs::write(docs_dir.join("novo.md"), "Um documento novo sobre revisão semanal.").unwrap();

        let (service, provider) = service_for(&docs_dir, &index_path);
        let rebuilt = service.rebuild().await.expect("rebuild");
        assert_eq!(rebuilt.len(), 3);
        assert_eq!(provider.embed_call_count(), 1);
    }

    #[tokio::test]
    async fn empty_corpus_fails_the_build() {
        let dir = tempfile::tempdir().expect("tempdir");
        let docs_dir = dir.path().join("docs");
        std::fs::create_dir(&docs_dir).unwrap();
        let index_path = dir.path().join("index.db");

        let (service, _) = service_for(&docs_dir, &index_path);
        let err = service.build_or_load().await.unwrap_err();
        assert!(matches!(err, AgentError::Corpus(_)));
        assert!(!index_path.exists());
    }

    #[tokio::test]
    async fn corrupt_persisted_index_triggers_a_rebuild() {
        let dir = tempfile::tempdir().expect("tempdir");
        let docs_dir = dir.path().join("docs");
        std::fs::create_dir(&docs_dir).unwrap();
        write_corpus(&docs_dir);
        let index_path = dir.path().join("index.db");
        std::fs::write(&index_path, "definitely not a database").unwrap();

        let (service, provider) = service_for(&docs_dir, &index_path);
        let index = service.build_or_load().await.expect("rebuild after corruption");
        assert_eq!(index.len(), 2);
        assert_eq!(provider.embed_call_count(), 1);
    }
}

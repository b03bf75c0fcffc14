//! Conversation engine: retrieval, prompt assembly, one model call.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::agent::history::ChatHistory;
use crate::agent::prompt;
use crate::core::errors::AgentError;
use crate::llm::LlmService;
use crate::rag::{Chunk, Retriever, VectorIndex};

/// An answer plus the chunks that grounded it, for citation.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub answer: String,
    pub sources: Vec<Chunk>,
}

#[derive(Clone)]
pub struct ConversationEngine {
    llm: LlmService,
    retriever: Retriever,
    index: Arc<RwLock<VectorIndex>>,
}

impl ConversationEngine {
    pub fn new(llm: LlmService, retriever: Retriever, index: Arc<RwLock<VectorIndex>>) -> Self {
        Self {
            llm,
            retriever,
            index,
        }
    }

    /// Answer `question` grounded in the index and the caller's history.
    /// History is read, never mutated; appending the new turn is the
    /// caller's decision, taken only on success. Streaming deltas go to
    /// `observer` when one is given, while this call still blocks for
    /// the aggregate answer.
    pub async fn answer(
        &self,
        question: &str,
        history: &ChatHistory,
        observer: Option<mpsc::Sender<String>>,
    ) -> Result<ChatOutcome, AgentError> {
        let sources = {
            // Holding the read guard across retrieval keeps a rebuild
            // from swapping the index mid-query.
            let index = self.index.read().await;
            self.retriever.retrieve(&index, question).await?
        };

        let messages = prompt::build_messages(&sources, history, question);
        let answer = self.llm.complete(messages, observer).await?;

        Ok(ChatOutcome { answer, sources })
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::agent::{ConversationEngine, Session};
use crate::calendar::{CalendarProvider, RestCalendar, UnconfiguredCalendar};
use crate::core::config::{AppPaths, Settings};
use crate::llm::ollama::OllamaProvider;
use crate::llm::{LlmService, ModelOptions};
use crate::rag::{IndexService, Retriever, VectorIndex};

pub struct AppState {
    pub settings: Arc<Settings>,
    pub paths: Arc<AppPaths>,
    pub index: Arc<RwLock<VectorIndex>>,
    pub index_service: IndexService,
    pub engine: ConversationEngine,
    pub calendar: Arc<dyn CalendarProvider>,
    pub sessions: Mutex<HashMap<String, Session>>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub async fn initialize(paths: Arc<AppPaths>) -> anyhow::Result<Arc<Self>> {
        let settings = Arc::new(Settings::load(&paths)?);
        let request_timeout = Duration::from_secs(settings.request_timeout_secs);

        let provider = OllamaProvider::new(
            settings.ollama_base_url.clone(),
            settings.model.clone(),
            settings.embedding_model.clone(),
            request_timeout,
        )?;
        let options = ModelOptions {
            temperature: settings.temperature,
            top_p: settings.top_p,
            num_ctx: settings.num_ctx,
        };
        let llm = LlmService::new(
            Arc::new(provider),
            options,
            Duration::from_secs(settings.answer_timeout_secs),
        );

        let index_service = IndexService::new(llm.clone(), &settings, paths.index_path.clone());
        let index = Arc::new(RwLock::new(index_service.build_or_load().await?));

        let retriever = Retriever::new(llm.clone(), &settings.retriever);
        let engine = ConversationEngine::new(llm, retriever, index.clone());

        let calendar: Arc<dyn CalendarProvider> = match &settings.calendar_base_url {
            Some(base_url) => Arc::new(RestCalendar::new(base_url.clone(), request_timeout)?),
            None => {
                tracing::warn!("no calendar configured; calendar features are disabled");
                Arc::new(UnconfiguredCalendar)
            }
        };

        Ok(Arc::new(AppState {
            settings,
            paths,
            index,
            index_service,
            engine,
            calendar,
            sessions: Mutex::new(HashMap::new()),
            started_at: Utc::now(),
        }))
    }
}

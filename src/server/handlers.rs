use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::agent::Session;
use crate::core::errors::AgentError;
use crate::state::AppState;

const DEFAULT_SESSION_ID: &str = "default";

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> Result<impl IntoResponse, AgentError> {
    let question = body.question.trim();
    if question.is_empty() {
        return Err(AgentError::BadRequest("question must not be empty".to_string()));
    }

    let session_id = body
        .session_id
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());

    // One turn in flight at a time; each session keeps its own history.
    let mut sessions = state.sessions.lock().await;
    let session = sessions
        .entry(session_id)
        .or_insert_with(|| Session::new(state.engine.clone(), state.calendar.clone()));

    let result = session.process_turn(question).await?;
    Ok(Json(result))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AgentError> {
    let session_id = Uuid::new_v4().to_string();
    state.sessions.lock().await.insert(
        session_id.clone(),
        Session::new(state.engine.clone(), state.calendar.clone()),
    );
    Ok(Json(json!({ "session_id": session_id })))
}

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    #[serde(default)]
    pub days: Option<i64>,
}

pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListEventsQuery>,
) -> Result<impl IntoResponse, AgentError> {
    let events = state.calendar.list_events(query.days.unwrap_or(7)).await?;
    Ok(Json(events))
}

pub async fn rebuild_index(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AgentError> {
    // Built off-lock; retrievals keep hitting the old snapshot until
    // the swap below.
    let rebuilt = state.index_service.rebuild().await?;
    let chunks = rebuilt.len();

    *state.index.write().await = rebuilt;

    tracing::info!("index rebuilt with {chunks} chunks");
    Ok(Json(json!({ "status": "rebuilt", "chunks": chunks })))
}

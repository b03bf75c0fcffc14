use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the assistant core.
///
/// Only a subset of variants is fatal to the operation that raised it:
/// `Corpus` aborts an index build, `ModelInvocation` aborts a single
/// conversation turn. Everything else degrades (placeholder context,
/// structured action failure, rebuild-from-scratch).
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("corpus error: {0}")]
    Corpus(String),
    #[error("index storage error: {0}")]
    IndexIo(String),
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),
    #[error("action dispatch failed: {0}")]
    ActionDispatch(String),
    #[error("calendar unavailable: {0}")]
    ExternalContext(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        AgentError::Internal(err.to_string())
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AgentError::Corpus(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AgentError::IndexIo(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AgentError::ModelInvocation(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AgentError::ActionDispatch(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AgentError::ExternalContext(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AgentError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AgentError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AgentError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

//! Per-turn orchestration.
//!
//! A session owns its history and runs each turn through the fixed
//! pipeline: calendar snapshot → grounded answer → action extraction →
//! dispatch → history append. Only a failed model call aborts a turn;
//! everything else degrades into a user-visible message.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::agent::action::{
    extract_action, AgentAction, DeleteEventParams, EventParams, FreeTimeParams, ListEventsParams,
    SearchEventParams, UpdateEventParams,
};
use crate::agent::engine::ConversationEngine;
use crate::agent::history::{ChatHistory, HISTORY_CAP};
use crate::calendar::{self, CalendarProvider, EventSpec};
use crate::core::errors::AgentError;
use crate::rag::Chunk;

/// Days of calendar lookahead folded into every question.
const CONTEXT_WINDOW_DAYS: i64 = 3;

const CONTEXT_PLACEHOLDER: &str = "Não foi possível obter informações do calendário.";

/// Outcome of one dispatched action, in the shape the user sees.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub sucesso: bool,
    pub mensagem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dados: Option<Value>,
}

impl ActionOutcome {
    fn ok(mensagem: impl Into<String>, dados: Option<Value>) -> Self {
        Self {
            sucesso: true,
            mensagem: mensagem.into(),
            dados,
        }
    }

    fn fail(mensagem: impl Into<String>) -> Self {
        Self {
            sucesso: false,
            mensagem: mensagem.into(),
            dados: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub answer: String,
    pub sources: String,
    pub action_result: Option<ActionOutcome>,
    pub history_size: usize,
}

pub struct Session {
    engine: ConversationEngine,
    calendar: Arc<dyn CalendarProvider>,
    history: ChatHistory,
}

impl Session {
    pub fn new(engine: ConversationEngine, calendar: Arc<dyn CalendarProvider>) -> Self {
        Self {
            engine,
            calendar,
            history: ChatHistory::new(HISTORY_CAP),
        }
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub async fn process_turn(&mut self, question: &str) -> Result<TurnResult, AgentError> {
        let started = Instant::now();

        let calendar_info = self.calendar_context().await;
        let enriched = format!("{question}\n\nInformações do calendário: {calendar_info}");

        // A failed model call aborts the turn; history stays untouched.
        let outcome = self.engine.answer(&enriched, &self.history, None).await?;

        let action_result = match extract_action(&outcome.answer) {
            Some(action) => {
                tracing::info!("dispatching action: {}", action.action_type());
                Some(self.dispatch(action).await)
            }
            None => None,
        };

        self.history.push(question.to_string(), outcome.answer.clone());

        tracing::info!("turn processed in {} ms", started.elapsed().as_millis());
        Ok(TurnResult {
            answer: outcome.answer,
            sources: format_sources(&outcome.sources),
            action_result,
            history_size: self.history.len(),
        })
    }

    async fn calendar_context(&self) -> String {
        match self.calendar.list_events(CONTEXT_WINDOW_DAYS).await {
            Ok(events) => calendar::format_events(&events),
            Err(err) => {
                tracing::warn!("calendar context unavailable: {err}");
                CONTEXT_PLACEHOLDER.to_string()
            }
        }
    }

    /// Exactly one attempt per action; every failure becomes a
    /// structured result instead of a turn failure.
    async fn dispatch(&self, action: AgentAction) -> ActionOutcome {
        let result = match action {
            AgentAction::ListEvents(params) => self.list_events(params).await,
            AgentAction::SearchEvent(params) => self.search_event(params).await,
            AgentAction::CreateEvent(params) => self.create_event(params).await,
            AgentAction::UpdateEvent(params) => self.update_event(params).await,
            AgentAction::DeleteEvent(params) => self.delete_event(params).await,
            AgentAction::AnalyzeFreeTime(params) => self.analyze_free_time(params).await,
        };

        result.unwrap_or_else(|err| {
            tracing::warn!("action failed: {err}");
            ActionOutcome::fail(format!("Erro ao executar ação: {err}"))
        })
    }

    async fn list_events(&self, params: ListEventsParams) -> Result<ActionOutcome, AgentError> {
        let events = self.calendar.list_events(params.dias).await?;
        Ok(ActionOutcome::ok(
            format!(
                "Encontrados {} eventos para os próximos {} dias.",
                events.len(),
                params.dias
            ),
            Some(json!(calendar::format_events(&events))),
        ))
    }

    async fn search_event(&self, params: SearchEventParams) -> Result<ActionOutcome, AgentError> {
        let events = self.calendar.search_events(&params.query).await?;
        Ok(ActionOutcome::ok(
            format!(
                "Encontrados {} eventos para a busca '{}'.",
                events.len(),
                params.query
            ),
            Some(json!(calendar::format_events(&events))),
        ))
    }

    async fn create_event(&self, params: EventParams) -> Result<ActionOutcome, AgentError> {
        let spec = event_spec(&params)?;
        match self.calendar.create_event(&spec).await? {
            Some(created) => Ok(ActionOutcome::ok(
                format!("Evento '{}' criado com sucesso.", spec.summary),
                Some(json!(created)),
            )),
            None => Ok(ActionOutcome::fail("Falha ao criar o evento.")),
        }
    }

    async fn update_event(&self, params: UpdateEventParams) -> Result<ActionOutcome, AgentError> {
        let spec = event_spec(&params.event)?;
        match self.calendar.update_event(&params.event_id, &spec).await? {
            Some(updated) => Ok(ActionOutcome::ok(
                format!("Evento '{}' atualizado com sucesso.", spec.summary),
                Some(json!(updated)),
            )),
            None => Ok(ActionOutcome::fail("Falha ao atualizar o evento.")),
        }
    }

    async fn delete_event(&self, params: DeleteEventParams) -> Result<ActionOutcome, AgentError> {
        if self.calendar.delete_event(&params.event_id).await? {
            Ok(ActionOutcome::ok("Evento excluído com sucesso.", None))
        } else {
            Ok(ActionOutcome::fail("Falha ao excluir o evento."))
        }
    }

    async fn analyze_free_time(&self, params: FreeTimeParams) -> Result<ActionOutcome, AgentError> {
        let window_start = Utc::now();
        let window_end = window_start + Duration::days(params.dias);

        let events = self.calendar.list_events(params.dias).await?;
        let slots = calendar::free_slots(&events, window_start, window_end, params.duracao_minima);

        if slots.is_empty() {
            return Ok(ActionOutcome::ok(
                "Não foram encontrados períodos livres com a duração mínima especificada.",
                None,
            ));
        }

        Ok(ActionOutcome::ok(
            format!("Encontrados {} períodos livres.", slots.len()),
            Some(json!(calendar::format_free_slots(&slots))),
        ))
    }
}

fn event_spec(params: &EventParams) -> Result<EventSpec, AgentError> {
    Ok(EventSpec {
        summary: params.summary.clone(),
        description: params.description.clone(),
        location: params.location.clone(),
        start: parse_timestamp(&params.start)?,
        end: parse_timestamp(&params.end)?,
        attendees: params.attendees.clone(),
        reminders: params.reminders.clone(),
    })
}

/// Accept RFC 3339 as emitted by well-behaved models, plus the naive
/// `YYYY-MM-DDTHH:MM[:SS]` form (interpreted as UTC) they often produce.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AgentError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed.and_utc());
        }
    }

    Err(AgentError::ActionDispatch(format!("data/hora inválida: '{raw}'")))
}

fn format_sources(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return "Nenhuma fonte específica.".to_string();
    }

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let name = chunk.source.rsplit(['/', '\\']).next().unwrap_or(&chunk.source);
            format!("{}. {}", i + 1, name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_parse_with_and_without_timezone() {
        assert!(parse_timestamp("2026-08-10T09:00:00-03:00").is_ok());
        assert!(parse_timestamp("2026-08-10T09:00:00").is_ok());
        assert!(parse_timestamp("2026-08-10T09:00").is_ok());

        let err = parse_timestamp("amanhã de manhã").unwrap_err();
        assert!(matches!(err, AgentError::ActionDispatch(_)));
    }

    #[test]
    fn sources_are_numbered_file_names() {
        let chunks = vec![
            Chunk {
                id: "1".into(),
                content: "a".into(),
                source: "pasta/notas.md".into(),
            },
            Chunk {
                id: "2".into(),
                content: "b".into(),
                source: "rotina.md".into(),
            },
        ];
        assert_eq!(format_sources(&chunks), "1. notas.md\n2. rotina.md");
        assert_eq!(format_sources(&[]), "Nenhuma fonte específica.");
    }
}

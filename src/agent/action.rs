//! Structured calendar commands embedded in model answers.
//!
//! The model is instructed to wrap the payload in `<action> … </action>`.
//! Extraction prefers that span and otherwise scans the answer for
//! top-level balanced `{…}` spans with a string-aware depth counter, so
//! nested parameter objects and stray braces in prose both survive. A
//! span only counts when it deserializes into a known action with its
//! required parameters; anything else is "no action", never an error.

use serde::Deserialize;
use serde_json::Value;

const ACTION_OPEN: &str = "<action>";
const ACTION_CLOSE: &str = "</action>";

fn default_window_days() -> i64 {
    7
}

fn default_min_duration() -> i64 {
    30
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListEventsParams {
    #[serde(default = "default_window_days", alias = "window_days")]
    pub dias: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchEventParams {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventParams {
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// ISO-8601; converted to a timestamp at dispatch time.
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub reminders: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateEventParams {
    pub event_id: String,
    #[serde(flatten)]
    pub event: EventParams,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeleteEventParams {
    pub event_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FreeTimeParams {
    #[serde(default = "default_window_days", alias = "window_days")]
    pub dias: i64,
    #[serde(default = "default_min_duration", alias = "min_duration_minutes")]
    pub duracao_minima: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentAction {
    ListEvents(ListEventsParams),
    SearchEvent(SearchEventParams),
    CreateEvent(EventParams),
    UpdateEvent(UpdateEventParams),
    DeleteEvent(DeleteEventParams),
    AnalyzeFreeTime(FreeTimeParams),
}

impl AgentAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            AgentAction::ListEvents(_) => "list_events",
            AgentAction::SearchEvent(_) => "search_event",
            AgentAction::CreateEvent(_) => "create_event",
            AgentAction::UpdateEvent(_) => "update_event",
            AgentAction::DeleteEvent(_) => "delete_event",
            AgentAction::AnalyzeFreeTime(_) => "analyze_free_time",
        }
    }

    /// Typed view of `{"action_type": ..., "params": {...}}`. Unknown
    /// types and missing required parameters yield `None`.
    pub fn from_value(value: &Value) -> Option<AgentAction> {
        let action_type = value.get("action_type")?.as_str()?;
        let params = value
            .get("params")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        match action_type {
            "list_events" => serde_json::from_value(params).ok().map(AgentAction::ListEvents),
            "search_event" => serde_json::from_value(params).ok().map(AgentAction::SearchEvent),
            "create_event" => serde_json::from_value(params).ok().map(AgentAction::CreateEvent),
            "update_event" => serde_json::from_value(params).ok().map(AgentAction::UpdateEvent),
            "delete_event" => serde_json::from_value(params).ok().map(AgentAction::DeleteEvent),
            "analyze_free_time" => {
                serde_json::from_value(params).ok().map(AgentAction::AnalyzeFreeTime)
            }
            _ => None,
        }
    }
}

/// Extract the first parseable action from a model answer.
pub fn extract_action(answer: &str) -> Option<AgentAction> {
    if let Some(span) = tagged_span(answer) {
        if let Some(action) = parse_span(span) {
            return Some(action);
        }
    }

    brace_spans(answer).into_iter().find_map(parse_span)
}

fn parse_span(span: &str) -> Option<AgentAction> {
    let value = serde_json::from_str::<Value>(span.trim()).ok()?;
    AgentAction::from_value(&value)
}

fn tagged_span(text: &str) -> Option<&str> {
    let start = text.find(ACTION_OPEN)? + ACTION_OPEN.len();
    let end = text[start..].find(ACTION_CLOSE)? + start;
    Some(&text[start..end])
}

/// All top-level balanced `{…}` spans, left to right. Braces inside
/// JSON string literals are ignored.
fn brace_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut span_start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (pos, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    span_start = pos;
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        spans.push(&text[span_start..pos + ch.len_utf8()]);
                    }
                }
            }
            _ => {}
        }
    }

    spans
}

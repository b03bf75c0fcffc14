//! Calendar collaborator boundary.
//!
//! The core consumes the [`CalendarProvider`] trait; free-time analysis
//! and the user-facing pt-BR formatting are computed here so the
//! provider only has to list and mutate events.

pub mod http;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::errors::AgentError;

pub use http::RestCalendar;
pub use types::{EventRecord, EventSpec, FreeSlot};

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Upcoming events within the next `days` days, ordered by start.
    async fn list_events(&self, days: i64) -> Result<Vec<EventRecord>, AgentError>;

    /// Text search over a fixed 30-day lookahead window.
    async fn search_events(&self, query: &str) -> Result<Vec<EventRecord>, AgentError>;

    /// `None` means the provider rejected the event.
    async fn create_event(&self, spec: &EventSpec) -> Result<Option<EventRecord>, AgentError>;

    async fn update_event(
        &self,
        event_id: &str,
        spec: &EventSpec,
    ) -> Result<Option<EventRecord>, AgentError>;

    async fn delete_event(&self, event_id: &str) -> Result<bool, AgentError>;
}

/// Placeholder provider used when no calendar is configured. Reads fail
/// so callers degrade the same way they would for an unreachable
/// provider; writes are rejected.
pub struct UnconfiguredCalendar;

#[async_trait]
impl CalendarProvider for UnconfiguredCalendar {
    async fn list_events(&self, _days: i64) -> Result<Vec<EventRecord>, AgentError> {
        Err(AgentError::ExternalContext("calendar not configured".to_string()))
    }

    async fn search_events(&self, _query: &str) -> Result<Vec<EventRecord>, AgentError> {
        Err(AgentError::ExternalContext("calendar not configured".to_string()))
    }

    async fn create_event(&self, _spec: &EventSpec) -> Result<Option<EventRecord>, AgentError> {
        Ok(None)
    }

    async fn update_event(
        &self,
        _event_id: &str,
        _spec: &EventSpec,
    ) -> Result<Option<EventRecord>, AgentError> {
        Ok(None)
    }

    async fn delete_event(&self, _event_id: &str) -> Result<bool, AgentError> {
        Ok(false)
    }
}

/// Gaps of at least `min_minutes` between consecutive events inside
/// [`window_start`, `window_end`], including the stretch before the
/// first event and after the last one. Overlapping events collapse into
/// their envelope.
pub fn free_slots(
    events: &[EventRecord],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    min_minutes: i64,
) -> Vec<FreeSlot> {
    let mut sorted: Vec<&EventRecord> = events.iter().collect();
    sorted.sort_by_key(|event| event.start);

    let mut slots = Vec::new();
    let mut cursor = window_start;

    for event in sorted {
        if event.end <= cursor {
            continue;
        }
        let gap_end = event.start.min(window_end);
        if (gap_end - cursor).num_minutes() >= min_minutes {
            slots.push(FreeSlot {
                start: cursor,
                end: gap_end,
            });
        }
        cursor = cursor.max(event.end);
        if cursor >= window_end {
            return slots;
        }
    }

    if (window_end - cursor).num_minutes() >= min_minutes {
        slots.push(FreeSlot {
            start: cursor,
            end: window_end,
        });
    }

    slots
}

/// User-facing listing, one numbered block per event.
pub fn format_events(events: &[EventRecord]) -> String {
    if events.is_empty() {
        return "Nenhum evento encontrado para o período.".to_string();
    }

    events
        .iter()
        .enumerate()
        .map(|(i, event)| format!("Evento {}:\n{}\n", i + 1, format_event(event)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_event(event: &EventRecord) -> String {
    format!(
        "Título: {}\nQuando: {} até {}\nLocal: {}\nDescrição: {}",
        event.summary,
        event.start.format("%d/%m/%Y %H:%M"),
        event.end.format("%d/%m/%Y %H:%M"),
        event.location.as_deref().unwrap_or("Não especificado"),
        event.description.as_deref().unwrap_or("Sem descrição"),
    )
}

pub fn format_free_slots(slots: &[FreeSlot]) -> String {
    slots
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            format!(
                "Período {}: {} até {} (duração: {} minutos)",
                i + 1,
                slot.start.format("%d/%m/%Y %H:%M"),
                slot.end.format("%d/%m/%Y %H:%M"),
                slot.duration_minutes(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 10, hour, minute, 0).unwrap()
    }

    fn event(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> EventRecord {
        EventRecord {
            id: id.to_string(),
            summary: format!("Evento {id}"),
            description: None,
            location: None,
            start,
            end,
            attendees: Vec::new(),
        }
    }

    #[test]
    fn gaps_include_before_first_and_after_last_event() {
        let events = vec![
            event("a", at(9, 0), at(10, 0)),
            event("b", at(14, 0), at(15, 0)),
        ];

        let slots = free_slots(&events, at(8, 0), at(18, 0), 30);
        assert_eq!(
            slots,
            vec![
                FreeSlot { start: at(8, 0), end: at(9, 0) },
                FreeSlot { start: at(10, 0), end: at(14, 0) },
                FreeSlot { start: at(15, 0), end: at(18, 0) },
            ]
        );
    }

    #[test]
    fn short_gaps_are_filtered_out() {
        let events = vec![
            event("a", at(9, 0), at(10, 0)),
            event("b", at(10, 20), at(11, 0)),
        ];

        let slots = free_slots(&events, at(9, 0), at(11, 0), 30);
        assert!(slots.is_empty());
    }

    #[test]
    fn overlapping_events_collapse() {
        let events = vec![
            event("a", at(9, 0), at(11, 0)),
            event("b", at(10, 0), at(10, 30)),
        ];

        let slots = free_slots(&events, at(8, 0), at(12, 0), 30);
        assert_eq!(
            slots,
            vec![
                FreeSlot { start: at(8, 0), end: at(9, 0) },
                FreeSlot { start: at(11, 0), end: at(12, 0) },
            ]
        );
    }

    #[test]
    fn empty_calendar_is_one_big_slot() {
        let slots = free_slots(&[], at(8, 0), at(18, 0), 30);
        assert_eq!(slots, vec![FreeSlot { start: at(8, 0), end: at(18, 0) }]);
    }

    #[test]
    fn events_are_formatted_in_ptbr() {
        let events = vec![event("reuniao", at(9, 0), at(10, 0))];
        let formatted = format_events(&events);
        assert!(formatted.starts_with("Evento 1:"));
        assert!(formatted.contains("Título: Evento reuniao"));
        assert!(formatted.contains("Quando: 10/08/2026 09:00 até 10/08/2026 10:00"));
        assert!(formatted.contains("Local: Não especificado"));

        assert_eq!(format_events(&[]), "Nenhum evento encontrado para o período.");
    }

    #[test]
    fn free_slots_are_formatted_with_duration() {
        let slots = vec![FreeSlot { start: at(8, 0), end: at(9, 30) }];
        let formatted = format_free_slots(&slots);
        assert!(formatted.contains("Período 1:"));
        assert!(formatted.contains("duração: 90 minutos"));
    }
}

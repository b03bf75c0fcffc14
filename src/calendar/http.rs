//! REST-backed calendar provider.
//!
//! Interface-boundary glue: each trait operation maps to one request
//! against the configured API root. Transport failures surface as
//! errors for the caller to degrade on; a rejection status on a write
//! is reported as "no result", matching the trait contract.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::types::{EventRecord, EventSpec};
use super::CalendarProvider;
use crate::core::errors::AgentError;

/// Lookahead used by text search.
const SEARCH_WINDOW_DAYS: i64 = 30;

#[derive(Clone)]
pub struct RestCalendar {
    base_url: String,
    client: Client,
}

impl RestCalendar {
    pub fn new(base_url: String, request_timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(AgentError::internal)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn provider_error(context: &str, err: impl std::fmt::Display) -> AgentError {
    AgentError::ExternalContext(format!("{context}: {err}"))
}

#[async_trait]
impl CalendarProvider for RestCalendar {
    async fn list_events(&self, days: i64) -> Result<Vec<EventRecord>, AgentError> {
        let res = self
            .client
            .get(self.url("/events"))
            .query(&[("days", days)])
            .send()
            .await
            .map_err(|err| provider_error("calendar list failed", err))?;

        if !res.status().is_success() {
            return Err(provider_error("calendar list rejected", res.status()));
        }

        res.json()
            .await
            .map_err(|err| provider_error("invalid calendar response", err))
    }

    async fn search_events(&self, query: &str) -> Result<Vec<EventRecord>, AgentError> {
        let res = self
            .client
            .get(self.url("/events/search"))
            .query(&[("query", query)])
            .query(&[("days", SEARCH_WINDOW_DAYS)])
            .send()
            .await
            .map_err(|err| provider_error("calendar search failed", err))?;

        if !res.status().is_success() {
            return Err(provider_error("calendar search rejected", res.status()));
        }

        res.json()
            .await
            .map_err(|err| provider_error("invalid calendar response", err))
    }

    async fn create_event(&self, spec: &EventSpec) -> Result<Option<EventRecord>, AgentError> {
        let res = self
            .client
            .post(self.url("/events"))
            .json(spec)
            .send()
            .await
            .map_err(|err| provider_error("calendar create failed", err))?;

        if !res.status().is_success() {
            tracing::warn!("calendar rejected create: {}", res.status());
            return Ok(None);
        }

        let record = res
            .json()
            .await
            .map_err(|err| provider_error("invalid calendar response", err))?;
        Ok(Some(record))
    }

    async fn update_event(
        &self,
        event_id: &str,
        spec: &EventSpec,
    ) -> Result<Option<EventRecord>, AgentError> {
        let res = self
            .client
            .put(self.url(&format!("/events/{event_id}")))
            .json(spec)
            .send()
            .await
            .map_err(|err| provider_error("calendar update failed", err))?;

        if !res.status().is_success() {
            tracing::warn!("calendar rejected update of {event_id}: {}", res.status());
            return Ok(None);
        }

        let record = res
            .json()
            .await
            .map_err(|err| provider_error("invalid calendar response", err))?;
        Ok(Some(record))
    }

    async fn delete_event(&self, event_id: &str) -> Result<bool, AgentError> {
        let res = self
            .client
            .delete(self.url(&format!("/events/{event_id}")))
            .send()
            .await
            .map_err(|err| provider_error("calendar delete failed", err))?;

        Ok(res.status().is_success())
    }
}

//! Calendar adapter — upcoming events inside a fixed window.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::credentials::CredentialStore;
use crate::types::{CandidateItem, SourceMetadata, TriageSource};

use super::{FetchOutcome, SourceError};

/// How far ahead the adapter looks for events.
pub const CALENDAR_WINDOW_DAYS: i64 = 7;

/// An upcoming event as the provider reports it.
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    pub id: String,
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// The calendar provider capability.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn list_upcoming(
        &self,
        token: &str,
        window_days: i64,
    ) -> Result<Vec<ProviderEvent>, SourceError>;
}

pub struct CalendarAdapter {
    provider: Arc<dyn CalendarSource>,
    credentials: Arc<dyn CredentialStore>,
}

impl CalendarAdapter {
    pub fn new(provider: Arc<dyn CalendarSource>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            provider,
            credentials,
        }
    }

    pub async fn fetch(&self, user_id: &str) -> FetchOutcome {
        let Some(token) = self
            .credentials
            .token(user_id, TriageSource::Calendar.as_str())
        else {
            return FetchOutcome::failed(SourceError::NotConnected);
        };

        match self
            .provider
            .list_upcoming(&token, CALENDAR_WINDOW_DAYS)
            .await
        {
            Ok(events) => {
                log::debug!("calendar sync: {} upcoming event(s) for {user_id}", events.len());
                FetchOutcome::ok(events.into_iter().map(normalize).collect())
            }
            Err(e) => FetchOutcome::failed(e),
        }
    }
}

fn normalize(event: ProviderEvent) -> CandidateItem {
    CandidateItem {
        source: TriageSource::Calendar,
        source_id: event.id,
        title: event.summary,
        snippet: event.description.unwrap_or_default(),
        metadata: SourceMetadata::Event {
            start_time: event.start_time,
            location: event.location,
        },
    }
}

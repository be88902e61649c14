//! Secondary-task-list adapter — incomplete items from the user's side list.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::credentials::CredentialStore;
use crate::types::{CandidateItem, SourceMetadata, TriageSource};

use super::{FetchOutcome, SourceError};

/// An incomplete list item as the provider reports it.
#[derive(Debug, Clone)]
pub struct ProviderListItem {
    pub id: String,
    pub title: String,
    pub due: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// The secondary-list provider capability.
#[async_trait]
pub trait ListSource: Send + Sync {
    async fn list_incomplete(&self, token: &str) -> Result<Vec<ProviderListItem>, SourceError>;
}

pub struct SecondaryListAdapter {
    provider: Arc<dyn ListSource>,
    credentials: Arc<dyn CredentialStore>,
}

impl SecondaryListAdapter {
    pub fn new(provider: Arc<dyn ListSource>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            provider,
            credentials,
        }
    }

    pub async fn fetch(&self, user_id: &str) -> FetchOutcome {
        let Some(token) = self
            .credentials
            .token(user_id, TriageSource::SecondaryList.as_str())
        else {
            return FetchOutcome::failed(SourceError::NotConnected);
        };

        match self.provider.list_incomplete(&token).await {
            Ok(items) => {
                log::debug!("list sync: {} incomplete item(s) for {user_id}", items.len());
                FetchOutcome::ok(items.into_iter().map(normalize).collect())
            }
            Err(e) => FetchOutcome::failed(e),
        }
    }
}

fn normalize(item: ProviderListItem) -> CandidateItem {
    CandidateItem {
        source: TriageSource::SecondaryList,
        source_id: item.id,
        title: item.title,
        snippet: item.notes.clone().unwrap_or_default(),
        metadata: SourceMetadata::ListItem {
            due: item.due,
            notes: item.notes,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeListSource {
        result: Result<Vec<ProviderListItem>, SourceError>,
    }

    #[async_trait]
    impl ListSource for FakeListSource {
        async fn list_incomplete(&self, _token: &str) -> Result<Vec<ProviderListItem>, SourceError> {
            self.result.clone()
        }
    }

    struct FakeCredentials {
        connected: bool,
    }

    impl CredentialStore for FakeCredentials {
        fn token(&self, _user_id: &str, _provider: &str) -> Option<String> {
            self.connected.then(|| "tok".to_string())
        }
    }

    #[tokio::test]
    async fn test_normalizes_incomplete_items() {
        let adapter = SecondaryListAdapter::new(
            Arc::new(FakeListSource {
                result: Ok(vec![ProviderListItem {
                    id: "l1".to_string(),
                    title: "Renew passport".to_string(),
                    due: None,
                    notes: Some("bring photos".to_string()),
                }]),
            }),
            Arc::new(FakeCredentials { connected: true }),
        );

        let outcome = adapter.fetch("u1").await;
        assert!(outcome.error.is_none());
        let item = &outcome.items[0];
        assert_eq!(item.source, TriageSource::SecondaryList);
        assert_eq!(item.snippet, "bring photos");
        match &item.metadata {
            SourceMetadata::ListItem { notes, .. } => {
                assert_eq!(notes.as_deref(), Some("bring photos"));
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_credential_is_not_connected() {
        let adapter = SecondaryListAdapter::new(
            Arc::new(FakeListSource { result: Ok(vec![]) }),
            Arc::new(FakeCredentials { connected: false }),
        );
        let outcome = adapter.fetch("u1").await;
        assert!(matches!(outcome.error, Some(SourceError::NotConnected)));
    }

    #[tokio::test]
    async fn test_provider_failure_is_captured() {
        let adapter = SecondaryListAdapter::new(
            Arc::new(FakeListSource {
                result: Err(SourceError::Transient("reset by peer".to_string())),
            }),
            Arc::new(FakeCredentials { connected: true }),
        );
        let outcome = adapter.fetch("u1").await;
        assert!(matches!(outcome.error, Some(SourceError::Transient(_))));
    }
}

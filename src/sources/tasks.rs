//! Task-manager adapter — one bounded fetch of the user's active tasks.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::credentials::CredentialStore;
use crate::types::{CandidateItem, SourceMetadata, TriageSource};

use super::{FetchOutcome, SourceError};

/// An active task as the provider reports it.
#[derive(Debug, Clone)]
pub struct ProviderTask {
    pub id: String,
    pub title: String,
    /// 1 (normal) through 4 (urgent); anything else scores as normal.
    pub priority: i64,
    pub due_date: Option<NaiveDate>,
    pub project: Option<String>,
    pub notes: Option<String>,
}

/// The task-manager provider capability.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn list_active_tasks(&self, token: &str) -> Result<Vec<ProviderTask>, SourceError>;
}

pub struct TaskManagerAdapter {
    provider: Arc<dyn TaskSource>,
    credentials: Arc<dyn CredentialStore>,
}

impl TaskManagerAdapter {
    pub fn new(provider: Arc<dyn TaskSource>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            provider,
            credentials,
        }
    }

    pub async fn fetch(&self, user_id: &str) -> FetchOutcome {
        let Some(token) = self
            .credentials
            .token(user_id, TriageSource::TaskManager.as_str())
        else {
            return FetchOutcome::failed(SourceError::NotConnected);
        };

        match self.provider.list_active_tasks(&token).await {
            Ok(tasks) => {
                log::debug!("task sync: {} active task(s) for {user_id}", tasks.len());
                FetchOutcome::ok(tasks.into_iter().map(normalize).collect())
            }
            Err(e) => FetchOutcome::failed(e),
        }
    }
}

fn normalize(task: ProviderTask) -> CandidateItem {
    CandidateItem {
        source: TriageSource::TaskManager,
        source_id: task.id,
        title: task.title,
        snippet: task.notes.unwrap_or_default(),
        metadata: SourceMetadata::Task {
            priority: task.priority,
            due_date: task.due_date,
            project: task.project,
        },
    }
}

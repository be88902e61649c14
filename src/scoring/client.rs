//! HTTP client for the urgency-scoring capability.
//!
//! Posts `{model, prompt}` to the configured endpoint with bearer auth and
//! returns the raw completion text. 429 maps to `ModelError::RateLimited` so
//! the batch scorer can skip the item without aborting the run.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ScoringConfig;

use super::semantic::{ModelError, UrgencyModel};

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    completion: String,
}

pub struct HttpUrgencyModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpUrgencyModel {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl UrgencyModel for HttpUrgencyModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;
        let status = resp.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let message = resp.text().await.unwrap_or_default();
            return Err(ModelError::RateLimited(message));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CompletionResponse = resp.json().await?;
        Ok(parsed.completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_response_deserialization() {
        let json = r#"{"completion": "{\"score\": 70, \"reasoning\": \"deadline\"}"}"#;
        let parsed: CompletionResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.completion.contains("70"));
    }

    #[test]
    fn test_completion_response_missing_field_defaults_empty() {
        let parsed: CompletionResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.completion.is_empty());
    }
}

//! Crate configuration — collaborator wiring, not behavior.
//!
//! Loaded from `~/.dayboard/config.json`. Behavioral constants (admission
//! threshold, batch sizes) live in code; the config file only carries what
//! differs between installs: where the database lives and how to reach the
//! urgency model.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level config file shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Override for the database path; defaults to `~/.dayboard/dayboard.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

/// Wiring for the external urgency-scoring capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8787/v1/score".to_string()
}

fn default_model() -> String {
    "urgency-small".to_string()
}

/// Load config from `~/.dayboard/config.json`; absent file yields defaults.
pub fn load_config() -> Result<Config, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    let config_path = home.join(".dayboard").join("config.json");

    if !config_path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&config_path)
        .map_err(|e| format!("Failed to read config: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

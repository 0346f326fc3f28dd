//! Typed view over the merged YAML configuration.
//!
//! Every field has a default so an empty `config.yml` (or none at all) yields a
//! working local setup: Ollama on its default port and a vector search service
//! on `localhost:8000`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub retrieval: RetrievalSettings,
    pub history: HistorySettings,
    pub prompts: PromptSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: defaults::SERVER_PORT,
            cors_allowed_origins: defaults::local_origins(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub generation_timeout_secs: u64,
    pub rewrite_timeout_secs: u64,
    pub generation_temperature: Option<f32>,
    /// Drop `<think>` blocks emitted by reasoning models.
    pub strip_reasoning: bool,
}

impl LlmSettings {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn rewrite_timeout(&self) -> Duration {
        Duration::from_secs(self.rewrite_timeout_secs)
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "deepseek-r1:7b".to_string(),
            generation_timeout_secs: 60,
            rewrite_timeout_secs: 30,
            generation_temperature: None,
            strip_reasoning: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub base_url: String,
    pub collection: String,
    pub n_results: usize,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

impl RetrievalSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            collection: "FAQ".to_string(),
            n_results: defaults::RESULT_COUNT,
            timeout_secs: 10,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// How many trailing messages the query rewriter sees.
    pub rewrite_window: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            rewrite_window: defaults::REWRITE_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub answer_template: Option<String>,
    pub rewrite_template: Option<String>,
}

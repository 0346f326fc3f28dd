use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use super::provider::LlmProvider;
use super::types::{
    GenerateRequest, LlmError, OllamaGenerateBody, OllamaGenerateResponse, OllamaOptions,
    OllamaTagsResponse,
};
use crate::core::config::LlmSettings;

const TAGS_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for an Ollama-compatible `/api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    strip_reasoning: bool,
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            strip_reasoning: false,
            client: Client::new(),
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(settings.base_url.clone(), settings.model.clone())
            .with_strip_reasoning(settings.strip_reasoning)
    }

    pub fn with_strip_reasoning(mut self, enabled: bool) -> Self {
        self.strip_reasoning = enabled;
        self
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(
        &self,
        request: GenerateRequest,
        timeout: Duration,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateBody {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        let res = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: OllamaGenerateResponse = res.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(timeout)
            } else {
                LlmError::InvalidResponse(e.to_string())
            }
        })?;

        let text = payload
            .response
            .ok_or_else(|| LlmError::InvalidResponse("missing 'response' field".to_string()))?;

        let text = if self.strip_reasoning {
            strip_reasoning_blocks(&text)
        } else {
            text
        };
        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponse("empty response".to_string()));
        }
        Ok(text)
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let res = self
            .client
            .get(&url)
            .timeout(TAGS_TIMEOUT)
            .send()
            .await
            .map_err(|e| map_transport_error(e, TAGS_TIMEOUT))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let tags: OllamaTagsResponse = res
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

fn map_transport_error(err: reqwest::Error, timeout: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::Request(err.to_string())
    }
}

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Removes `<think>…</think>` reasoning emitted ahead of the actual answer.
///
/// Some chat templates open the block implicitly, so a dangling `</think>`
/// discards everything before it. A block that never closes (output cut at the
/// token limit) discards everything after its opening tag.
pub fn strip_reasoning_blocks(text: &str) -> String {
    let without_blocks = THINK_BLOCK.replace_all(text, "");
    let answer = match without_blocks.rfind(THINK_CLOSE) {
        Some(idx) => &without_blocks[idx + THINK_CLOSE.len()..],
        None => without_blocks.as_ref(),
    };
    let answer = match answer.find(THINK_OPEN) {
        Some(idx) => &answer[..idx],
        None => answer,
    };
    answer.trim().to_string()
}

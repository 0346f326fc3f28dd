use std::time::Duration;

use async_trait::async_trait;

use super::types::{GenerateRequest, LlmError};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// single non-streaming completion, bounded by `timeout`
    async fn generate(
        &self,
        request: GenerateRequest,
        timeout: Duration,
    ) -> Result<String, LlmError>;

    /// names of the models the service can serve
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

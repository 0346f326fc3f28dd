use async_trait::async_trait;

use super::model::{Message, Session, SessionSummary};
use crate::core::errors::ApiError;

/// Persistence for conversation transcripts, keyed by session id.
///
/// Appends are atomic per call: concurrent appends never lose a message and the
/// messages of one call stay contiguous and in order.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates a session seeded with `initial_messages` and returns its new id.
    async fn create(
        &self,
        initial_messages: Vec<Message>,
        escalated: bool,
    ) -> Result<String, ApiError>;

    /// Appends `messages` in order. `escalate = true` sets the flag; `false`
    /// leaves it as it was. Unknown ids are `ApiError::NotFound`.
    async fn append(
        &self,
        session_id: &str,
        messages: Vec<Message>,
        escalate: bool,
    ) -> Result<(), ApiError>;

    async fn get(&self, session_id: &str) -> Result<Option<Session>, ApiError>;

    /// The last `limit` messages in chronological order; empty for unknown ids.
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Message>, ApiError>;

    /// Most recently updated first.
    async fn list(&self) -> Result<Vec<SessionSummary>, ApiError>;

    async fn clear_escalation(&self, session_id: &str) -> Result<(), ApiError>;
}

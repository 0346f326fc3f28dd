//! Conversation transcripts.
//!
//! Sessions are created on the first turn of a conversation and only ever grow;
//! nothing in this crate deletes them.

mod model;
mod sqlite;
mod store;

pub use model::{now_timestamp, Message, Role, Session, SessionSummary};
pub use sqlite::SqliteSessionStore;
pub use store::SessionStore;

use crate::core::errors::ApiError;

pub const ESCALATION_NOTICE: &str = "Session escalated to human support.";

/// Hands a session over to human support: records a system notice and sets the
/// escalation flag in the same append.
pub async fn escalate_session(store: &dyn SessionStore, session_id: &str) -> Result<(), ApiError> {
    store
        .append(session_id, vec![Message::system(ESCALATION_NOTICE)], true)
        .await?;
    tracing::info!(session_id = %session_id, "Session escalated to human support");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn escalate_appends_notice_and_sets_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::new(dir.path().join("s.db")).await.unwrap();
        let id = store.create(vec![Message::user("q")], false).await.unwrap();

        escalate_session(&store, &id).await.unwrap();

        let session = store.get(&id).await.unwrap().unwrap();
        assert!(session.escalated);
        let last = session.messages.last().unwrap();
        assert_eq!(last.role, Role::System);
        assert_eq!(last.content, ESCALATION_NOTICE);
    }

    #[tokio::test]
    async fn escalating_unknown_session_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::new(dir.path().join("s.db")).await.unwrap();

        let err = escalate_session(&store, "nope").await.unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
    }
}

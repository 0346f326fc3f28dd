//! SQLite-backed session store.
//!
//! Messages live in their own table; the AUTOINCREMENT id is the transcript
//! order. Every append runs in one transaction that first touches the session
//! row, so writers to the same session are serialized by SQLite's write lock.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};

use super::model::{now_timestamp, Message, Role, Session, SessionSummary};
use super::store::SessionStore;
use crate::core::errors::ApiError;

const LIST_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to session db: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                escalated INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init sessions table: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                context_used TEXT,
                retrieval_query TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init messages table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages(session_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create index: {}", e)))?;

        Ok(())
    }

    async fn insert_messages(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        session_id: &str,
        messages: &[Message],
    ) -> Result<(), ApiError> {
        for message in messages {
            sqlx::query(
                "INSERT INTO messages (session_id, role, content, context_used, retrieval_query, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(session_id)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(&message.context_used)
            .bind(&message.retrieval_query)
            .bind(&message.created_at)
            .execute(&mut **tx)
            .await
            .map_err(ApiError::internal)?;
        }
        Ok(())
    }

    async fn fetch_messages(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, ApiError> {
        let rows = match limit {
            Some(limit) => sqlx::query(
                "SELECT * FROM (SELECT * FROM messages WHERE session_id = ? ORDER BY id DESC LIMIT ?) \
                 ORDER BY id ASC",
            )
            .bind(session_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?,
            None => sqlx::query("SELECT * FROM messages WHERE session_id = ? ORDER BY id ASC")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await
                .map_err(ApiError::internal)?,
        };

        rows.iter().map(row_to_message).collect()
    }
}

fn row_to_message(row: &SqliteRow) -> Result<Message, ApiError> {
    let role: String = row.try_get("role").map_err(ApiError::internal)?;
    let role = Role::parse(&role)
        .ok_or_else(|| ApiError::Internal(format!("Unknown message role '{}'", role)))?;

    Ok(Message {
        role,
        content: row.try_get("content").map_err(ApiError::internal)?,
        context_used: row.try_get("context_used").map_err(ApiError::internal)?,
        retrieval_query: row.try_get("retrieval_query").map_err(ApiError::internal)?,
        created_at: row.try_get("created_at").map_err(ApiError::internal)?,
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(
        &self,
        initial_messages: Vec<Message>,
        escalated: bool,
    ) -> Result<String, ApiError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        sqlx::query("INSERT INTO sessions (id, escalated, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(&session_id)
            .bind(escalated)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create session: {}", e)))?;

        Self::insert_messages(&mut tx, &session_id, &initial_messages).await?;

        tx.commit().await.map_err(ApiError::internal)?;

        tracing::debug!(session_id = %session_id, messages = initial_messages.len(), "Session created");
        Ok(session_id)
    }

    async fn append(
        &self,
        session_id: &str,
        messages: Vec<Message>,
        escalate: bool,
    ) -> Result<(), ApiError> {
        let now = now_timestamp();

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        let updated = sqlx::query(
            "UPDATE sessions SET updated_at = ?, escalated = MAX(escalated, ?) WHERE id = ?",
        )
        .bind(&now)
        .bind(escalate)
        .bind(session_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        if updated.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("Session {} not found", session_id)));
        }

        Self::insert_messages(&mut tx, session_id, &messages).await?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, ApiError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let messages = self.fetch_messages(session_id, None).await?;
        Ok(Some(Session {
            id: row.try_get("id").map_err(ApiError::internal)?,
            messages,
            escalated: row.try_get("escalated").map_err(ApiError::internal)?,
            created_at: row.try_get("created_at").map_err(ApiError::internal)?,
            updated_at: row.try_get("updated_at").map_err(ApiError::internal)?,
        }))
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Message>, ApiError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.fetch_messages(session_id, Some(limit)).await
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, ApiError> {
        let rows = sqlx::query(
            "SELECT s.id, s.escalated, s.updated_at, COUNT(m.id) as msg_count \
             FROM sessions s \
             LEFT JOIN messages m ON s.id = m.session_id \
             GROUP BY s.id \
             ORDER BY s.updated_at DESC \
             LIMIT ?",
        )
        .bind(LIST_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.iter()
            .map(|row| {
                Ok(SessionSummary {
                    id: row.try_get("id").map_err(ApiError::internal)?,
                    escalated: row.try_get("escalated").map_err(ApiError::internal)?,
                    message_count: row.try_get("msg_count").map_err(ApiError::internal)?,
                    updated_at: row.try_get("updated_at").map_err(ApiError::internal)?,
                })
            })
            .collect()
    }

    async fn clear_escalation(&self, session_id: &str) -> Result<(), ApiError> {
        let now = now_timestamp();
        let updated = sqlx::query("UPDATE sessions SET escalated = 0, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        if updated.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn test_store() -> (tempfile::TempDir, SqliteSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::new(dir.path().join("sessions.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn turn(question: &str, answer: &str) -> Vec<Message> {
        vec![
            Message::user(question),
            Message::assistant(answer, "ctx", question),
        ]
    }

    #[tokio::test]
    async fn create_seeds_messages_in_order() {
        let (_dir, store) = test_store().await;

        let id = store
            .create(turn("What is the NEFT limit?", "No upper limit."), false)
            .await
            .unwrap();

        let session = store.get(&id).await.unwrap().unwrap();
        assert_eq!(session.id, id);
        assert!(!session.escalated);
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[1].role, Role::Assistant);
        assert_eq!(session.messages[1].context_used.as_deref(), Some("ctx"));
    }

    #[tokio::test]
    async fn create_generates_distinct_ids() {
        let (_dir, store) = test_store().await;
        let a = store.create(Vec::new(), false).await.unwrap();
        let b = store.create(Vec::new(), false).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn append_adds_after_existing_messages() {
        let (_dir, store) = test_store().await;
        let id = store.create(turn("q1", "a1"), false).await.unwrap();

        store.append(&id, turn("q2", "a2"), false).await.unwrap();

        let session = store.get(&id).await.unwrap().unwrap();
        let contents: Vec<_> = session.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
    }

    #[tokio::test]
    async fn append_to_unknown_session_is_not_found() {
        let (_dir, store) = test_store().await;
        let err = store
            .append("missing", vec![Message::user("hi")], false)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(store.recent("missing", 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_returns_tail_in_chronological_order() {
        let (_dir, store) = test_store().await;
        let id = store.create(turn("q1", "a1"), false).await.unwrap();
        store.append(&id, turn("q2", "a2"), false).await.unwrap();
        store.append(&id, turn("q3", "a3"), false).await.unwrap();

        let recent = store.recent(&id, 4).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q2", "a2", "q3", "a3"]);

        assert!(store.recent(&id, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn escalation_is_sticky_until_cleared() {
        let (_dir, store) = test_store().await;
        let id = store.create(turn("q1", "a1"), false).await.unwrap();

        store
            .append(&id, vec![Message::system("Session escalated to human support.")], true)
            .await
            .unwrap();
        store.append(&id, turn("q2", "a2"), false).await.unwrap();
        assert!(store.get(&id).await.unwrap().unwrap().escalated);

        store.clear_escalation(&id).await.unwrap();
        assert!(!store.get(&id).await.unwrap().unwrap().escalated);
    }

    #[tokio::test]
    async fn list_reports_counts_newest_first() {
        let (_dir, store) = test_store().await;
        let older = store.create(turn("q1", "a1"), false).await.unwrap();
        let newer = store.create(Vec::new(), true).await.unwrap();
        store.append(&older, turn("q2", "a2"), false).await.unwrap();

        let sessions = store.list().await.unwrap();

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, older);
        assert_eq!(sessions[0].message_count, 4);
        assert_eq!(sessions[1].id, newer);
        assert!(sessions[1].escalated);
    }

    #[tokio::test]
    async fn concurrent_appends_lose_nothing() {
        let (_dir, store) = test_store().await;
        let store = Arc::new(store);
        let id = store.create(Vec::new(), false).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append(&id, turn(&format!("q{i}"), &format!("a{i}")), false)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let session = store.get(&id).await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 20);
        for pair in session.messages.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(&pair[0].content[1..], &pair[1].content[1..]);
        }
    }
}

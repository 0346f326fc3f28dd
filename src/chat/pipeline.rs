use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::core::config::AppSettings;
use crate::core::errors::ApiError;
use crate::history::{Message, SessionStore};
use crate::llm::{GenerateRequest, LlmProvider};
use crate::rag::{RetrievedContext, VectorSearch};

use super::prompt::{PromptError, PromptTemplate};
use super::rewriter::QueryRewriter;

pub const EMPTY_QUERY_MESSAGE: &str = "Query cannot be empty";

pub const GENERATION_TIMEOUT_REPLY: &str =
    "I'm sorry, the assistant took too long to respond. Please try again in a moment.";
pub const GENERATION_FAILURE_REPLY: &str =
    "I'm sorry, the assistant is unavailable right now. Please try again later.";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("FAQ search is unavailable: {0}")]
    RetrievalUnavailable(String),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            ChatError::RetrievalUnavailable(_) => ApiError::ServiceUnavailable(
                "The FAQ search service is unavailable. Please try again later.".to_string(),
            ),
            ChatError::Prompt(err) => ApiError::internal(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated,
    TimedOut,
    Failed,
}

/// Everything one pass through the pipeline produced.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub answer: String,
    /// `None` only when creating a new session failed.
    pub session_id: Option<String>,
    pub retrieval_query: String,
    pub context: RetrievedContext,
    pub generation: GenerationOutcome,
    pub persisted: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub rewrite_window: usize,
    pub generation_timeout: Duration,
    pub generation_temperature: Option<f32>,
}

/// Rewrite, retrieve, generate, persist.
///
/// Only a retrieval outage aborts a turn. Rewrite and generation failures degrade
/// to the original query and a canned reply; persistence failures are logged and
/// never take the answer away from the caller.
pub struct RagPipeline {
    llm: Arc<dyn LlmProvider>,
    search: Arc<dyn VectorSearch>,
    sessions: Arc<dyn SessionStore>,
    rewriter: QueryRewriter,
    answer_prompt: PromptTemplate,
    options: PipelineOptions,
}

impl RagPipeline {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        search: Arc<dyn VectorSearch>,
        sessions: Arc<dyn SessionStore>,
        rewriter: QueryRewriter,
        answer_prompt: PromptTemplate,
        options: PipelineOptions,
    ) -> Self {
        Self {
            llm,
            search,
            sessions,
            rewriter,
            answer_prompt,
            options,
        }
    }

    /// Wires the pipeline from configuration, compiling any prompt overrides.
    pub fn from_settings(
        settings: &AppSettings,
        llm: Arc<dyn LlmProvider>,
        search: Arc<dyn VectorSearch>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, PromptError> {
        let answer_prompt = PromptTemplate::answer(settings.prompts.answer_template.as_deref())?;
        let rewrite_prompt =
            PromptTemplate::rewrite(settings.prompts.rewrite_template.as_deref())?;
        let rewriter = QueryRewriter::new(
            llm.clone(),
            rewrite_prompt,
            settings.llm.rewrite_timeout(),
        );
        let options = PipelineOptions {
            rewrite_window: settings.history.rewrite_window,
            generation_timeout: settings.llm.generation_timeout(),
            generation_temperature: settings.llm.generation_temperature,
        };
        Ok(Self::new(llm, search, sessions, rewriter, answer_prompt, options))
    }

    pub async fn answer(
        &self,
        session_id: Option<&str>,
        user_query: &str,
        result_count: usize,
    ) -> Result<ChatTurn, ChatError> {
        if user_query.trim().is_empty() {
            return Err(ChatError::InvalidRequest(EMPTY_QUERY_MESSAGE.to_string()));
        }

        let retrieval_query = self.retrieval_query(session_id, user_query).await;

        tracing::debug!(query = %retrieval_query, n_results = result_count, "Searching FAQ");
        let passages = self
            .search
            .query(&retrieval_query, result_count)
            .await
            .map_err(|err| {
                tracing::error!(query = %retrieval_query, "FAQ search failed: {}", err);
                ChatError::RetrievalUnavailable(err.to_string())
            })?;
        let context = RetrievedContext::new(passages);
        if context.is_empty() {
            tracing::info!(query = %retrieval_query, "No FAQ passages matched");
        }

        let context_block = context.joined();
        let prompt = self.answer_prompt.render(&[
            ("context", context_block.as_str()),
            ("query", user_query),
        ])?;
        let (answer, generation) = self.generate(prompt).await;

        let user_message = Message::user(user_query);
        let assistant_message =
            Message::assistant(answer.as_str(), context.excerpt(), retrieval_query.as_str());
        let (session_id, persisted) = self
            .persist(session_id, vec![user_message, assistant_message])
            .await;

        Ok(ChatTurn {
            answer,
            session_id,
            retrieval_query,
            context,
            generation,
            persisted,
        })
    }

    async fn retrieval_query(&self, session_id: Option<&str>, user_query: &str) -> String {
        let Some(session_id) = session_id else {
            return user_query.to_string();
        };

        let history = match self
            .sessions
            .recent(session_id, self.options.rewrite_window)
            .await
        {
            Ok(history) => history,
            Err(err) => {
                tracing::warn!(
                    session_id = %session_id,
                    "Failed to read history, skipping rewrite: {}",
                    err
                );
                Vec::new()
            }
        };

        self.rewriter.rewrite(&history, user_query).await
    }

    async fn generate(&self, prompt: String) -> (String, GenerationOutcome) {
        tracing::debug!(prompt_chars = prompt.len(), "Generating answer");
        let request =
            GenerateRequest::new(prompt).with_temperature(self.options.generation_temperature);
        match self.llm.generate(request, self.options.generation_timeout).await {
            Ok(answer) if answer.trim().is_empty() => {
                tracing::warn!(timed_out = false, "Answer generation returned no text");
                (GENERATION_FAILURE_REPLY.to_string(), GenerationOutcome::Failed)
            }
            Ok(answer) => (answer, GenerationOutcome::Generated),
            Err(err) if err.is_timeout() => {
                tracing::warn!(timed_out = true, "Answer generation failed: {}", err);
                (GENERATION_TIMEOUT_REPLY.to_string(), GenerationOutcome::TimedOut)
            }
            Err(err) => {
                tracing::warn!(timed_out = false, "Answer generation failed: {}", err);
                (GENERATION_FAILURE_REPLY.to_string(), GenerationOutcome::Failed)
            }
        }
    }

    async fn persist(
        &self,
        session_id: Option<&str>,
        messages: Vec<Message>,
    ) -> (Option<String>, bool) {
        match session_id {
            None => match self.sessions.create(messages, false).await {
                Ok(id) => {
                    tracing::info!(session_id = %id, "Session created");
                    (Some(id), true)
                }
                Err(err) => {
                    tracing::warn!("Failed to create session: {}", err);
                    (None, false)
                }
            },
            Some(id) => match self.sessions.append(id, messages, false).await {
                Ok(()) => (Some(id.to_string()), true),
                Err(err) => {
                    tracing::warn!(session_id = %id, "Failed to append to session: {}", err);
                    (Some(id.to_string()), false)
                }
            },
        }
    }
}

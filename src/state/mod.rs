use std::sync::Arc;

use crate::chat::RagPipeline;
use crate::core::config::{AppPaths, AppSettings, ConfigService};
use crate::history::{SessionStore, SqliteSessionStore};
use crate::llm::{LlmProvider, OllamaProvider};
use crate::rag::HttpVectorStore;

pub mod error;

use error::InitializationError;

/// Shared application state handed to every route.
///
/// Contains:
/// - Paths and the loaded, validated settings
/// - The session store
/// - The language model client (also used directly for status checks)
/// - The RAG pipeline that answers chat turns
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<AppSettings>,
    pub sessions: Arc<dyn SessionStore>,
    pub llm: Arc<dyn LlmProvider>,
    pub pipeline: Arc<RagPipeline>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// 1. Loads and validates configuration
    /// 2. Opens the session database
    /// 3. Builds the model and vector search clients
    /// 4. Compiles the prompt templates into the pipeline
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let sessions: Arc<dyn SessionStore> = Arc::new(
            SqliteSessionStore::new(paths.db_path.clone())
                .await
                .map_err(|e| InitializationError::History(e.into()))?,
        );

        let llm: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::from_settings(&settings.llm));
        let search = Arc::new(HttpVectorStore::from_settings(&settings.retrieval));

        let pipeline = RagPipeline::from_settings(&settings, llm.clone(), search, sessions.clone())
            .map_err(|e| InitializationError::Prompt(e.into()))?;

        tracing::info!(
            model = %settings.llm.model,
            collection = %settings.retrieval.collection,
            db = %paths.db_path.display(),
            "Application state initialized"
        );

        Ok(Arc::new(Self::from_parts(
            paths,
            config,
            settings,
            sessions,
            llm,
            Arc::new(pipeline),
        )))
    }

    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: AppSettings,
        sessions: Arc<dyn SessionStore>,
        llm: Arc<dyn LlmProvider>,
        pipeline: Arc<RagPipeline>,
    ) -> Self {
        Self {
            paths,
            config,
            settings: Arc::new(settings),
            sessions,
            llm,
            pipeline,
        }
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to initialize session store: {0}")]
    History(#[source] anyhow::Error),

    #[error("Failed to compile prompt templates: {0}")]
    Prompt(#[source] anyhow::Error),
}

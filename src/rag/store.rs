//! Vector search traits: the seam between the chat pipeline and whatever
//! nearest-neighbour service holds the FAQ embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The service could not be reached or answered with an error status.
    #[error("vector search unavailable: {0}")]
    Unavailable(String),
    #[error("vector search returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// An FAQ entry ready to be embedded and indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqDocument {
    pub id: String,
    pub text: String,
    pub metadata: FaqMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqMetadata {
    pub question: String,
    pub answer: String,
    pub source: String,
}

/// Read side: ranked passages for a query.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Returns up to `n_results` passages, most similar first.
    async fn query(&self, query_text: &str, n_results: usize)
        -> Result<Vec<String>, RetrievalError>;
}

/// Write side, used by the ingestion job.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Adds documents in one batch and returns how many were accepted.
    async fn add(&self, documents: Vec<FaqDocument>) -> Result<usize, RetrievalError>;
}

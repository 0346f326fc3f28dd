//! Retrieval side of the assistant.
//!
//! This module provides:
//! - `VectorSearch` / `VectorIndex`: the seam to the vector search service
//! - `HttpVectorStore`: the HTTP implementation of both
//! - `RetrievedContext`: ranked passages and the excerpt kept in history
//! - FAQ ingestion used by the `faq-ingest` binary

mod context;
mod http_store;
pub mod ingest;
mod store;

pub use context::{truncate_with_ellipsis, RetrievedContext, CONTEXT_EXCERPT_CHARS, ELLIPSIS};
pub use http_store::HttpVectorStore;
pub use store::{FaqDocument, FaqMetadata, RetrievalError, VectorIndex, VectorSearch};

#[cfg(test)]
pub use store::MockVectorSearch;

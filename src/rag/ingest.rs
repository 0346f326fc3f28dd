//! One-shot FAQ loader: turns a JSON array of `{question, answer}` items into
//! indexable documents.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::store::{FaqDocument, FaqMetadata, RetrievalError, VectorIndex};

pub const DEFAULT_SOURCE: &str = "HDFC_FAQ";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("FAQ file is not a JSON list of question/answer items: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Index(#[from] RetrievalError),
}

#[derive(Debug, Deserialize)]
struct FaqEntry {
    question: String,
    answer: String,
}

/// Parses FAQ JSON. Ids are `id1..idN` in file order.
pub fn parse_faq(contents: &str, source: &str) -> Result<Vec<FaqDocument>, IngestError> {
    let entries: Vec<FaqEntry> = serde_json::from_str(contents)?;
    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| FaqDocument {
            id: format!("id{}", idx + 1),
            text: format!("Question: {}\nAnswer: {}", entry.question, entry.answer),
            metadata: FaqMetadata {
                question: entry.question,
                answer: entry.answer,
                source: source.to_string(),
            },
        })
        .collect())
}

pub fn load_faq_file(path: &Path, source: &str) -> Result<Vec<FaqDocument>, IngestError> {
    let contents = fs::read_to_string(path).map_err(|source_err| IngestError::Io {
        path: path.display().to_string(),
        source: source_err,
    })?;
    parse_faq(&contents, source)
}

/// Loads the FAQ file and adds every entry to the index in one batch.
pub async fn ingest_file(
    index: &dyn VectorIndex,
    path: &Path,
    source: &str,
) -> Result<usize, IngestError> {
    let documents = load_faq_file(path, source)?;
    let total = documents.len();
    tracing::info!("Indexing {} FAQ entries from {}", total, path.display());
    let added = index.add(documents).await?;
    if added != total {
        tracing::warn!("Index accepted {} of {} FAQ entries", added, total);
    }
    Ok(added)
}

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use faq_assistant::core::config::{AppPaths, ConfigService};
use faq_assistant::core::logging;
use faq_assistant::rag::ingest::{ingest_file, DEFAULT_SOURCE};
use faq_assistant::rag::HttpVectorStore;

const DEFAULT_FAQ_PATH: &str = "./dataset/HDFC_Faq.txt";

/// Usage: `faq-ingest [path] [source]`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let mut args = env::args().skip(1);
    let faq_path = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_FAQ_PATH.to_string()));
    let source = args.next().unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let settings = ConfigService::new(paths)
        .load_settings()
        .context("Failed to load configuration")?;
    let store = HttpVectorStore::from_settings(&settings.retrieval);

    let added = ingest_file(&store, &faq_path, &source)
        .await
        .with_context(|| format!("Failed to ingest {}", faq_path.display()))?;

    tracing::info!(
        collection = %settings.retrieval.collection,
        "Added {} FAQ entries",
        added
    );
    Ok(())
}

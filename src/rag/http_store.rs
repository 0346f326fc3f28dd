//! HTTP client for the vector search service.
//!
//! Query: `POST {base}/collections/{collection}/query` with
//! `{"query_text": "...", "n_results": 5}`. The reply is either a bare array of
//! passages or `{"documents": [...]}`, where documents may be grouped per query
//! (`[["a", "b"]]`) the way Chroma returns them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::store::{FaqDocument, FaqMetadata, RetrievalError, VectorIndex, VectorSearch};
use crate::core::config::RetrievalSettings;

#[derive(Clone)]
pub struct HttpVectorStore {
    base_url: String,
    collection: String,
    api_key: Option<String>,
    timeout: Duration,
    client: Client,
}

impl HttpVectorStore {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            api_key: None,
            timeout,
            client: Client::new(),
        }
    }

    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        let mut store = Self::new(
            settings.base_url.clone(),
            settings.collection.clone(),
            settings.timeout(),
        );
        store.api_key = settings.api_key.clone().filter(|key| !key.trim().is_empty());
        store
    }

    fn collection_url(&self, action: &str) -> String {
        format!("{}/collections/{}/{}", self.base_url, self.collection, action)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query_text: &'a str,
    n_results: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryResponse {
    Passages(Vec<String>),
    Documents { documents: Vec<DocumentGroup> },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentGroup {
    Single(String),
    PerQuery(Vec<Option<String>>),
    Missing(()),
}

impl QueryResponse {
    fn into_passages(self) -> Vec<String> {
        match self {
            QueryResponse::Passages(passages) => passages,
            QueryResponse::Documents { documents } => documents
                .into_iter()
                .flat_map(|group| match group {
                    DocumentGroup::Single(text) => vec![text],
                    DocumentGroup::PerQuery(texts) => texts.into_iter().flatten().collect(),
                    DocumentGroup::Missing(()) => Vec::new(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AddBody<'a> {
    ids: Vec<&'a str>,
    documents: Vec<&'a str>,
    metadatas: Vec<&'a FaqMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct AddResponse {
    added: Option<usize>,
}

#[async_trait]
impl VectorSearch for HttpVectorStore {
    async fn query(
        &self,
        query_text: &str,
        n_results: usize,
    ) -> Result<Vec<String>, RetrievalError> {
        let body = QueryBody {
            query_text,
            n_results,
        };
        let res = self
            .authorized(self.client.post(self.collection_url("query")))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RetrievalError::Unavailable(format!("{}: {}", status, text)));
        }

        let payload: QueryResponse = res
            .json()
            .await
            .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;

        let mut passages = payload.into_passages();
        passages.truncate(n_results);
        Ok(passages)
    }
}

#[async_trait]
impl VectorIndex for HttpVectorStore {
    async fn add(&self, documents: Vec<FaqDocument>) -> Result<usize, RetrievalError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let body = AddBody {
            ids: documents.iter().map(|d| d.id.as_str()).collect(),
            documents: documents.iter().map(|d| d.text.as_str()).collect(),
            metadatas: documents.iter().map(|d| &d.metadata).collect(),
        };
        let res = self
            .authorized(self.client.post(self.collection_url("add")))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RetrievalError::Unavailable(format!("{}: {}", status, text)));
        }

        let reply: AddResponse = res.json().await.unwrap_or_default();
        Ok(reply.added.unwrap_or(documents.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    async fn spawn_server(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn store(base: String) -> HttpVectorStore {
        HttpVectorStore::new(base, "FAQ", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn query_posts_text_and_count_and_reads_plain_list() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let app = Router::new().route(
            "/collections/FAQ/query",
            post(move |Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    Json(json!(["Question: PIN?\nAnswer: Use the app.", "Question: Card?\nAnswer: Block it."]))
                }
            }),
        );
        let base = spawn_server(app).await;

        let passages = store(base).query("reset PIN", 2).await.unwrap();

        assert_eq!(passages.len(), 2);
        assert!(passages[0].contains("PIN"));
        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body, json!({ "query_text": "reset PIN", "n_results": 2 }));
    }

    #[tokio::test]
    async fn nested_documents_are_flattened_in_order() {
        let app = Router::new().route(
            "/collections/FAQ/query",
            post(|| async { Json(json!({ "documents": [["a", "b", null], ["c"]], "ids": [["1", "2"]] })) }),
        );
        let base = spawn_server(app).await;

        let passages = store(base).query("q", 5).await.unwrap();

        assert_eq!(passages, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_result_is_not_an_error() {
        let app = Router::new().route(
            "/collections/FAQ/query",
            post(|| async { Json(json!({ "documents": [[]] })) }),
        );
        let base = spawn_server(app).await;

        let passages = store(base).query("q", 5).await.unwrap();

        assert!(passages.is_empty());
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let app = Router::new().route(
            "/collections/FAQ/query",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "index offline") }),
        );
        let base = spawn_server(app).await;

        let err = store(base).query("q", 5).await.unwrap_err();

        assert!(matches!(err, RetrievalError::Unavailable(msg) if msg.contains("index offline")));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = store(format!("http://{}", addr)).query("q", 5).await.unwrap_err();

        assert!(matches!(err, RetrievalError::Unavailable(_)));
    }

    #[tokio::test]
    async fn malformed_payload_is_invalid_response() {
        let app = Router::new().route(
            "/collections/FAQ/query",
            post(|| async { Json(json!({ "hits": 3 })) }),
        );
        let base = spawn_server(app).await;

        let err = store(base).query("q", 5).await.unwrap_err();

        assert!(matches!(err, RetrievalError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn add_sends_parallel_arrays_with_bearer_token() {
        let seen: Arc<Mutex<Option<(Option<String>, Value)>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let app = Router::new().route(
            "/collections/FAQ/add",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *captured.lock().unwrap() = Some((auth, body));
                    Json(json!({ "added": 1 }))
                }
            }),
        );
        let base = spawn_server(app).await;
        let settings = RetrievalSettings {
            base_url: base,
            api_key: Some("s3cret".into()),
            ..RetrievalSettings::default()
        };
        let doc = FaqDocument {
            id: "id1".into(),
            text: "Question: Q\nAnswer: A".into(),
            metadata: FaqMetadata {
                question: "Q".into(),
                answer: "A".into(),
                source: "HDFC_FAQ".into(),
            },
        };

        let added = HttpVectorStore::from_settings(&settings)
            .add(vec![doc])
            .await
            .unwrap();

        assert_eq!(added, 1);
        let (auth, body) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer s3cret"));
        assert_eq!(body["ids"], json!(["id1"]));
        assert_eq!(body["documents"], json!(["Question: Q\nAnswer: A"]));
        assert_eq!(body["metadatas"][0]["source"], "HDFC_FAQ");
    }
}

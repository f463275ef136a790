//! Chroma-compatible HTTP [`VectorStore`].
//!
//! Talks to an external vector engine over its REST API. The engine owns
//! embedding and ANN search; this client only moves documents and query
//! text back and forth.
//!
//! # Endpoints
//!
//! | Method | Path | Use |
//! |--------|------|-----|
//! | `GET` | `/api/v1/heartbeat` | health check |
//! | `POST` | `/api/v1/collections` | get or create (`get_or_create: true`) |
//! | `DELETE` | `/api/v1/collections/{name}` | drop on clear |
//! | `POST` | `/api/v1/collections/{id}/add` | parallel `ids` / `documents` / `metadatas` |
//! | `POST` | `/api/v1/collections/{id}/query` | one query text, nested per-query arrays |
//! | `GET` | `/api/v1/collections/{id}/count` | collection size |
//!
//! Non-success responses surface as errors carrying the response body.
//! Only [`health_check`](VectorStore::health_check) swallows failures.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use voice_retrieval_core::models::validate_batch;
use voice_retrieval_core::{
    CollectionInfo, Document, Metadata, Result, SearchResult, StoreError, StoreKind, VectorStore,
};

use crate::config::ChromaConfig;

const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
    name: String,
}

/// Per-query nested arrays; this client always sends exactly one query.
#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl QueryResponse {
    /// Flatten the first (only) query's results into a [`SearchResult`].
    fn into_result(self, n_results: usize) -> SearchResult {
        let documents: Vec<String> = first_query(self.documents)
            .unwrap_or_default()
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        let n = documents.len();
        let metadatas: Vec<Metadata> = match first_query(self.metadatas) {
            Some(m) => m.into_iter().map(Option::unwrap_or_default).collect(),
            None => vec![Metadata::new(); n],
        };
        let distances: Vec<f64> = match first_query(self.distances) {
            Some(d) => d.into_iter().map(|x| x.unwrap_or(1.0)).collect(),
            None => vec![1.0; n],
        };

        let mut result = SearchResult::from_parallel(documents, metadatas, distances);
        result.truncate(n_results);
        result
    }
}

fn first_query<T>(nested: Option<Vec<Vec<T>>>) -> Option<Vec<T>> {
    nested.and_then(|outer| outer.into_iter().next())
}

/// HTTP client implementation of [`VectorStore`].
pub struct ChromaStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    /// Engine-assigned collection id, resolved on first use.
    collection_id: RwLock<Option<String>>,
}

impl ChromaStore {
    /// Build a client for `config.url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the HTTP client cannot be built.
    pub fn new(config: &ChromaConfig, collection: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: collection.into(),
            collection_id: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn cached_id(&self) -> Option<String> {
        self.collection_id.read().ok().and_then(|id| id.clone())
    }

    fn set_cached_id(&self, id: Option<String>) {
        if let Ok(mut slot) = self.collection_id.write() {
            *slot = id;
        }
    }

    /// Return the collection id, creating the collection if needed.
    async fn ensure_collection(&self) -> Result<String> {
        if let Some(id) = self.cached_id() {
            return Ok(id);
        }
        let created = self.create_collection().await?;
        Ok(created.id)
    }

    async fn create_collection(&self) -> Result<CollectionResponse> {
        let body = serde_json::json!({
            "name": self.collection,
            "get_or_create": true,
        });

        let response = self
            .client
            .post(self.url("/collections"))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(&self.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(StoreError::schema(format!(
                "Chroma create collection error {}: {}",
                status, body_text
            )));
        }

        let created: CollectionResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        debug!(backend = "chroma", id = %created.id, name = %created.name, "collection ready");
        self.set_cached_id(Some(created.id.clone()));
        Ok(created)
    }

    async fn count(&self, id: &str) -> Result<usize> {
        let response = self
            .client
            .get(self.url(&format!("/collections/{id}/count")))
            .send()
            .await
            .map_err(|e| send_error(&self.base_url, e))?;
        let response = check_status(response, "count").await?;
        response
            .json::<usize>()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// Map a transport failure to the error taxonomy.
fn send_error(base_url: &str, e: reqwest::Error) -> StoreError {
    if e.is_connect() || e.is_timeout() {
        StoreError::connection(format!("Chroma unreachable at {base_url}: {e}"))
    } else {
        StoreError::query(format!("Chroma request failed: {e}"))
    }
}

async fn check_status(response: reqwest::Response, op: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body_text = response.text().await.unwrap_or_default();
    Err(StoreError::query(format!(
        "Chroma {} error {}: {}",
        op, status, body_text
    )))
}

#[async_trait]
impl VectorStore for ChromaStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Chroma
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn init(&self) -> Result<()> {
        self.ensure_collection().await?;
        Ok(())
    }

    async fn add_documents(&self, docs: &[Document]) -> Result<()> {
        validate_batch(docs)?;
        if docs.is_empty() {
            return Ok(());
        }
        let id = self.ensure_collection().await?;

        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        let documents: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        // The engine rejects empty metadata objects; send null instead.
        let metadatas: Vec<Option<&Metadata>> = docs
            .iter()
            .map(|d| (!d.metadata.is_empty()).then_some(&d.metadata))
            .collect();

        let body = serde_json::json!({
            "ids": ids,
            "documents": documents,
            "metadatas": metadatas,
        });

        let response = self
            .client
            .post(self.url(&format!("/collections/{id}/add")))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(&self.base_url, e))?;
        check_status(response, "add").await?;
        debug!(backend = "chroma", added = docs.len(), "documents added");
        Ok(())
    }

    async fn query_documents(&self, query: &str, n_results: usize) -> Result<SearchResult> {
        if n_results == 0 {
            return Ok(SearchResult::empty());
        }
        let id = self.ensure_collection().await?;
        if self.count(&id).await? == 0 {
            return Ok(SearchResult::empty());
        }

        let body = serde_json::json!({
            "query_texts": [query],
            "n_results": n_results,
            "include": ["documents", "metadatas", "distances"],
        });

        let response = self
            .client
            .post(self.url(&format!("/collections/{id}/query")))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(&self.base_url, e))?;
        let response = check_status(response, "query").await?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(parsed.into_result(n_results))
    }

    async fn clear_collection(&self) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/collections/{}", self.collection)))
            .send()
            .await
            .map_err(|e| send_error(&self.base_url, e))?;

        // Deleting a collection that does not exist yet is not an error here.
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            let body_text = response.text().await.unwrap_or_default();
            return Err(StoreError::query(format!(
                "Chroma delete error {}: {}",
                status, body_text
            )));
        }

        self.set_cached_id(None);
        self.create_collection().await?;
        info!(backend = "chroma", collection = %self.collection, "collection recreated");
        Ok(())
    }

    async fn get_or_create_collection(&self) -> Result<CollectionInfo> {
        let id = self.ensure_collection().await?;
        let count = self.count(&id).await?;
        Ok(CollectionInfo {
            name: self.collection.clone(),
            count,
        })
    }

    async fn health_check(&self) -> bool {
        match self.client.get(self.url("/heartbeat")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(backend = "chroma", error = %e, "heartbeat failed");
                false
            }
        }
    }
}

//! Redis + RediSearch [`VectorStore`].
//!
//! Each document is a hash at `{collection}:{id}` with fields `id`, `text`,
//! `metadata` (JSON string) and `vector` (little-endian f32 bytes from the
//! configured [`EmbeddingFunction`](voice_retrieval_core::embedding::EmbeddingFunction)).
//! A search index named `{index_prefix}:{collection}` covers the prefix with
//! a cosine HNSW vector field and a full-text `text` field.
//!
//! # Query Path
//!
//! 1. Embed the query and run `FT.SEARCH` with a KNN clause, ascending distance.
//! 2. If that fails for any reason (index still building, missing module,
//!    malformed vector), scan every key under the prefix and keep documents
//!    with a positive keyword overlap. Every hit gets distance `0.5`; the
//!    scan does not rank.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use voice_retrieval_core::embedding::{vec_to_blob, SharedEmbedding};
use voice_retrieval_core::keyword::DegradedHits;
use voice_retrieval_core::models::{parse_metadata, validate_batch};
use voice_retrieval_core::{
    CollectionInfo, Document, Result, SearchResult, StoreError, StoreKind, VectorStore,
};

use crate::config::RedisConfig;

/// Upper bound on establishing the first connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 500;

/// Redis implementation of [`VectorStore`].
pub struct RedisStore {
    url: String,
    collection: String,
    index_name: String,
    embedding: SharedEmbedding,
    conn: OnceCell<ConnectionManager>,
}

impl RedisStore {
    pub fn new(
        config: &RedisConfig,
        collection: impl Into<String>,
        embedding: SharedEmbedding,
    ) -> Self {
        let collection = collection.into();
        Self {
            url: config.url.clone(),
            index_name: format!("{}:{}", config.index_prefix, collection),
            collection,
            embedding,
            conn: OnceCell::new(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn key_for(&self, id: &str) -> String {
        format!("{}:{}", self.collection, id)
    }

    fn key_pattern(&self) -> String {
        format!("{}:*", self.collection)
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let client = redis::Client::open(self.url.as_str()).map_err(|e| {
                    StoreError::connection(format!("invalid Redis URL {}: {e}", self.url))
                })?;
                // One attempt first: the manager keeps retrying a dead server.
                let attempt = tokio::time::timeout(
                    CONNECT_TIMEOUT,
                    client.get_multiplexed_async_connection(),
                )
                .await;
                match attempt {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        return Err(StoreError::connection(format!(
                            "Redis unreachable at {}: {e}",
                            self.url
                        )))
                    }
                    Err(_) => {
                        return Err(StoreError::connection(format!(
                            "Redis unreachable at {}: connect timed out after {}s",
                            self.url,
                            CONNECT_TIMEOUT.as_secs()
                        )))
                    }
                }
                ConnectionManager::new(client).await.map_err(|e| {
                    StoreError::connection(format!("Redis unreachable at {}: {e}", self.url))
                })
            })
            .await?;
        Ok(conn.clone())
    }

    /// Create the search index unless `FT.INFO` already finds it.
    async fn ensure_index(&self, conn: &mut ConnectionManager) -> Result<()> {
        let info = redis::cmd("FT.INFO")
            .arg(&self.index_name)
            .query_async::<Value>(conn)
            .await;

        match info {
            Ok(_) => Ok(()),
            Err(e) if is_missing_index(&e.to_string()) => {
                let args = create_index_args(
                    &self.index_name,
                    &format!("{}:", self.collection),
                    self.embedding.dims(),
                );
                redis::cmd("FT.CREATE")
                    .arg(&args)
                    .query_async::<Value>(conn)
                    .await
                    .map_err(|e| {
                        StoreError::schema(format!("FT.CREATE {} failed: {e}", self.index_name))
                    })?;
                info!(backend = "redis", index = %self.index_name, "search index created");
                Ok(())
            }
            Err(e) => Err(StoreError::schema(format!(
                "FT.INFO {} failed: {e}",
                self.index_name
            ))),
        }
    }

    /// All keys under the collection prefix.
    async fn scan_keys(&self, conn: &mut ConnectionManager) -> Result<Vec<String>> {
        let pattern = self.key_pattern();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(conn)
                .await
                .map_err(|e| StoreError::query(format!("SCAN {pattern} failed: {e}")))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }

    async fn knn_search(
        &self,
        conn: &mut ConnectionManager,
        query: &str,
        n_results: usize,
    ) -> Result<SearchResult> {
        let vector = self.embedding.embed(query);
        let reply = redis::cmd("FT.SEARCH")
            .arg(&self.index_name)
            .arg(knn_query(n_results))
            .arg("PARAMS")
            .arg(2)
            .arg("vec")
            .arg(vec_to_blob(&vector))
            .arg("SORTBY")
            .arg("distance")
            .arg("ASC")
            .arg("RETURN")
            .arg(3)
            .arg("text")
            .arg("metadata")
            .arg("distance")
            .arg("LIMIT")
            .arg(0)
            .arg(n_results)
            .arg("DIALECT")
            .arg(2)
            .query_async::<Value>(conn)
            .await
            .map_err(|e| StoreError::query(format!("FT.SEARCH failed: {e}")))?;

        let hits = parse_search_reply(&reply)?;
        let mut result = SearchResult::with_capacity(hits.len());
        for hit in hits {
            let text = hit.get("text").cloned().unwrap_or_default();
            let distance = hit
                .get("distance")
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(1.0);
            let metadata = parse_metadata(hit.get("metadata").map(String::as_str));
            result.push(text, metadata, distance);
        }
        result.truncate(n_results);
        Ok(result)
    }

    /// Linear scan with substring overlap, used when KNN fails.
    async fn keyword_scan(
        &self,
        conn: &mut ConnectionManager,
        query: &str,
        n_results: usize,
    ) -> Result<SearchResult> {
        let mut hits = DegradedHits::new(query, n_results);
        for key in self.scan_keys(conn).await? {
            if hits.is_full() {
                break;
            }
            let (text, metadata): (Option<String>, Option<String>) = redis::cmd("HMGET")
                .arg(&key)
                .arg("text")
                .arg("metadata")
                .query_async(conn)
                .await
                .map_err(|e| StoreError::query(format!("HMGET {key} failed: {e}")))?;
            if let Some(text) = text {
                hits.offer(text, metadata.as_deref());
            }
        }
        Ok(hits.finish())
    }
}

/// `FT.CREATE` arguments after the index name.
fn create_index_args(index: &str, prefix: &str, dims: usize) -> Vec<String> {
    [
        index,
        "ON",
        "HASH",
        "PREFIX",
        "1",
        prefix,
        "SCHEMA",
        "id",
        "TAG",
        "text",
        "TEXT",
        "vector",
        "VECTOR",
        "HNSW",
        "6",
        "TYPE",
        "FLOAT32",
        "DIM",
        &dims.to_string(),
        "DISTANCE_METRIC",
        "COSINE",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn knn_query(k: usize) -> String {
    format!("*=>[KNN {k} @vector $vec AS distance]")
}

/// Whether an `FT.INFO` error means the index does not exist yet.
fn is_missing_index(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("unknown index name") || m.contains("no such index") || m.contains("not found")
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::SimpleString(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Double(d) => Some(d.to_string()),
        _ => None,
    }
}

fn field_pairs(value: &Value) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    match value {
        Value::Array(items) => {
            for pair in items.chunks_exact(2) {
                if let (Some(k), Some(v)) = (value_to_string(&pair[0]), value_to_string(&pair[1])) {
                    fields.insert(k, v);
                }
            }
        }
        Value::Map(entries) => {
            for (k, v) in entries {
                if let (Some(k), Some(v)) = (value_to_string(k), value_to_string(v)) {
                    fields.insert(k, v);
                }
            }
        }
        _ => {}
    }
    fields
}

/// Parse a RESP2 `FT.SEARCH` reply: `[total, key1, [f, v, ...], key2, [...], ...]`.
fn parse_search_reply(reply: &Value) -> Result<Vec<HashMap<String, String>>> {
    let Value::Array(items) = reply else {
        return Err(StoreError::query(format!(
            "unexpected FT.SEARCH reply: {reply:?}"
        )));
    };
    let Some(Value::Int(_total)) = items.first() else {
        return Err(StoreError::query("FT.SEARCH reply missing result count"));
    };

    Ok(items[1..]
        .chunks_exact(2)
        .map(|doc| field_pairs(&doc[1]))
        .collect())
}

#[async_trait]
impl VectorStore for RedisStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Redis
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn init(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        self.ensure_index(&mut conn).await
    }

    async fn add_documents(&self, docs: &[Document]) -> Result<()> {
        validate_batch(docs)?;
        let mut conn = self.connection().await?;
        for doc in docs {
            let vector = self.embedding.embed(&doc.text);
            if vector.len() != self.embedding.dims() {
                return Err(StoreError::invalid_input(format!(
                    "embedding has {} dims, index expects {}",
                    vector.len(),
                    self.embedding.dims()
                )));
            }
            let key = self.key_for(&doc.id);
            redis::cmd("HSET")
                .arg(&key)
                .arg("id")
                .arg(&doc.id)
                .arg("text")
                .arg(&doc.text)
                .arg("metadata")
                .arg(doc.metadata_json()?)
                .arg("vector")
                .arg(vec_to_blob(&vector))
                .query_async::<Value>(&mut conn)
                .await
                .map_err(|e| StoreError::query(format!("HSET {key} failed: {e}")))?;
        }
        debug!(backend = "redis", added = docs.len(), "documents stored");
        Ok(())
    }

    async fn query_documents(&self, query: &str, n_results: usize) -> Result<SearchResult> {
        if n_results == 0 {
            return Ok(SearchResult::empty());
        }
        let mut conn = self.connection().await?;
        match self.knn_search(&mut conn, query, n_results).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(
                    backend = "redis",
                    collection = %self.collection,
                    error = %e,
                    degraded = true,
                    "KNN search failed, falling back to keyword scan"
                );
                self.keyword_scan(&mut conn, query, n_results).await
            }
        }
    }

    async fn clear_collection(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let keys = self.scan_keys(&mut conn).await?;
        let removed = if keys.is_empty() {
            0
        } else {
            redis::cmd("DEL")
                .arg(&keys)
                .query_async::<usize>(&mut conn)
                .await
                .map_err(|e| StoreError::query(format!("DEL failed: {e}")))?
        };
        info!(backend = "redis", collection = %self.collection, removed, "collection cleared");
        Ok(())
    }

    async fn get_or_create_collection(&self) -> Result<CollectionInfo> {
        let mut conn = self.connection().await?;
        self.ensure_index(&mut conn).await?;
        let count = self.scan_keys(&mut conn).await?.len();
        Ok(CollectionInfo {
            name: self.collection.clone(),
            count,
        })
    }

    async fn health_check(&self) -> bool {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(e) => {
                debug!(backend = "redis", error = %e, "health check failed");
                return false;
            }
        };
        matches!(
            redis::cmd("PING").query_async::<String>(&mut conn).await,
            Ok(ref pong) if pong == "PONG"
        )
    }
}

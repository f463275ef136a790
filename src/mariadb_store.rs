//! MariaDB-backed [`VectorStore`].
//!
//! One table per collection, `{collection}_documents`:
//!
//! | Column | Native layout | JSON layout |
//! |--------|---------------|-------------|
//! | `id` | `VARCHAR(255)` primary key | same |
//! | `text` | `LONGTEXT` | same |
//! | `metadata` | `JSON` | same |
//! | `vector` | `VECTOR(dims)` + cosine `VECTOR INDEX` | `JSON` array |
//! | `created_at` | `TIMESTAMP` | same |
//!
//! The layout is chosen once, on first connect, from the server version:
//! servers at or above [`MIN_VECTOR_VERSION`] get the native column.
//!
//! # Query Path
//!
//! Rank by `VEC_DISTANCE_COSINE` against the embedded query. If that query
//! fails (older server, missing function, any runtime error) fall back to a
//! `LIKE` predicate per query word joined with `OR`, in the engine's row
//! order, with a fixed distance of `0.5`.

use std::fmt;

use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use sqlx::Row;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use voice_retrieval_core::embedding::SharedEmbedding;
use voice_retrieval_core::keyword::{degraded_hits, query_terms};
use voice_retrieval_core::models::{parse_metadata, validate_batch};
use voice_retrieval_core::{
    CollectionInfo, Document, Result, SearchResult, StoreError, StoreKind, VectorStore,
};

use crate::config::MariaDbConfig;
use crate::db;

/// First server version with a native `VECTOR` type.
pub const MIN_VECTOR_VERSION: (u32, u32) = (11, 7);

/// Column layout for the vector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    NativeVector,
    Json,
}

impl TableLayout {
    /// Pick a layout from a `SELECT VERSION()` string.
    pub fn for_version(version: &str) -> Self {
        match parse_version(version) {
            Some(v) if v >= MIN_VECTOR_VERSION => Self::NativeVector,
            _ => Self::Json,
        }
    }
}

impl fmt::Display for TableLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NativeVector => f.write_str("native-vector"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Parse `major.minor` from a version string like `11.7.2-MariaDB-log`.
pub fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split(|c: char| !c.is_ascii_digit());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// Render a vector in the `[a,b,c]` literal form `VEC_FromText` and JSON both accept.
pub fn vector_literal(vector: &[f32]) -> String {
    let parts: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

fn create_table_sql(table: &str, layout: TableLayout, dims: usize) -> String {
    match layout {
        TableLayout::NativeVector => format!(
            "CREATE TABLE IF NOT EXISTS `{table}` (
                `id` VARCHAR(255) NOT NULL PRIMARY KEY,
                `text` LONGTEXT NOT NULL,
                `metadata` JSON,
                `vector` VECTOR({dims}) NOT NULL,
                `created_at` TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                VECTOR INDEX (`vector`) M=6 DISTANCE=cosine
            )"
        ),
        TableLayout::Json => format!(
            "CREATE TABLE IF NOT EXISTS `{table}` (
                `id` VARCHAR(255) NOT NULL PRIMARY KEY,
                `text` LONGTEXT NOT NULL,
                `metadata` JSON,
                `vector` JSON NOT NULL,
                `created_at` TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )"
        ),
    }
}

fn insert_sql(table: &str, layout: TableLayout) -> String {
    let vector_expr = match layout {
        TableLayout::NativeVector => "VEC_FromText(?)",
        TableLayout::Json => "?",
    };
    format!(
        "INSERT INTO `{table}` (`id`, `text`, `metadata`, `vector`)
         VALUES (?, ?, ?, {vector_expr})
         ON DUPLICATE KEY UPDATE
             `text` = VALUES(`text`),
             `metadata` = VALUES(`metadata`),
             `vector` = VALUES(`vector`)"
    )
}

fn vector_query_sql(table: &str) -> String {
    format!(
        "SELECT `text`, CAST(`metadata` AS CHAR) AS metadata,
                VEC_DISTANCE_COSINE(`vector`, VEC_FromText(?)) AS distance
         FROM `{table}`
         ORDER BY distance ASC
         LIMIT ?"
    )
}

/// Rows are deleted, not the table, so the collection stays usable.
fn clear_sql(table: &str) -> String {
    format!("DELETE FROM `{table}`")
}

fn count_sql(table: &str) -> String {
    format!("SELECT COUNT(*) FROM `{table}`")
}

/// `LIKE` fallback with one placeholder per query word. `None` when there are no words.
fn keyword_query_sql(table: &str, n_terms: usize) -> Option<String> {
    if n_terms == 0 {
        return None;
    }
    let predicate = vec!["LOWER(`text`) LIKE ?"; n_terms].join(" OR ");
    Some(format!(
        "SELECT `text`, CAST(`metadata` AS CHAR) AS metadata
         FROM `{table}`
         WHERE {predicate}
         LIMIT ?"
    ))
}

/// `%term%` with `LIKE` wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Classify a driver error. Transport failures are connection errors.
fn map_sqlx(err: sqlx::Error, context: &str) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => StoreError::connection(format!("{context}: {err}")),
        other => StoreError::query(format!("{context}: {other}")),
    }
}

struct Connected {
    pool: MySqlPool,
    layout: TableLayout,
}

/// MariaDB implementation of [`VectorStore`].
pub struct MariaDbStore {
    config: MariaDbConfig,
    collection: String,
    table: String,
    embedding: SharedEmbedding,
    state: OnceCell<Connected>,
}

impl MariaDbStore {
    pub fn new(
        config: &MariaDbConfig,
        collection: impl Into<String>,
        embedding: SharedEmbedding,
    ) -> Self {
        let collection = collection.into();
        Self {
            config: config.clone(),
            table: format!("{collection}_documents"),
            collection,
            embedding,
            state: OnceCell::new(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Layout chosen at connect time, if connected.
    pub fn layout(&self) -> Option<TableLayout> {
        self.state.get().map(|s| s.layout)
    }

    /// Connect, detect the layout, and create the table, once per instance.
    async fn connected(&self) -> Result<&Connected> {
        self.state
            .get_or_try_init(|| async {
                let pool = db::connect(&self.config).await.map_err(|e| {
                    StoreError::connection(format!(
                        "MariaDB unreachable at {}:{}: {e}",
                        self.config.host, self.config.port
                    ))
                })?;

                let version: String = sqlx::query_scalar("SELECT VERSION()")
                    .fetch_one(&pool)
                    .await
                    .map_err(|e| map_sqlx(e, "SELECT VERSION() failed"))?;
                let layout = TableLayout::for_version(&version);

                sqlx::query(&create_table_sql(&self.table, layout, self.embedding.dims()))
                    .execute(&pool)
                    .await
                    .map_err(|e| {
                        StoreError::schema(format!("creating {} failed: {e}", self.table))
                    })?;

                info!(
                    backend = "mariadb",
                    table = %self.table,
                    version = %version,
                    layout = %layout,
                    "table ready"
                );
                Ok(Connected { pool, layout })
            })
            .await
    }

    async fn vector_query(
        &self,
        pool: &MySqlPool,
        query: &str,
        n_results: usize,
    ) -> Result<SearchResult> {
        let literal = vector_literal(&self.embedding.embed(query));
        let rows = sqlx::query(&vector_query_sql(&self.table))
            .bind(literal)
            .bind(n_results as i64)
            .fetch_all(pool)
            .await
            .map_err(|e| map_sqlx(e, "vector query failed"))?;

        let mut result = SearchResult::with_capacity(rows.len());
        for row in rows {
            let text: String = row
                .try_get("text")
                .map_err(|e| map_sqlx(e, "decoding text"))?;
            let metadata: Option<String> = row.try_get("metadata").unwrap_or(None);
            let distance: f64 = row
                .try_get("distance")
                .map_err(|e| map_sqlx(e, "decoding distance"))?;
            result.push(text, parse_metadata(metadata.as_deref()), distance);
        }
        Ok(result)
    }

    async fn keyword_query(
        &self,
        pool: &MySqlPool,
        query: &str,
        n_results: usize,
    ) -> Result<SearchResult> {
        let terms = query_terms(query);
        let Some(sql) = keyword_query_sql(&self.table, terms.len()) else {
            return Ok(SearchResult::empty());
        };

        let mut q = sqlx::query(&sql);
        for term in &terms {
            q = q.bind(like_pattern(term));
        }
        let rows = q
            .bind(n_results as i64)
            .fetch_all(pool)
            .await
            .map_err(|e| map_sqlx(e, "keyword query failed"))?;

        let mut decoded = Vec::with_capacity(rows.len());
        for row in rows {
            let text: String = row
                .try_get("text")
                .map_err(|e| map_sqlx(e, "decoding text"))?;
            let metadata: Option<String> = row.try_get("metadata").unwrap_or(None);
            decoded.push((text, metadata));
        }
        Ok(degraded_hits(query, decoded, n_results))
    }
}

#[async_trait]
impl VectorStore for MariaDbStore {
    fn kind(&self) -> StoreKind {
        StoreKind::MariaDb
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn init(&self) -> Result<()> {
        self.connected().await?;
        Ok(())
    }

    async fn add_documents(&self, docs: &[Document]) -> Result<()> {
        validate_batch(docs)?;
        let conn = self.connected().await?;
        let sql = insert_sql(&self.table, conn.layout);
        for doc in docs {
            let vector = self.embedding.embed(&doc.text);
            if vector.len() != self.embedding.dims() {
                return Err(StoreError::invalid_input(format!(
                    "embedding has {} dims, table expects {}",
                    vector.len(),
                    self.embedding.dims()
                )));
            }
            sqlx::query(&sql)
                .bind(&doc.id)
                .bind(&doc.text)
                .bind(doc.metadata_json()?)
                .bind(vector_literal(&vector))
                .execute(&conn.pool)
                .await
                .map_err(|e| map_sqlx(e, &format!("inserting document '{}' failed", doc.id)))?;
        }
        debug!(backend = "mariadb", added = docs.len(), "documents inserted");
        Ok(())
    }

    async fn query_documents(&self, query: &str, n_results: usize) -> Result<SearchResult> {
        if n_results == 0 {
            return Ok(SearchResult::empty());
        }
        let conn = self.connected().await?;
        match self.vector_query(&conn.pool, query, n_results).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(
                    backend = "mariadb",
                    collection = %self.collection,
                    layout = %conn.layout,
                    error = %e,
                    degraded = true,
                    "vector query failed, falling back to LIKE search"
                );
                self.keyword_query(&conn.pool, query, n_results).await
            }
        }
    }

    async fn clear_collection(&self) -> Result<()> {
        let conn = self.connected().await?;
        let done = sqlx::query(&clear_sql(&self.table))
            .execute(&conn.pool)
            .await
            .map_err(|e| map_sqlx(e, "clearing table failed"))?;
        info!(
            backend = "mariadb",
            table = %self.table,
            removed = done.rows_affected(),
            "collection cleared"
        );
        Ok(())
    }

    async fn get_or_create_collection(&self) -> Result<CollectionInfo> {
        let conn = self.connected().await?;
        let count: i64 = sqlx::query_scalar(&count_sql(&self.table))
            .fetch_one(&conn.pool)
            .await
            .map_err(|e| map_sqlx(e, "counting rows failed"))?;
        Ok(CollectionInfo {
            name: self.collection.clone(),
            count: usize::try_from(count).unwrap_or(0),
        })
    }

    async fn health_check(&self) -> bool {
        let Some(conn) = self.state.get() else {
            return false;
        };
        sqlx::query("SELECT 1").execute(&conn.pool).await.is_ok()
    }

    async fn close(&self) {
        if let Some(conn) = self.state.get() {
            conn.pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_retrieval_core::embedding::CharCodeEmbedding;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("11.7.2-MariaDB-ubu2404"), Some((11, 7)));
        assert_eq!(parse_version("10.11.6-MariaDB-log"), Some((10, 11)));
        assert_eq!(parse_version("8.0.36"), Some((8, 0)));
        assert_eq!(parse_version("garbage"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn test_layout_for_version() {
        assert_eq!(TableLayout::for_version("11.7.2-MariaDB"), TableLayout::NativeVector);
        assert_eq!(TableLayout::for_version("11.8.1-MariaDB"), TableLayout::NativeVector);
        assert_eq!(TableLayout::for_version("12.0.0-MariaDB"), TableLayout::NativeVector);
        assert_eq!(TableLayout::for_version("10.11.6-MariaDB"), TableLayout::Json);
        assert_eq!(TableLayout::for_version("11.4.3-MariaDB"), TableLayout::Json);
        assert_eq!(TableLayout::for_version("unknown"), TableLayout::Json);
    }

    #[test]
    fn test_create_table_sql_per_layout() {
        let native = create_table_sql("samples_documents", TableLayout::NativeVector, 384);
        assert!(native.contains("CREATE TABLE IF NOT EXISTS `samples_documents`"));
        assert!(native.contains("VECTOR(384)"));
        assert!(native.contains("DISTANCE=cosine"));

        let json = create_table_sql("samples_documents", TableLayout::Json, 384);
        assert!(json.contains("`vector` JSON NOT NULL"));
        assert!(!json.contains("VECTOR INDEX"));
    }

    #[test]
    fn test_insert_sql_per_layout() {
        assert!(insert_sql("t", TableLayout::NativeVector).contains("VEC_FromText(?)"));
        assert!(!insert_sql("t", TableLayout::Json).contains("VEC_FromText"));
        assert!(insert_sql("t", TableLayout::Json).contains("ON DUPLICATE KEY UPDATE"));
    }

    #[test]
    fn test_vector_query_orders_ascending() {
        let sql = vector_query_sql("t");
        assert!(sql.contains("VEC_DISTANCE_COSINE"));
        assert!(sql.contains("ORDER BY distance ASC"));
    }

    #[test]
    fn test_keyword_query_sql() {
        let sql = keyword_query_sql("t", 3).unwrap();
        assert_eq!(sql.matches("LIKE ?").count(), 3);
        assert_eq!(sql.matches(" OR ").count(), 2);
        assert!(keyword_query_sql("t", 0).is_none());
    }

    #[test]
    fn test_clear_keeps_table_and_create_is_idempotent() {
        assert_eq!(clear_sql("t"), "DELETE FROM `t`");
        assert!(!clear_sql("t").contains("DROP"));
        assert_eq!(count_sql("t"), "SELECT COUNT(*) FROM `t`");
        for layout in [TableLayout::NativeVector, TableLayout::Json] {
            assert!(create_table_sql("t", layout, 8).starts_with("CREATE TABLE IF NOT EXISTS"));
        }
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rain"), "%rain%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("snake_case"), "%snake\\_case%");
    }

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[0.5, -1.0, 0.0]), "[0.5,-1,0]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn test_table_name() {
        let store =
            MariaDbStore::new(&MariaDbConfig::default(), "samples", CharCodeEmbedding::shared(8));
        assert_eq!(store.table_name(), "samples_documents");
        assert!(store.layout().is_none());
    }

    #[tokio::test]
    async fn test_health_false_before_connect() {
        let store =
            MariaDbStore::new(&MariaDbConfig::default(), "samples", CharCodeEmbedding::shared(8));
        assert!(!store.health_check().await);
    }
}

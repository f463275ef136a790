//! Error taxonomy shared by every vector store backend.
//!
//! Backends never return `anyhow` errors across the [`VectorStore`](crate::store::VectorStore)
//! boundary; callers can match on the variant to tell an unreachable
//! dependency apart from a broken schema or a rejected query.

use thiserror::Error;

/// Errors surfaced by vector store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend's external dependency could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// Collection, table, or index bootstrap failed.
    #[error("schema error: {0}")]
    Schema(String),

    /// The external engine rejected or failed to execute a request.
    #[error("query execution error: {0}")]
    QueryExecution(String),

    /// Local disk I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The caller passed arguments the store cannot accept.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryExecution(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// True for failures caused by an unreachable dependency.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias used throughout the store layer.
pub type Result<T> = std::result::Result<T, StoreError>;

//! # Voice Retrieval Core
//!
//! Runtime-free building blocks for the retrieval layer: the document and
//! result model, the [`store::VectorStore`] capability trait, the error
//! taxonomy, keyword overlap scoring, the embedding strategy, and passage
//! splitting.
//!
//! This crate has no tokio, sqlx, redis, or HTTP dependencies; concrete
//! backends live in the `voice-retrieval` crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod keyword;
pub mod models;
pub mod store;

pub use error::{Result, StoreError};
pub use models::{CollectionInfo, Document, Metadata, SearchResult};
pub use store::{StoreKind, VectorStore};

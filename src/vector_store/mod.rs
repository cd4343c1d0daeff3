//! Document vector store.
//!
//! The application sees a single [`VectorStore`] handle. With an embedding
//! model and a PostgreSQL backend it is a pgvector table sized to the
//! model's dimensionality; otherwise it is [`EmptyVectorStore`], which
//! accepts writes and finds nothing.

mod empty;
pub mod filter;
#[cfg(feature = "database-postgres")]
mod pgvector;
mod provision;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub use empty::EmptyVectorStore;
pub use filter::MetadataFilter;
#[cfg(feature = "database-postgres")]
pub use pgvector::PgVectorStore;
pub use provision::VectorStoreProvisioner;

use crate::embedding::EmbeddingError;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Refusing to delete by a filter that matches every document")]
    UnboundedFilter,
}

pub type VectorStoreResult<T> = Result<T, VectorStoreError>;

/// A text document with free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    /// Create a document with a random id.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A similarity search query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum similarity in 0.0-1.0; 0.0 accepts everything.
    #[serde(default)]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
}

fn default_top_k() -> usize {
    4
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: default_top_k(),
            similarity_threshold: 0.0,
            filter: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// A search hit with its similarity in 0.0-1.0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f64,
}

#[async_trait]
pub trait VectorStore: Send + Sync + std::fmt::Debug {
    /// Backend name. Empty for the no-op store.
    fn name(&self) -> &str;

    /// Vector width of the backing index, if there is one.
    fn dimensions(&self) -> Option<u32>;

    /// Embed and store documents, replacing any with the same id.
    async fn add(&self, documents: Vec<Document>) -> VectorStoreResult<()>;

    /// Delete documents by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> VectorStoreResult<()>;

    /// Delete every document matching a metadata filter.
    async fn delete_by_filter(&self, filter: &MetadataFilter) -> VectorStoreResult<()>;

    /// Find the documents most similar to the query, best first.
    async fn similarity_search(
        &self,
        request: &SearchRequest,
    ) -> VectorStoreResult<Vec<ScoredDocument>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_builders() {
        let doc = Document::new("hello")
            .with_id("doc-1")
            .with_metadata("source", "a.md")
            .with_metadata("page", 2);
        assert_eq!(doc.id, "doc-1");
        assert_eq!(doc.metadata["source"], "a.md");
        assert_eq!(doc.metadata["page"], 2);
    }

    #[test]
    fn test_document_ids_are_unique() {
        assert_ne!(Document::new("a").id, Document::new("a").id);
    }

    #[test]
    fn test_search_request_defaults() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "leave policy"}"#).unwrap();
        assert_eq!(request.top_k, 4);
        assert_eq!(request.similarity_threshold, 0.0);
        assert!(request.filter.is_none());
    }
}

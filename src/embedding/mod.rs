//! Embedding model clients.
//!
//! An [`EmbeddingClient`] turns text into vectors. Its [`dimensions`] call is
//! the live introspection used to size the vector store: it embeds a short
//! probe text and reports the length of the returned vector.
//!
//! [`dimensions`]: EmbeddingClient::dimensions

mod openai;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::OpenAiEmbeddingClient;

/// Text embedded to measure a model's output dimensionality.
pub const DIMENSION_PROBE_TEXT: &str = "Hello World";

/// Errors that can occur while generating embeddings.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Embedding request returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse embedding response: {0}")]
    ParseError(String),

    #[error("No embeddings returned from model")]
    EmptyResponse,

    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

#[async_trait]
pub trait EmbeddingClient: Send + Sync + std::fmt::Debug {
    /// Model name sent with each request.
    fn model(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Length of the vectors this model produces, measured with one request.
    async fn dimensions(&self) -> EmbeddingResult<u32> {
        let mut vectors = self.embed(&[DIMENSION_PROBE_TEXT.to_string()]).await?;
        let vector = vectors.pop().ok_or(EmbeddingError::EmptyResponse)?;
        if vector.is_empty() {
            return Err(EmbeddingError::EmptyResponse);
        }
        u32::try_from(vector.len())
            .map_err(|_| EmbeddingError::ParseError("embedding length overflows u32".into()))
    }
}

use async_trait::async_trait;

use super::{
    Document, MetadataFilter, ScoredDocument, SearchRequest, VectorStore, VectorStoreResult,
};

/// Vector store used when no embedding model or storage backend exists.
///
/// Writes are accepted and discarded and searches return nothing, so chat
/// keeps working without retrieval.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyVectorStore;

#[async_trait]
impl VectorStore for EmptyVectorStore {
    fn name(&self) -> &str {
        ""
    }

    fn dimensions(&self) -> Option<u32> {
        None
    }

    async fn add(&self, documents: Vec<Document>) -> VectorStoreResult<()> {
        tracing::debug!(
            count = documents.len(),
            "No vector store configured, discarding documents"
        );
        Ok(())
    }

    async fn delete(&self, _ids: &[String]) -> VectorStoreResult<()> {
        Ok(())
    }

    async fn delete_by_filter(&self, _filter: &MetadataFilter) -> VectorStoreResult<()> {
        Ok(())
    }

    async fn similarity_search(
        &self,
        _request: &SearchRequest,
    ) -> VectorStoreResult<Vec<ScoredDocument>> {
        Ok(Vec::new())
    }
}

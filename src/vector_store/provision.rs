use std::sync::Arc;

use super::{EmptyVectorStore, VectorStore};
use crate::{
    config::VectorStoreConfig, db::DbPool, dimensions::EmbeddingCapability,
    discovery::ModelDiscovery,
};

/// Chooses and builds the application's vector store.
#[derive(Debug, Clone, Default)]
pub struct VectorStoreProvisioner {
    config: VectorStoreConfig,
}

impl VectorStoreProvisioner {
    pub fn new(config: VectorStoreConfig) -> Self {
        Self { config }
    }

    /// Build the vector store for the resolved embedding capability.
    ///
    /// A real store is built only with both a storage backend and an
    /// embedding model; its width is the resolved dimensionality. Every
    /// other combination yields [`EmptyVectorStore`].
    pub async fn provision(
        &self,
        capability: &EmbeddingCapability,
        discovery: &dyn ModelDiscovery,
        backend: Option<DbPool>,
    ) -> Arc<dyn VectorStore> {
        let Some(pool) = backend else {
            tracing::info!(
                stage = "vector_store_provisioned",
                store = "empty",
                reason = "no_storage_backend",
                "No storage backend, similarity search disabled"
            );
            return Arc::new(EmptyVectorStore);
        };

        let (Some(dimensions), Some(client)) = (
            capability.dimensions.filter(|_| capability.available),
            discovery.embedding_client(),
        ) else {
            tracing::info!(
                stage = "vector_store_provisioned",
                store = "empty",
                reason = "no_embedding_model",
                "Storage backend available but no embedding model, similarity search disabled"
            );
            return Arc::new(EmptyVectorStore);
        };

        self.provision_pgvector(pool, dimensions, client).await
    }

    #[cfg(feature = "database-postgres")]
    async fn provision_pgvector(
        &self,
        pool: DbPool,
        dimensions: u32,
        client: Arc<dyn crate::embedding::EmbeddingClient>,
    ) -> Arc<dyn VectorStore> {
        use super::PgVectorStore;

        if self.config.reinit
            && let Err(e) = PgVectorStore::drop_table(&pool, &self.config).await
        {
            tracing::warn!(
                table_name = %self.config.qualified_table_name(),
                error = %e,
                "Failed to drop vector store table for reinitialization"
            );
        }

        tracing::info!(
            stage = "vector_store_provisioned",
            store = "pgvector",
            table_name = %self.config.qualified_table_name(),
            dimensions,
            index_type = ?self.config.index_type,
            distance_metric = ?self.config.distance_metric,
            "Provisioned pgvector store"
        );
        Arc::new(PgVectorStore::new(pool, &self.config, dimensions, client))
    }

    #[cfg(not(feature = "database-postgres"))]
    async fn provision_pgvector(
        &self,
        pool: DbPool,
        _dimensions: u32,
        _client: Arc<dyn crate::embedding::EmbeddingClient>,
    ) -> Arc<dyn VectorStore> {
        match pool {}
    }
}

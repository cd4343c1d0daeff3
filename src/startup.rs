//! Startup orchestration.
//!
//! Stages run strictly in order: model discovery, dimension resolution,
//! storage check, vector store provisioning. Each stage sees only the
//! finished results of the previous ones.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::{
    config::AppConfig,
    db,
    dimensions::{DimensionResolver, EmbeddingCapability},
    discovery::{DiscoverySummary, ModelDiscovery, ModelDiscoveryService},
    vector_store::{VectorStore, VectorStoreProvisioner},
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Everything resolved at startup. Immutable once built.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub discovery: Arc<ModelDiscoveryService>,
    pub embedding: EmbeddingCapability,
    pub vector_store: Arc<dyn VectorStore>,
}

/// Serializable view of an [`AppContext`].
#[derive(Debug, Clone, Serialize)]
pub struct AppSummary {
    pub discovery: DiscoverySummary,
    pub embedding: EmbeddingCapability,
    pub vector_store: VectorStoreSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorStoreSummary {
    pub name: String,
    pub dimensions: Option<u32>,
}

impl AppContext {
    pub fn summary(&self) -> AppSummary {
        AppSummary {
            discovery: self.discovery.summary(),
            embedding: self.embedding.clone(),
            vector_store: VectorStoreSummary {
                name: self.vector_store.name().to_string(),
                dimensions: self.vector_store.dimensions(),
            },
        }
    }
}

/// Run model discovery only.
pub async fn discover(config: &AppConfig) -> Result<ModelDiscoveryService, StartupError> {
    let http_client = config.genai.build_http_client()?;
    Ok(ModelDiscoveryService::from_config(&config.genai, http_client).await)
}

/// Run discovery and dimension resolution.
pub async fn resolve(
    config: &AppConfig,
) -> Result<(ModelDiscoveryService, EmbeddingCapability), StartupError> {
    let discovery = discover(config).await?;
    let embedding = DimensionResolver::new(config.genai.introspection_timeout())
        .resolve(&discovery)
        .await;
    Ok((discovery, embedding))
}

/// Run every startup stage and build the application context.
pub async fn bootstrap(config: &AppConfig) -> Result<AppContext, StartupError> {
    let (discovery, embedding) = resolve(config).await?;
    let backend = db::connect(&config.database).await;

    let vector_store = VectorStoreProvisioner::new(config.vector_store.clone())
        .provision(&embedding, &discovery, backend)
        .await;

    tracing::info!(
        stage = "startup_completed",
        chat_model = discovery.chat_model_name().as_deref().unwrap_or("none"),
        embedding_model = embedding.model_name.as_deref().unwrap_or("none"),
        dimensions = ?embedding.dimensions,
        vector_store = vector_store.name(),
        "Startup completed"
    );

    Ok(AppContext {
        discovery: Arc::new(discovery),
        embedding,
        vector_store,
    })
}

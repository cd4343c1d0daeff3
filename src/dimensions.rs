//! Embedding dimension resolution.
//!
//! The vector index must be created with the exact length of the vectors the
//! embedding model produces. The model is asked directly first; if that
//! fails the length is inferred from well-known model families.

use std::time::Duration;

use serde::Serialize;

use crate::{discovery::ModelDiscovery, observability::metrics::record_dimension_resolution};

/// Output length of nomic embedding models, also used as the default.
pub const NOMIC_EMBEDDING_DIMENSIONS: u32 = 768;

/// Output length of OpenAI `text-embedding-*` models.
pub const OPENAI_EMBEDDING_DIMENSIONS: u32 = 1536;

pub const DEFAULT_EMBEDDING_DIMENSIONS: u32 = NOMIC_EMBEDDING_DIMENSIONS;

/// How a dimensionality was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionSource {
    /// No embedding model is configured.
    NoEmbeddingModel,
    /// Measured by embedding a probe text.
    Introspection,
    /// Matched a known model family by name.
    ModelName,
    /// Name missing or unrecognised.
    Default,
}

impl DimensionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionSource::NoEmbeddingModel => "no_embedding_model",
            DimensionSource::Introspection => "introspection",
            DimensionSource::ModelName => "model_name",
            DimensionSource::Default => "default",
        }
    }
}

/// Embedding capability resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddingCapability {
    pub available: bool,
    pub model_name: Option<String>,
    /// Present exactly when `available` is true.
    pub dimensions: Option<u32>,
    pub source: DimensionSource,
}

impl EmbeddingCapability {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            model_name: None,
            dimensions: None,
            source: DimensionSource::NoEmbeddingModel,
        }
    }

    /// Dimensionality to report to callers, defaulting when no model exists.
    pub fn effective_dimensions(&self) -> u32 {
        self.dimensions.unwrap_or(DEFAULT_EMBEDDING_DIMENSIONS)
    }
}

/// Infer dimensionality from a model name.
///
/// Matching is case-insensitive. OpenAI families are checked before nomic.
pub fn infer_dimensions_from_model_name(model_name: Option<&str>) -> (u32, DimensionSource) {
    let Some(name) = model_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return (DEFAULT_EMBEDDING_DIMENSIONS, DimensionSource::Default);
    };

    let lower = name.to_lowercase();
    if lower.contains("openai") || lower.contains("text-embedding") {
        (OPENAI_EMBEDDING_DIMENSIONS, DimensionSource::ModelName)
    } else if lower.contains("nomic") {
        (NOMIC_EMBEDDING_DIMENSIONS, DimensionSource::ModelName)
    } else {
        tracing::warn!(
            model = %name,
            default = DEFAULT_EMBEDDING_DIMENSIONS,
            "Unknown embedding model, using default dimensions"
        );
        (DEFAULT_EMBEDDING_DIMENSIONS, DimensionSource::Default)
    }
}

/// Resolves the embedding dimensionality for the discovered models.
#[derive(Debug, Clone)]
pub struct DimensionResolver {
    introspection_timeout: Duration,
}

impl Default for DimensionResolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl DimensionResolver {
    pub fn new(introspection_timeout: Duration) -> Self {
        Self {
            introspection_timeout,
        }
    }

    /// Resolve the embedding capability.
    ///
    /// Makes at most one introspection request, bounded by the configured
    /// timeout. Any failure falls through to name inference.
    pub async fn resolve(&self, discovery: &dyn ModelDiscovery) -> EmbeddingCapability {
        if !discovery.is_embedding_model_available() {
            tracing::info!(
                stage = "dimensions_resolved",
                source = DimensionSource::NoEmbeddingModel.as_str(),
                "No embedding model available, running in chat-only mode"
            );
            record_dimension_resolution(
                DimensionSource::NoEmbeddingModel.as_str(),
                DEFAULT_EMBEDDING_DIMENSIONS,
            );
            return EmbeddingCapability::unavailable();
        }

        let model_name = discovery.embedding_model_name();
        if discovery.is_embedding_model_available_from_aggregated_locators() {
            tracing::info!(
                model = model_name.as_deref().unwrap_or("unknown"),
                "Embedding model discovered from service bindings"
            );
        }

        let (dimensions, source) = match self.introspect(discovery).await {
            Some(dimensions) => (dimensions, DimensionSource::Introspection),
            None => infer_dimensions_from_model_name(model_name.as_deref()),
        };

        tracing::info!(
            stage = "dimensions_resolved",
            model = model_name.as_deref().unwrap_or("unknown"),
            dimensions,
            source = source.as_str(),
            "Resolved embedding dimensions"
        );
        record_dimension_resolution(source.as_str(), dimensions);

        EmbeddingCapability {
            available: true,
            model_name,
            dimensions: Some(dimensions),
            source,
        }
    }

    /// Resolve the dimensionality alone.
    pub async fn resolve_dimensions(&self, discovery: &dyn ModelDiscovery) -> u32 {
        self.resolve(discovery).await.effective_dimensions()
    }

    async fn introspect(&self, discovery: &dyn ModelDiscovery) -> Option<u32> {
        let Some(client) = discovery.embedding_client() else {
            tracing::warn!("Embedding model has no client, inferring dimensions from name");
            return None;
        };

        match tokio::time::timeout(self.introspection_timeout, client.dimensions()).await {
            Ok(Ok(dimensions)) => Some(dimensions),
            Ok(Err(e)) => {
                tracing::warn!(
                    model = %client.model(),
                    error = %e,
                    "Embedding dimension introspection failed, inferring from name"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    model = %client.model(),
                    timeout_secs = self.introspection_timeout.as_secs_f64(),
                    "Embedding dimension introspection timed out, inferring from name"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use rstest::rstest;

    use super::*;
    use crate::embedding::{EmbeddingClient, EmbeddingError, EmbeddingResult};

    #[derive(Debug)]
    enum Probe {
        Dimensions(usize),
        Fail,
        Hang,
    }

    #[derive(Debug)]
    struct ProbeClient {
        probe: Probe,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingClient for ProbeClient {
        fn model(&self) -> &str {
            "probe"
        }

        async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.probe {
                Probe::Dimensions(n) => Ok(texts.iter().map(|_| vec![0.0; n]).collect()),
                Probe::Fail => Err(EmbeddingError::EmptyResponse),
                Probe::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    struct FakeDiscovery {
        model: Option<String>,
        client: Option<Arc<ProbeClient>>,
        aggregated: bool,
    }

    impl FakeDiscovery {
        fn new(model: Option<&str>, probe: Option<Probe>) -> Self {
            Self {
                model: model.map(str::to_string),
                client: probe.map(|probe| {
                    Arc::new(ProbeClient {
                        probe,
                        calls: AtomicUsize::new(0),
                    })
                }),
                aggregated: false,
            }
        }

        fn calls(&self) -> usize {
            self.client
                .as_ref()
                .map(|c| c.calls.load(Ordering::SeqCst))
                .unwrap_or(0)
        }
    }

    impl ModelDiscovery for FakeDiscovery {
        fn is_embedding_model_available(&self) -> bool {
            self.model.is_some() || self.client.is_some()
        }

        fn is_embedding_model_available_from_aggregated_locators(&self) -> bool {
            self.aggregated && self.is_embedding_model_available()
        }

        fn embedding_model_name(&self) -> Option<String> {
            self.model.clone()
        }

        fn embedding_client(&self) -> Option<Arc<dyn EmbeddingClient>> {
            self.client
                .clone()
                .map(|c| c as Arc<dyn EmbeddingClient>)
        }

        fn is_chat_model_available(&self) -> bool {
            true
        }

        fn chat_model_name(&self) -> Option<String> {
            Some("chat".to_string())
        }
    }

    fn resolver() -> DimensionResolver {
        DimensionResolver::new(Duration::from_millis(200))
    }

    #[rstest]
    #[case::openai("openai-embed", OPENAI_EMBEDDING_DIMENSIONS, DimensionSource::ModelName)]
    #[case::text_embedding("text-embedding-3-small", OPENAI_EMBEDDING_DIMENSIONS, DimensionSource::ModelName)]
    #[case::uppercase("TEXT-EMBEDDING-ADA-002", OPENAI_EMBEDDING_DIMENSIONS, DimensionSource::ModelName)]
    #[case::nomic("nomic-embed-text", NOMIC_EMBEDDING_DIMENSIONS, DimensionSource::ModelName)]
    #[case::nomic_mixed_case("Nomic-Embed-Text-v1.5", NOMIC_EMBEDDING_DIMENSIONS, DimensionSource::ModelName)]
    #[case::unknown("mxbai-embed-large", DEFAULT_EMBEDDING_DIMENSIONS, DimensionSource::Default)]
    #[case::empty("", DEFAULT_EMBEDDING_DIMENSIONS, DimensionSource::Default)]
    #[case::blank("   ", DEFAULT_EMBEDDING_DIMENSIONS, DimensionSource::Default)]
    fn test_infer_dimensions_from_model_name(
        #[case] name: &str,
        #[case] expected: u32,
        #[case] source: DimensionSource,
    ) {
        assert_eq!(
            infer_dimensions_from_model_name(Some(name)),
            (expected, source)
        );
    }

    #[test]
    fn test_infer_dimensions_without_name() {
        assert_eq!(
            infer_dimensions_from_model_name(None),
            (DEFAULT_EMBEDDING_DIMENSIONS, DimensionSource::Default)
        );
    }

    #[tokio::test]
    async fn test_no_embedding_model_yields_default() {
        let discovery = FakeDiscovery::new(None, None);
        let capability = resolver().resolve(&discovery).await;

        assert_eq!(capability, EmbeddingCapability::unavailable());
        assert_eq!(resolver().resolve_dimensions(&discovery).await, 768);
    }

    #[tokio::test]
    async fn test_introspection_is_authoritative() {
        let discovery = FakeDiscovery::new(Some("nomic-embed-text"), Some(Probe::Dimensions(512)));
        let capability = resolver().resolve(&discovery).await;

        assert!(capability.available);
        assert_eq!(capability.dimensions, Some(512));
        assert_eq!(capability.source, DimensionSource::Introspection);
        assert_eq!(discovery.calls(), 1);
    }

    #[rstest]
    #[case::openai("text-embedding-3-small", 1536)]
    #[case::nomic("nomic-embed-text", 768)]
    #[case::unknown("all-minilm", 768)]
    #[case::empty("", 768)]
    #[tokio::test]
    async fn test_failed_introspection_falls_back_to_name(
        #[case] model: &str,
        #[case] expected: u32,
    ) {
        let discovery = FakeDiscovery::new(Some(model), Some(Probe::Fail));
        let capability = resolver().resolve(&discovery).await;

        assert!(capability.available);
        assert_eq!(capability.dimensions, Some(expected));
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test]
    async fn test_introspection_timeout_is_bounded_and_not_retried() {
        let discovery = FakeDiscovery::new(Some("text-embedding-3-small"), Some(Probe::Hang));

        let start = std::time::Instant::now();
        let capability = resolver().resolve(&discovery).await;

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(capability.dimensions, Some(OPENAI_EMBEDDING_DIMENSIONS));
        assert_eq!(capability.source, DimensionSource::ModelName);
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_client_uses_name() {
        let mut discovery = FakeDiscovery::new(Some("nomic-embed-text"), None);
        discovery.aggregated = true;
        let capability = resolver().resolve(&discovery).await;

        assert_eq!(capability.dimensions, Some(768));
        assert_eq!(capability.source, DimensionSource::ModelName);
    }

    #[tokio::test]
    async fn test_resolution_is_deterministic() {
        let discovery = FakeDiscovery::new(Some("text-embedding-3-large"), Some(Probe::Fail));
        let first = resolver().resolve(&discovery).await;
        let second = resolver().resolve(&discovery).await;
        assert_eq!(first, second);
    }
}

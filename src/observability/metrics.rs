//! Prometheus metrics for discovery and the vector store.
//!
//! Provides metrics for:
//! - Service bindings skipped during discovery
//! - Endpoint configuration fetches
//! - Embedding requests
//! - Embedding dimension resolution
//! - Vector store operations

#[cfg(feature = "prometheus")]
use metrics::{counter, gauge, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Initialize the metrics system with the given configuration.
///
/// Installs the global recorder and a scrape listener on `config.listen`.
/// Must be called from within a Tokio runtime.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let addr: std::net::SocketAddr = config
        .listen
        .parse()
        .map_err(|e| MetricsError::Setup(format!("invalid listen address: {e}")))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(MetricsError::Install)?;

    tracing::info!(listen = %addr, "Prometheus metrics listener started");
    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

/// Record a service binding skipped during discovery.
pub fn record_binding_skipped(reason: &str) {
    #[cfg(feature = "prometheus")]
    counter!("genai_bindings_skipped_total", "reason" => reason.to_string()).increment(1);
    #[cfg(not(feature = "prometheus"))]
    let _ = reason;
}

/// Record an endpoint configuration fetch.
pub fn record_endpoint_config_fetch(status: &str, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        counter!("genai_endpoint_config_fetches_total", "status" => status.to_string())
            .increment(1);
        histogram!("genai_endpoint_config_fetch_duration_seconds").record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    let _ = (status, duration_secs);
}

/// Record how the embedding dimensionality was resolved.
pub fn record_dimension_resolution(source: &str, dimensions: u32) {
    #[cfg(feature = "prometheus")]
    {
        counter!("genai_dimension_resolutions_total", "source" => source.to_string())
            .increment(1);
        gauge!("genai_embedding_dimensions").set(dimensions as f64);
    }
    #[cfg(not(feature = "prometheus"))]
    let _ = (source, dimensions);
}

/// Record an embedding request against a model endpoint.
pub fn record_embedding_request(model: &str, status: &str, duration_secs: f64, batch_size: u32) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "genai_embedding_requests_total",
            "model" => model.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        histogram!("genai_embedding_request_duration_seconds", "model" => model.to_string())
            .record(duration_secs);
        histogram!("genai_embedding_batch_size").record(batch_size as f64);
    }
    #[cfg(not(feature = "prometheus"))]
    let _ = (model, status, duration_secs, batch_size);
}

/// Record a vector store operation.
pub fn record_vector_store_operation(
    backend: &str,
    operation: &str,
    status: &str,
    duration_secs: f64,
    item_count: u32,
) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "vector_store_operations_total",
            "backend" => backend.to_string(),
            "operation" => operation.to_string(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            "vector_store_operation_duration_seconds",
            "backend" => backend.to_string(),
            "operation" => operation.to_string()
        )
        .record(duration_secs);

        histogram!(
            "vector_store_operation_items",
            "backend" => backend.to_string(),
            "operation" => operation.to_string()
        )
        .record(item_count as f64);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (backend, operation, status, duration_secs, item_count);
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install Prometheus recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}

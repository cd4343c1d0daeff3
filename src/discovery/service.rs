//! Model discovery service.
//!
//! Aggregates model endpoints either from every GenAI service binding in the
//! environment or from the static `[genai.chat]` / `[genai.embedding]`
//! configuration, and answers which chat and embedding models are available.

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;

use super::{
    catalog::{ServiceBinding, read_bindings_from_env},
    endpoint_config::{advertised_from_credentials, fetch_endpoint_config, primary_model},
    locator::{ModelEndpoint, ModelRole, locate_endpoints},
};
use crate::{
    config::{GenaiConfig, StaticModelConfig},
    embedding::{EmbeddingClient, OpenAiEmbeddingClient},
};

/// What downstream components need to know about discovered models.
pub trait ModelDiscovery: Send + Sync {
    fn is_embedding_model_available(&self) -> bool;

    /// True only when the embedding model came from aggregated service
    /// bindings rather than static configuration.
    fn is_embedding_model_available_from_aggregated_locators(&self) -> bool;

    fn embedding_model_name(&self) -> Option<String>;

    fn embedding_client(&self) -> Option<Arc<dyn EmbeddingClient>>;

    fn is_chat_model_available(&self) -> bool;

    fn chat_model_name(&self) -> Option<String>;
}

/// Where the discovered models came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    Static,
    Bindings,
}

/// Serializable view of a discovery result.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoverySummary {
    pub source: DiscoverySource,
    pub endpoints: Vec<ModelEndpoint>,
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
}

#[derive(Debug)]
pub struct ModelDiscoveryService {
    source: DiscoverySource,
    endpoints: Vec<ModelEndpoint>,
    chat_model: Option<String>,
    embedding_model: Option<String>,
    embedding_client: Option<Arc<dyn EmbeddingClient>>,
}

impl ModelDiscoveryService {
    /// Discover models according to `config`.
    ///
    /// Never fails: an unreadable service catalog or an unreachable endpoint
    /// only reduces what is available.
    pub async fn from_config(config: &GenaiConfig, http_client: Client) -> Self {
        if !config.multi_enabled {
            return Self::from_static(config, http_client);
        }

        let bindings = match read_bindings_from_env(&config.services_env) {
            Ok(bindings) => bindings,
            Err(e) => {
                tracing::warn!(
                    stage = "catalog_read_failed",
                    env = %config.services_env,
                    error = %e,
                    "Could not read service catalog, no model bindings discovered"
                );
                Vec::new()
            }
        };
        Self::from_bindings(&bindings, config, http_client).await
    }

    /// Discover models from already parsed service bindings.
    ///
    /// Endpoint configs are fetched one at a time so the result keeps the
    /// catalog order.
    pub async fn from_bindings(
        bindings: &[ServiceBinding],
        config: &GenaiConfig,
        http_client: Client,
    ) -> Self {
        let mut endpoints = Vec::new();
        for (binding, endpoint) in locate_endpoints(bindings) {
            let endpoint = identify_endpoint(endpoint, binding, config, &http_client).await;
            endpoints.push(endpoint);
        }

        let chat = endpoints.iter().find(|e| e.role == ModelRole::Chat);
        let embedding = endpoints.iter().find(|e| e.role == ModelRole::Embedding);

        let embedding_client = embedding.and_then(|e| {
            let model = e.model_name.as_deref()?;
            Some(Arc::new(OpenAiEmbeddingClient::new(
                http_client.clone(),
                &e.api_base,
                &config.openai_path,
                e.api_key(),
                model,
            )) as Arc<dyn EmbeddingClient>)
        });

        let service = Self {
            source: DiscoverySource::Bindings,
            chat_model: chat.and_then(|e| e.model_name.clone()),
            embedding_model: embedding.and_then(|e| e.model_name.clone()),
            embedding_client,
            endpoints,
        };
        service.log_result();
        service
    }

    /// Discover models from the static configuration sections.
    pub fn from_static(config: &GenaiConfig, http_client: Client) -> Self {
        let embedding_client = config.embedding.as_ref().map(|m| {
            Arc::new(static_embedding_client(m, config, http_client)) as Arc<dyn EmbeddingClient>
        });

        let service = Self {
            source: DiscoverySource::Static,
            endpoints: Vec::new(),
            chat_model: config.chat.as_ref().map(|m| m.model.clone()),
            embedding_model: config.embedding.as_ref().map(|m| m.model.clone()),
            embedding_client,
        };
        service.log_result();
        service
    }

    pub fn source(&self) -> DiscoverySource {
        self.source
    }

    /// Endpoints located from service bindings, in catalog order.
    pub fn endpoints(&self) -> &[ModelEndpoint] {
        &self.endpoints
    }

    pub fn summary(&self) -> DiscoverySummary {
        DiscoverySummary {
            source: self.source,
            endpoints: self.endpoints.clone(),
            chat_model: self.chat_model.clone(),
            embedding_model: self.embedding_model.clone(),
        }
    }

    fn log_result(&self) {
        tracing::info!(
            stage = "discovery_completed",
            source = ?self.source,
            endpoints = self.endpoints.len(),
            chat_model = self.chat_model.as_deref().unwrap_or("none"),
            embedding_model = self.embedding_model.as_deref().unwrap_or("none"),
            "Model discovery completed"
        );
    }
}

impl ModelDiscovery for ModelDiscoveryService {
    fn is_embedding_model_available(&self) -> bool {
        self.embedding_model.is_some()
    }

    fn is_embedding_model_available_from_aggregated_locators(&self) -> bool {
        self.source == DiscoverySource::Bindings && self.embedding_model.is_some()
    }

    fn embedding_model_name(&self) -> Option<String> {
        self.embedding_model.clone()
    }

    fn embedding_client(&self) -> Option<Arc<dyn EmbeddingClient>> {
        self.embedding_client.clone()
    }

    fn is_chat_model_available(&self) -> bool {
        self.chat_model.is_some()
    }

    fn chat_model_name(&self) -> Option<String> {
        self.chat_model.clone()
    }
}

fn static_embedding_client(
    model: &StaticModelConfig,
    config: &GenaiConfig,
    http_client: Client,
) -> OpenAiEmbeddingClient {
    OpenAiEmbeddingClient::new(
        http_client,
        &model.api_base,
        &config.openai_path,
        model.api_key.clone(),
        model.model.clone(),
    )
}

/// Attach role and model name to an endpoint from its advertised config,
/// falling back to model details in the binding credentials.
async fn identify_endpoint(
    endpoint: ModelEndpoint,
    binding: &ServiceBinding,
    config: &GenaiConfig,
    http_client: &Client,
) -> ModelEndpoint {
    match fetch_endpoint_config(http_client, &endpoint, config.config_fetch_timeout()).await {
        Ok(endpoint_config) => {
            let (role, model) = primary_model(&endpoint_config.advertised_models);
            tracing::debug!(
                stage = "endpoint_identified",
                binding = %endpoint.binding_name,
                role = ?role,
                model = model.as_deref().unwrap_or("none"),
                "Fetched endpoint config"
            );
            endpoint.with_model(role, model)
        }
        Err(e) => {
            let fallback = advertised_from_credentials(&binding.credentials);

            tracing::warn!(
                stage = "endpoint_config_failed",
                binding = %endpoint.binding_name,
                config_url = %endpoint.config_url,
                error = %e,
                credentials_fallback = fallback.is_some(),
                "Could not fetch endpoint config"
            );

            match fallback {
                Some(model) => {
                    let (role, name) = primary_model(std::slice::from_ref(&model));
                    endpoint.with_model(role, name)
                }
                None => endpoint,
            }
        }
    }
}

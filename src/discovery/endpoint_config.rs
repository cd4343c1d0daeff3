//! Advertised endpoint configuration.
//!
//! Each GenAI endpoint publishes a small JSON document at its `config_url`
//! describing the models it serves and their capabilities. The binder reads
//! it once at startup to decide whether an endpoint is a chat or an
//! embedding endpoint.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::locator::{ModelEndpoint, ModelRole};
use crate::observability::metrics::record_endpoint_config_fetch;

#[derive(Debug, Error)]
pub enum EndpointConfigError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint config request returned status {0}")]
    Status(u16),
}

/// Endpoint configuration document served at `config_url`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub advertised_models: Vec<AdvertisedModel>,
    #[serde(default)]
    pub wire_format: Option<String>,
}

/// A model served by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdvertisedModel {
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl AdvertisedModel {
    fn has_capability(&self, capability: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(capability))
    }

    fn role(&self) -> ModelRole {
        if self.has_capability("EMBEDDING") {
            ModelRole::Embedding
        } else if self.has_capability("CHAT") {
            ModelRole::Chat
        } else {
            ModelRole::Unknown
        }
    }
}

/// Pick the role and model an endpoint is used for.
///
/// An embedding model wins over a chat model so that an endpoint serving
/// both still provides the embedding capability.
pub fn primary_model(models: &[AdvertisedModel]) -> (ModelRole, Option<String>) {
    for wanted in [ModelRole::Embedding, ModelRole::Chat] {
        if let Some(model) = models.iter().find(|m| m.role() == wanted) {
            return (wanted, Some(model.name.clone()));
        }
    }
    (
        ModelRole::Unknown,
        models.first().map(|m| m.name.clone()),
    )
}

/// Fetch the advertised configuration of an endpoint.
///
/// One attempt, bounded by `timeout`.
pub async fn fetch_endpoint_config(
    client: &Client,
    endpoint: &ModelEndpoint,
    timeout: Duration,
) -> Result<EndpointConfig, EndpointConfigError> {
    let start = Instant::now();
    let result = request_endpoint_config(client, endpoint, timeout).await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };
    record_endpoint_config_fetch(status, duration);
    result
}

async fn request_endpoint_config(
    client: &Client,
    endpoint: &ModelEndpoint,
    timeout: Duration,
) -> Result<EndpointConfig, EndpointConfigError> {
    let response = client
        .get(&endpoint.config_url)
        .bearer_auth(endpoint.api_key())
        .timeout(timeout)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(EndpointConfigError::Status(response.status().as_u16()));
    }

    Ok(response.json::<EndpointConfig>().await?)
}

/// Model details carried directly in older binding credentials
/// (`model_name` plus `model_capabilities`).
pub fn advertised_from_credentials(credentials: &Map<String, Value>) -> Option<AdvertisedModel> {
    let name = credentials.get("model_name")?.as_str()?.to_string();
    let capabilities = credentials
        .get("model_capabilities")
        .and_then(Value::as_array)
        .map(|caps| {
            caps.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some(AdvertisedModel { name, capabilities })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    use super::*;

    fn model(name: &str, capabilities: &[&str]) -> AdvertisedModel {
        AdvertisedModel {
            name: name.to_string(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_primary_model_prefers_embedding() {
        let models = vec![
            model("mistral", &["CHAT", "TOOLS"]),
            model("nomic-embed-text", &["EMBEDDING"]),
        ];
        assert_eq!(
            primary_model(&models),
            (ModelRole::Embedding, Some("nomic-embed-text".to_string()))
        );
    }

    #[test]
    fn test_primary_model_chat() {
        let models = vec![model("llama", &["chat"])];
        assert_eq!(
            primary_model(&models),
            (ModelRole::Chat, Some("llama".to_string()))
        );
    }

    #[test]
    fn test_primary_model_unknown() {
        assert_eq!(primary_model(&[]), (ModelRole::Unknown, None));
        assert_eq!(
            primary_model(&[model("whisper", &["AUDIO"])]),
            (ModelRole::Unknown, Some("whisper".to_string()))
        );
    }

    #[test]
    fn test_advertised_from_credentials() {
        let credentials = json!({
            "model_name": "text-embedding-3-small",
            "model_capabilities": ["embedding"]
        });
        let model = advertised_from_credentials(credentials.as_object().unwrap()).unwrap();
        assert_eq!(model.name, "text-embedding-3-small");
        assert_eq!(model.role(), ModelRole::Embedding);

        assert!(advertised_from_credentials(&Map::new()).is_none());
    }

    #[tokio::test]
    async fn test_fetch_endpoint_config() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/v1/endpoint"))
            .and(header("authorization", "Bearer k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "embedding-endpoint",
                "description": "",
                "advertisedModels": [
                    { "name": "nomic-embed-text", "description": "", "capabilities": ["EMBEDDING"], "labels": {} }
                ],
                "wireFormat": "OPENAI"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = ModelEndpoint::new(
            "embed",
            format!("{}/config/v1/endpoint", server.uri()),
            "k",
            server.uri(),
        );
        let config = fetch_endpoint_config(&Client::new(), &endpoint, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(config.wire_format.as_deref(), Some("OPENAI"));
        assert_eq!(
            primary_model(&config.advertised_models),
            (ModelRole::Embedding, Some("nomic-embed-text".to_string()))
        );
    }

    #[tokio::test]
    async fn test_fetch_endpoint_config_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let endpoint = ModelEndpoint::new("m", format!("{}/config", server.uri()), "bad", server.uri());
        let err = fetch_endpoint_config(&Client::new(), &endpoint, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, EndpointConfigError::Status(401)));
    }
}

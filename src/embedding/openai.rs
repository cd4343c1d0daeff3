use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{EmbeddingClient, EmbeddingError, EmbeddingResult};
use crate::observability::metrics::record_embedding_request;

/// Client for an OpenAI-compatible `/embeddings` API.
#[derive(Clone)]
pub struct OpenAiEmbeddingClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenAiEmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAiEmbeddingClient {
    /// Create a client for the API rooted at `api_base` + `openai_path`.
    pub fn new(
        http_client: Client,
        api_base: &str,
        openai_path: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let base_url = format!(
            "{}/{}",
            api_base.trim_end_matches('/'),
            openai_path.trim_matches('/')
        );
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    async fn request(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut request = self
            .http_client
            .post(self.embeddings_url())
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            });
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::ParseError(e.to_string()))?;

        if parsed.data.is_empty() {
            return Err(EmbeddingError::EmptyResponse);
        }
        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: parsed.data.len(),
            });
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let result = self.request(texts).await;
        let duration_secs = start.elapsed().as_secs_f64();

        let status = if result.is_ok() { "success" } else { "error" };
        record_embedding_request(&self.model, status, duration_secs, texts.len() as u32);

        if let Err(e) = &result {
            tracing::debug!(model = %self.model, error = %e, "Embedding request failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    use super::*;

    fn client(server: &MockServer) -> OpenAiEmbeddingClient {
        OpenAiEmbeddingClient::new(
            Client::new(),
            &server.uri(),
            "/openai/v1",
            "k",
            "nomic-embed-text",
        )
    }

    #[test]
    fn test_embeddings_url_joins_paths() {
        let c = OpenAiEmbeddingClient::new(Client::new(), "https://x/", "/openai/v1/", "", "m");
        assert_eq!(c.embeddings_url(), "https://x/openai/v1/embeddings");

        let c = OpenAiEmbeddingClient::new(Client::new(), "https://x/v1", "", "", "m");
        assert_eq!(c.embeddings_url(), "https://x/v1/embeddings");
    }

    #[tokio::test]
    async fn test_embed_orders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/embeddings"))
            .and(header("authorization", "Bearer k"))
            .and(body_partial_json(json!({ "model": "nomic-embed-text" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                    { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
                ],
                "model": "nomic-embed-text"
            })))
            .mount(&server)
            .await;

        let vectors = client(&server)
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_dimensions_probe() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/embeddings"))
            .and(body_partial_json(json!({ "input": ["Hello World"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "index": 0, "embedding": vec![0.5_f32; 768] }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(client(&server).dimensions().await.unwrap(), 768);
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = client(&server).embed(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_empty_input_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        assert!(client(&server).embed(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let c = OpenAiEmbeddingClient::new(Client::new(), "https://x", "", "secret-key", "m");
        assert!(!format!("{c:?}").contains("secret-key"));
    }
}

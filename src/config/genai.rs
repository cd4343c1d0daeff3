use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Model discovery configuration.
///
/// Two mutually exclusive sources of model endpoints exist:
/// - With `multi_enabled`, every GenAI binding found in the service catalog
///   environment variable becomes a model endpoint.
/// - Otherwise the static `chat` and `embedding` sections are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct GenaiConfig {
    /// Discover model endpoints from every GenAI service binding.
    #[serde(default)]
    pub multi_enabled: bool,

    /// Environment variable holding the service catalog JSON.
    #[serde(default = "default_services_env")]
    pub services_env: String,

    /// Path appended to an endpoint's `api_base` to reach its
    /// OpenAI-compatible API.
    #[serde(default = "default_openai_path")]
    pub openai_path: String,

    /// Timeout for fetching an endpoint's advertised configuration.
    #[serde(default = "default_config_fetch_timeout")]
    pub config_fetch_timeout_secs: u64,

    /// Timeout for the single live embedding dimension probe.
    #[serde(default = "default_introspection_timeout")]
    pub introspection_timeout_secs: u64,

    /// Overall timeout for embedding requests.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout for all model endpoint requests.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// User-Agent header sent to model endpoints.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Statically configured chat model.
    #[serde(default)]
    pub chat: Option<StaticModelConfig>,

    /// Statically configured embedding model.
    #[serde(default)]
    pub embedding: Option<StaticModelConfig>,
}

impl Default for GenaiConfig {
    fn default() -> Self {
        Self {
            multi_enabled: false,
            services_env: default_services_env(),
            openai_path: default_openai_path(),
            config_fetch_timeout_secs: default_config_fetch_timeout(),
            introspection_timeout_secs: default_introspection_timeout(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
            chat: None,
            embedding: None,
        }
    }
}

impl GenaiConfig {
    pub fn config_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.config_fetch_timeout_secs)
    }

    pub fn introspection_timeout(&self) -> Duration {
        Duration::from_secs(self.introspection_timeout_secs)
    }

    /// Build the HTTP client shared by endpoint config fetches and
    /// embedding requests.
    pub fn build_http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .user_agent(&self.user_agent)
            .build()
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.services_env.is_empty() {
            return Err(ConfigError::Validation(
                "genai.services_env cannot be empty".into(),
            ));
        }
        if self.introspection_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "genai.introspection_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.config_fetch_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "genai.config_fetch_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "genai request and connect timeouts must be greater than 0".into(),
            ));
        }
        if let Some(chat) = &self.chat {
            chat.validate("genai.chat")?;
        }
        if let Some(embedding) = &self.embedding {
            embedding.validate("genai.embedding")?;
        }
        Ok(())
    }
}

/// A single statically configured model.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct StaticModelConfig {
    /// Base URL of the model endpoint.
    pub api_base: String,

    /// API key sent as a bearer token.
    #[serde(default)]
    pub api_key: String,

    /// Model name passed in requests.
    pub model: String,
}

impl StaticModelConfig {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.model.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{section}.model cannot be empty"
            )));
        }
        url::Url::parse(&self.api_base).map_err(|e| {
            ConfigError::Validation(format!("{section}.api_base is not a valid URL: {e}"))
        })?;
        Ok(())
    }
}

impl std::fmt::Debug for StaticModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticModelConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

fn default_services_env() -> String {
    "VCAP_SERVICES".to_string()
}

fn default_openai_path() -> String {
    "/openai/v1".to_string()
}

fn default_config_fetch_timeout() -> u64 {
    10
}

fn default_introspection_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_user_agent() -> String {
    format!("genai-binder/{}", env!("CARGO_PKG_VERSION"))
}

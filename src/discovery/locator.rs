//! Conversion of qualifying service bindings into typed model endpoints.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::{
    catalog::ServiceBinding,
    filter::{ENDPOINT_KEY, is_ai_service, is_genai_marked},
};
use crate::observability::metrics::record_binding_skipped;

/// What a model endpoint is used for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    Chat,
    Embedding,
    #[default]
    Unknown,
}

/// A model endpoint located from a service binding.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ModelEndpoint {
    pub binding_name: String,
    pub config_url: String,
    #[serde(skip)]
    api_key: String,
    pub api_base: String,
    pub role: ModelRole,
    pub model_name: Option<String>,
}

impl ModelEndpoint {
    pub fn new(
        binding_name: impl Into<String>,
        config_url: impl Into<String>,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            binding_name: binding_name.into(),
            config_url: config_url.into(),
            api_key: api_key.into(),
            api_base: api_base.into(),
            role: ModelRole::Unknown,
            model_name: None,
        }
    }

    /// Attach the role and model learned from the endpoint's advertised config.
    pub fn with_model(mut self, role: ModelRole, model_name: Option<String>) -> Self {
        self.role = role;
        self.model_name = model_name;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for ModelEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEndpoint")
            .field("binding_name", &self.binding_name)
            .field("config_url", &self.config_url)
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("role", &self.role)
            .field("model_name", &self.model_name)
            .finish()
    }
}

/// Why a binding did not produce a model endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No `endpoint` credentials object.
    MissingEndpoint,
    /// The endpoint object lacks a required key.
    MissingField(&'static str),
    /// A required key holds something other than a string.
    NotAString(&'static str),
    /// A URL field does not parse as an absolute URL.
    InvalidUrl(&'static str),
}

impl SkipReason {
    /// Short label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingEndpoint => "missing_endpoint",
            SkipReason::MissingField(_) => "missing_field",
            SkipReason::NotAString(_) => "not_a_string",
            SkipReason::InvalidUrl(_) => "invalid_url",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingEndpoint => write!(f, "no '{ENDPOINT_KEY}' credentials object"),
            SkipReason::MissingField(key) => write!(f, "endpoint is missing '{key}'"),
            SkipReason::NotAString(key) => write!(f, "endpoint '{key}' is not a string"),
            SkipReason::InvalidUrl(key) => write!(f, "endpoint '{key}' is not a valid URL"),
        }
    }
}

/// Build a model endpoint from a binding's `endpoint` credentials.
pub fn to_endpoint(binding: &ServiceBinding) -> Result<ModelEndpoint, SkipReason> {
    let Some(Value::Object(endpoint)) = binding.credentials.get(ENDPOINT_KEY) else {
        return Err(SkipReason::MissingEndpoint);
    };

    let config_url = url_field(endpoint, "config_url")?;
    let api_key = string_field(endpoint, "api_key")?;
    let api_base = url_field(endpoint, "api_base")?;

    Ok(ModelEndpoint::new(
        binding.name.clone(),
        config_url,
        api_key,
        api_base,
    ))
}

/// Locate model endpoints across all bindings, skipping unusable ones.
///
/// Unrelated services are ignored silently; GenAI-marked bindings that fail
/// to convert are reported at warning level.
/// Each endpoint is paired with the binding it came from.
pub fn locate_endpoints(bindings: &[ServiceBinding]) -> Vec<(&ServiceBinding, ModelEndpoint)> {
    let mut endpoints = Vec::new();

    for binding in bindings {
        if !is_genai_marked(binding) {
            continue;
        }
        let result = if is_ai_service(binding) {
            to_endpoint(binding)
        } else {
            Err(SkipReason::MissingEndpoint)
        };

        match result {
            Ok(endpoint) => {
                tracing::debug!(
                    stage = "endpoint_located",
                    binding = %binding.name,
                    api_base = %endpoint.api_base,
                    "Located GenAI model endpoint"
                );
                endpoints.push((binding, endpoint));
            }
            Err(reason) => {
                record_binding_skipped(reason.as_str());
                tracing::warn!(
                    stage = "binding_skipped",
                    binding = %binding.name,
                    reason = %reason,
                    "Skipping GenAI binding"
                );
            }
        }
    }

    endpoints
}

fn string_field(endpoint: &Map<String, Value>, key: &'static str) -> Result<String, SkipReason> {
    match endpoint.get(key) {
        None | Some(Value::Null) => Err(SkipReason::MissingField(key)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SkipReason::NotAString(key)),
    }
}

fn url_field(endpoint: &Map<String, Value>, key: &'static str) -> Result<String, SkipReason> {
    let value = string_field(endpoint, key)?;
    url::Url::parse(&value).map_err(|_| SkipReason::InvalidUrl(key))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn genai_binding(name: &str, credentials: Value) -> ServiceBinding {
        ServiceBinding {
            name: name.to_string(),
            labels: BTreeSet::from(["genai".to_string()]),
            tags: BTreeSet::from(["genai".to_string()]),
            plan: None,
            credentials: credentials.as_object().cloned().unwrap_or_default(),
        }
    }

    fn valid_endpoint() -> Value {
        json!({
            "endpoint": {
                "config_url": "https://x/config",
                "api_key": "k",
                "api_base": "https://x"
            }
        })
    }

    #[test]
    fn test_to_endpoint() {
        let endpoint = to_endpoint(&genai_binding("embed", valid_endpoint())).unwrap();
        assert_eq!(endpoint.binding_name, "embed");
        assert_eq!(endpoint.config_url, "https://x/config");
        assert_eq!(endpoint.api_key(), "k");
        assert_eq!(endpoint.api_base, "https://x");
        assert_eq!(endpoint.role, ModelRole::Unknown);
        assert!(endpoint.model_name.is_none());
    }

    #[rstest]
    #[case::no_config_url("config_url", SkipReason::MissingField("config_url"))]
    #[case::no_api_key("api_key", SkipReason::MissingField("api_key"))]
    #[case::no_api_base("api_base", SkipReason::MissingField("api_base"))]
    fn test_missing_field(#[case] field: &str, #[case] expected: SkipReason) {
        let mut credentials = valid_endpoint();
        credentials["endpoint"]
            .as_object_mut()
            .unwrap()
            .remove(field);
        let err = to_endpoint(&genai_binding("m", credentials)).unwrap_err();
        assert_eq!(err, expected);
    }

    #[test]
    fn test_non_string_field() {
        let mut credentials = valid_endpoint();
        credentials["endpoint"]["api_key"] = json!(42);
        let err = to_endpoint(&genai_binding("m", credentials)).unwrap_err();
        assert_eq!(err, SkipReason::NotAString("api_key"));
    }

    #[test]
    fn test_invalid_url_field() {
        let mut credentials = valid_endpoint();
        credentials["endpoint"]["api_base"] = json!("not a url");
        let err = to_endpoint(&genai_binding("m", credentials)).unwrap_err();
        assert_eq!(err, SkipReason::InvalidUrl("api_base"));
    }

    #[test]
    fn test_locate_skips_malformed_without_affecting_others() {
        let mut broken = valid_endpoint();
        broken["endpoint"]
            .as_object_mut()
            .unwrap()
            .remove("api_base");

        let unrelated = ServiceBinding {
            name: "db".to_string(),
            labels: BTreeSet::from(["postgres".to_string()]),
            tags: BTreeSet::new(),
            plan: None,
            credentials: Map::new(),
        };

        let bindings = vec![
            genai_binding("first", valid_endpoint()),
            genai_binding("broken", broken),
            genai_binding("no-endpoint", json!({ "api_key": "k" })),
            unrelated,
            genai_binding("second", valid_endpoint()),
        ];

        let endpoints = locate_endpoints(&bindings);
        let names: Vec<_> = endpoints
            .iter()
            .map(|(_, e)| e.binding_name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(
            endpoints
                .iter()
                .all(|(binding, e)| binding.name == e.binding_name)
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let endpoint = ModelEndpoint::new("m", "https://x/config", "super-secret", "https://x");
        let debug = format!("{endpoint:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}

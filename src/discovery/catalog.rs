//! Service catalog parsing.
//!
//! The platform injects bound services as a JSON object keyed by service
//! label, each holding an array of binding records:
//!
//! ```json
//! {
//!   "genai": [
//!     {
//!       "name": "embedding-model",
//!       "label": "genai",
//!       "tags": ["genai", "llm"],
//!       "plan": "nomic-embed-text",
//!       "credentials": { "endpoint": { "config_url": "...", "api_key": "...", "api_base": "..." } }
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Service catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Service catalog must be a JSON object keyed by service label")]
    NotAnObject,

    #[error("Environment variable {0} is not valid unicode")]
    NotUnicode(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// One bound service as supplied by the platform.
#[derive(Clone, PartialEq)]
pub struct ServiceBinding {
    pub name: String,
    /// The catalog key the binding was listed under, plus its own `label` field.
    pub labels: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub plan: Option<String>,
    pub credentials: Map<String, Value>,
}

impl ServiceBinding {
    /// Case-insensitive tag lookup.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Case-insensitive label prefix lookup.
    pub fn has_label_prefix(&self, prefix: &str) -> bool {
        let prefix = prefix.to_ascii_lowercase();
        self.labels
            .iter()
            .any(|l| l.to_ascii_lowercase().starts_with(&prefix))
    }
}

impl std::fmt::Debug for ServiceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials carry API keys; only their keys are printed.
        f.debug_struct("ServiceBinding")
            .field("name", &self.name)
            .field("labels", &self.labels)
            .field("tags", &self.tags)
            .field("plan", &self.plan)
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Parse a raw service catalog into bindings.
///
/// Entries that are not objects or lack a name are skipped with a warning;
/// only a catalog that is not a JSON object at all is an error.
pub fn read_bindings(raw: &str) -> CatalogResult<Vec<ServiceBinding>> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(services) = value else {
        return Err(CatalogError::NotAnObject);
    };

    let mut bindings = Vec::new();
    for (label, entries) in services {
        let Value::Array(entries) = entries else {
            tracing::warn!(label = %label, "Service catalog entry is not an array, skipping");
            continue;
        };
        for entry in entries {
            match parse_binding(&label, entry) {
                Some(binding) => bindings.push(binding),
                None => {
                    tracing::warn!(label = %label, "Service binding without a name, skipping")
                }
            }
        }
    }

    Ok(bindings)
}

/// Read bindings from an environment variable.
///
/// An unset variable means no services are bound and yields an empty list.
pub fn read_bindings_from_env(var: &str) -> CatalogResult<Vec<ServiceBinding>> {
    match std::env::var(var) {
        Ok(raw) => read_bindings(&raw),
        Err(std::env::VarError::NotPresent) => {
            tracing::debug!(env = %var, "Service catalog variable not set");
            Ok(Vec::new())
        }
        Err(std::env::VarError::NotUnicode(_)) => Err(CatalogError::NotUnicode(var.to_string())),
    }
}

fn parse_binding(label: &str, entry: Value) -> Option<ServiceBinding> {
    let Value::Object(mut entry) = entry else {
        return None;
    };

    let name = entry.get("name")?.as_str()?.to_string();

    let mut labels = BTreeSet::from([label.to_string()]);
    if let Some(own) = entry.get("label").and_then(Value::as_str) {
        labels.insert(own.to_string());
    }

    let tags = entry
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let plan = entry
        .get("plan")
        .and_then(Value::as_str)
        .map(str::to_string);

    let credentials = match entry.remove("credentials") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    Some(ServiceBinding {
        name,
        labels,
        tags,
        plan,
        credentials,
    })
}

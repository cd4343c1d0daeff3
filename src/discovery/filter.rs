use serde_json::Value;

use super::catalog::ServiceBinding;

/// Tag (or label prefix) marking a binding as an AI model service.
pub const GENAI_TAG: &str = "genai";

/// Credentials key holding the model endpoint object.
pub const ENDPOINT_KEY: &str = "endpoint";

/// Whether a binding is a genuine AI model binding.
///
/// Requires a `genai` tag or a label starting with `genai` (both
/// case-insensitive) and an `endpoint` credentials object.
pub fn is_ai_service(binding: &ServiceBinding) -> bool {
    is_genai_marked(binding) && has_endpoint(binding)
}

pub(super) fn is_genai_marked(binding: &ServiceBinding) -> bool {
    binding.has_tag(GENAI_TAG) || binding.has_label_prefix(GENAI_TAG)
}

fn has_endpoint(binding: &ServiceBinding) -> bool {
    matches!(binding.credentials.get(ENDPOINT_KEY), Some(Value::Object(_)))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn binding(tags: &[&str], labels: &[&str], credentials: Value) -> ServiceBinding {
        ServiceBinding {
            name: "svc".to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            tags: tags.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            plan: None,
            credentials: credentials.as_object().cloned().unwrap_or_default(),
        }
    }

    fn endpoint() -> Value {
        json!({ "endpoint": { "config_url": "https://x/config", "api_key": "k", "api_base": "https://x" } })
    }

    #[rstest]
    #[case::genai_tag(&["genai"], &["user-provided"])]
    #[case::uppercase_tag(&["GenAI"], &["user-provided"])]
    #[case::label_prefix(&[], &["genai-service"])]
    #[case::uppercase_label_prefix(&["llm"], &["GENAI"])]
    fn test_genai_bindings_with_endpoint_qualify(#[case] tags: &[&str], #[case] labels: &[&str]) {
        assert!(is_ai_service(&binding(tags, labels, endpoint())));
    }

    #[rstest]
    #[case::no_marker(&["llm"], &["openai"])]
    #[case::tag_is_only_substring(&["my-genai"], &["custom"])]
    #[case::label_does_not_start_with_genai(&[], &["custom-genai"])]
    fn test_unmarked_bindings_are_rejected(#[case] tags: &[&str], #[case] labels: &[&str]) {
        assert!(!is_ai_service(&binding(tags, labels, endpoint())));
    }

    #[test]
    fn test_genai_binding_without_endpoint_is_rejected() {
        let b = binding(&["genai"], &["genai"], json!({ "api_key": "k" }));
        assert!(!is_ai_service(&b));
    }

    #[test]
    fn test_endpoint_must_be_an_object() {
        let b = binding(&["genai"], &["genai"], json!({ "endpoint": "https://x" }));
        assert!(!is_ai_service(&b));
    }
}

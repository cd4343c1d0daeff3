use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Vector store configuration.
///
/// Dimensions are never configured here; they come from the embedding model
/// resolved at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct VectorStoreConfig {
    /// Schema holding the vector table.
    #[serde(default = "default_schema_name")]
    pub schema_name: String,

    /// Table holding documents and their embeddings.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Approximate nearest neighbour index type.
    #[serde(default = "default_index_type")]
    pub index_type: PgvectorIndexType,

    /// Distance metric for similarity search.
    #[serde(default)]
    pub distance_metric: DistanceMetric,

    /// Create the extension, table and index on first use.
    #[serde(default = "default_true")]
    pub initialize_schema: bool,

    /// Drop the table and its index at startup so the schema is recreated
    /// with the current embedding dimensions.
    #[serde(default)]
    pub reinit: bool,

    /// Maximum number of documents embedded and inserted per batch.
    #[serde(default = "default_max_document_batch_size")]
    pub max_document_batch_size: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            schema_name: default_schema_name(),
            table_name: default_table_name(),
            index_type: default_index_type(),
            distance_metric: DistanceMetric::default(),
            initialize_schema: true,
            reinit: false,
            max_document_batch_size: default_max_document_batch_size(),
        }
    }
}

impl VectorStoreConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        // Both names are interpolated into DDL, so only plain identifiers are allowed.
        for (field, value) in [
            ("schema_name", &self.schema_name),
            ("table_name", &self.table_name),
        ] {
            if !is_sql_identifier(value) {
                return Err(ConfigError::Validation(format!(
                    "vector_store.{field} must be a plain SQL identifier, got '{value}'"
                )));
            }
        }
        if self.max_document_batch_size == 0 {
            return Err(ConfigError::Validation(
                "vector_store.max_document_batch_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Schema-qualified table name.
    pub fn qualified_table_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }
}

fn is_sql_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    value.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// pgvector index type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum PgvectorIndexType {
    /// IVFFlat index - faster to build, good for moderate dataset sizes.
    IvfFlat,
    /// HNSW index - better query performance, slower to build.
    #[default]
    Hnsw,
}

/// Distance metric for vector similarity search.
///
/// Cosine is the right choice for the text embedding families this binder
/// knows about (nomic, OpenAI `text-embedding-*`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity (default).
    #[default]
    Cosine,
    /// Dot product (inner product).
    DotProduct,
    /// Euclidean distance (L2).
    Euclidean,
}

impl DistanceMetric {
    /// Returns the pgvector operator class name for index creation.
    pub fn pgvector_ops_class(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "vector_cosine_ops",
            DistanceMetric::DotProduct => "vector_ip_ops",
            DistanceMetric::Euclidean => "vector_l2_ops",
        }
    }

    /// Returns the pgvector distance operator for queries.
    pub fn pgvector_operator(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "<=>",
            DistanceMetric::DotProduct => "<#>",
            DistanceMetric::Euclidean => "<->",
        }
    }
}

fn default_schema_name() -> String {
    "public".to_string()
}

fn default_table_name() -> String {
    "vector_store".to_string()
}

fn default_index_type() -> PgvectorIndexType {
    PgvectorIndexType::Hnsw
}

fn default_true() -> bool {
    true
}

fn default_max_document_batch_size() -> usize {
    10_000
}

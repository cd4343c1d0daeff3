//! PostgreSQL with pgvector implementation of the VectorStore trait.
//!
//! Documents live in one table whose `embedding` column is sized to the
//! embedding model's dimensionality. The extension, table and ANN index are
//! created on first use unless schema initialization is disabled.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, postgres::PgQueryResult, types::Json};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::{
    Document, MetadataFilter, ScoredDocument, SearchRequest, VectorStore, VectorStoreError,
    VectorStoreResult,
    filter::{SqlBindValue, build_filter_sql},
};
use crate::{
    config::{DistanceMetric, PgvectorIndexType, VectorStoreConfig},
    embedding::EmbeddingClient,
    observability::metrics::record_vector_store_operation,
};

const BACKEND: &str = "pgvector";

pub struct PgVectorStore {
    pool: PgPool,
    schema_name: String,
    /// Schema-qualified table name.
    table_name: String,
    index_name: String,
    dimensions: u32,
    index_type: PgvectorIndexType,
    distance_metric: DistanceMetric,
    initialize_schema: bool,
    max_document_batch_size: usize,
    embedding_client: Arc<dyn EmbeddingClient>,
    schema_ready: OnceCell<()>,
}

impl std::fmt::Debug for PgVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgVectorStore")
            .field("table_name", &self.table_name)
            .field("dimensions", &self.dimensions)
            .field("index_type", &self.index_type)
            .field("distance_metric", &self.distance_metric)
            .field("embedding_model", &self.embedding_client.model())
            .finish()
    }
}

/// Statements that remove the table, anything depending on it, and its index.
fn drop_table_sql(config: &VectorStoreConfig) -> [String; 2] {
    [
        format!(
            "DROP TABLE IF EXISTS {} CASCADE",
            config.qualified_table_name()
        ),
        format!(
            "DROP INDEX IF EXISTS {}.{}_embedding_idx",
            config.schema_name, config.table_name
        ),
    ]
}

impl PgVectorStore {
    pub fn new(
        pool: PgPool,
        config: &VectorStoreConfig,
        dimensions: u32,
        embedding_client: Arc<dyn EmbeddingClient>,
    ) -> Self {
        Self {
            pool,
            schema_name: config.schema_name.clone(),
            table_name: config.qualified_table_name(),
            index_name: format!("{}_embedding_idx", config.table_name),
            dimensions,
            index_type: config.index_type,
            distance_metric: config.distance_metric,
            initialize_schema: config.initialize_schema,
            max_document_batch_size: config.max_document_batch_size,
            embedding_client,
            schema_ready: OnceCell::new(),
        }
    }

    /// Drop the vector table and its index.
    ///
    /// Used at startup so the table is recreated with the current model's
    /// dimensionality.
    pub async fn drop_table(pool: &PgPool, config: &VectorStoreConfig) -> VectorStoreResult<()> {
        info!(
            stage = "vector_operation_started",
            backend = BACKEND,
            operation = "drop_table",
            table_name = %config.qualified_table_name(),
            "Dropping vector store table"
        );
        for statement in drop_table_sql(config) {
            sqlx::query(&statement)
                .execute(pool)
                .await
                .map_err(|e| VectorStoreError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// Create the schema once per store; later calls return immediately.
    async fn ensure_schema(&self) -> VectorStoreResult<()> {
        if !self.initialize_schema {
            return Ok(());
        }
        self.schema_ready
            .get_or_try_init(|| self.initialize())
            .await
            .map(|_| ())
    }

    #[instrument(skip(self), fields(backend = "pgvector", operation = "initialize"))]
    async fn initialize(&self) -> VectorStoreResult<()> {
        let start = Instant::now();
        info!(
            stage = "vector_operation_started",
            backend = BACKEND,
            operation = "initialize",
            table_name = %self.table_name,
            dimensions = self.dimensions,
            "Starting pgvector initialization"
        );

        let statements = [
            "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
            format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema_name),
            self.create_table_sql(),
            self.create_index_sql(),
        ];
        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Database(e.to_string()))?;
        }

        info!(
            stage = "vector_operation_completed",
            backend = BACKEND,
            operation = "initialize",
            status = "success",
            duration_ms = start.elapsed().as_millis() as u64,
            "pgvector initialization completed"
        );
        Ok(())
    }

    fn create_table_sql(&self) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                embedding vector({}) NOT NULL
            )
            "#,
            self.table_name, self.dimensions
        )
    }

    fn create_index_sql(&self) -> String {
        let ops_class = self.distance_metric.pgvector_ops_class();
        match self.index_type {
            PgvectorIndexType::IvfFlat => format!(
                r#"
                CREATE INDEX IF NOT EXISTS {} ON {}
                USING ivfflat (embedding {})
                WITH (lists = 100)
                "#,
                self.index_name, self.table_name, ops_class
            ),
            PgvectorIndexType::Hnsw => format!(
                r#"
                CREATE INDEX IF NOT EXISTS {} ON {}
                USING hnsw (embedding {})
                WITH (m = 16, ef_construction = 64)
                "#,
                self.index_name, self.table_name, ops_class
            ),
        }
    }

    fn upsert_sql(&self) -> String {
        format!(
            r#"
            INSERT INTO {} (id, content, metadata, embedding)
            VALUES ($1, $2, $3, $4::vector)
            ON CONFLICT (id) DO UPDATE SET
                content = EXCLUDED.content,
                metadata = EXCLUDED.metadata,
                embedding = EXCLUDED.embedding
            "#,
            self.table_name
        )
    }

    /// Search query and the bind values of its optional filter.
    ///
    /// Fixed parameters: `$1` query vector, `$2` distance threshold, `$3` limit.
    fn search_sql(&self, filter: Option<&MetadataFilter>) -> (String, Vec<SqlBindValue>) {
        let op = self.distance_metric.pgvector_operator();
        let (filter_clause, bind_values) = match filter {
            Some(filter) => {
                let sql = build_filter_sql(filter, 4);
                (format!(" AND {}", sql.clause), sql.bind_values)
            }
            None => (String::new(), Vec::new()),
        };

        let query = format!(
            r#"
            SELECT id, content, metadata, (embedding {op} $1::vector) AS distance
            FROM {}
            WHERE (embedding {op} $1::vector) <= $2{filter_clause}
            ORDER BY embedding {op} $1::vector
            LIMIT $3
            "#,
            self.table_name
        );
        (query, bind_values)
    }

    /// Convert a raw pgvector distance to a similarity in 0.0-1.0.
    fn distance_to_similarity(&self, distance: f64) -> f64 {
        match self.distance_metric {
            DistanceMetric::Cosine => 1.0 - distance,
            // `<#>` returns the negated inner product.
            DistanceMetric::DotProduct => (1.0 - distance) / 2.0,
            DistanceMetric::Euclidean => 1.0 / (1.0 + distance),
        }
    }

    /// Inverse of `distance_to_similarity`. A threshold of zero or less
    /// accepts every row.
    fn similarity_to_distance_threshold(&self, threshold: f64) -> f64 {
        if threshold <= 0.0 {
            return f64::MAX;
        }
        match self.distance_metric {
            DistanceMetric::Cosine => 1.0 - threshold,
            DistanceMetric::DotProduct => 1.0 - 2.0 * threshold,
            DistanceMetric::Euclidean => (1.0 - threshold) / threshold,
        }
    }

    fn vec_to_pgvector(vec: &[f32]) -> String {
        let values: Vec<String> = vec.iter().map(|v| v.to_string()).collect();
        format!("[{}]", values.join(","))
    }

    fn check_dimensions(&self, operation: &str, embedding: &[f32]) -> VectorStoreResult<()> {
        let expected = self.dimensions as usize;
        if embedding.len() == expected {
            return Ok(());
        }
        warn!(
            stage = "vector_operation_completed",
            backend = BACKEND,
            operation = operation,
            status = "error",
            error = "dimension_mismatch",
            expected = expected,
            actual = embedding.len(),
            "Vector dimension mismatch"
        );
        Err(VectorStoreError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        })
    }

    /// Record metrics and log the outcome of an operation.
    fn finish<T>(
        &self,
        operation: &str,
        start: Instant,
        item_count: usize,
        result: VectorStoreResult<T>,
    ) -> VectorStoreResult<T> {
        let duration = start.elapsed().as_secs_f64();
        let duration_ms = (duration * 1000.0) as u64;
        match &result {
            Ok(_) => {
                record_vector_store_operation(
                    BACKEND,
                    operation,
                    "success",
                    duration,
                    item_count as u32,
                );
                debug!(
                    stage = "vector_operation_completed",
                    backend = BACKEND,
                    operation = operation,
                    status = "success",
                    duration_ms = duration_ms,
                    item_count = item_count,
                    "Vector store operation completed"
                );
            }
            Err(e) => {
                record_vector_store_operation(BACKEND, operation, "error", duration, 0);
                warn!(
                    stage = "vector_operation_completed",
                    backend = BACKEND,
                    operation = operation,
                    status = "error",
                    duration_ms = duration_ms,
                    error = %e,
                    "Vector store operation failed"
                );
            }
        }
        result
    }

    async fn add_batch(&self, documents: &[Document]) -> VectorStoreResult<()> {
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedding_client.embed(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(VectorStoreError::Embedding(
                crate::embedding::EmbeddingError::CountMismatch {
                    expected: documents.len(),
                    actual: embeddings.len(),
                },
            ));
        }
        for embedding in &embeddings {
            self.check_dimensions("add", embedding)?;
        }

        self.ensure_schema().await?;

        let query = self.upsert_sql();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::Database(e.to_string()))?;
        for (document, embedding) in documents.iter().zip(&embeddings) {
            sqlx::query(&query)
                .bind(&document.id)
                .bind(&document.content)
                .bind(Json(&document.metadata))
                .bind(Self::vec_to_pgvector(embedding))
                .execute(&mut *tx)
                .await
                .map_err(|e| VectorStoreError::Database(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| VectorStoreError::Database(e.to_string()))
    }

    async fn search(&self, request: &SearchRequest) -> VectorStoreResult<Vec<ScoredDocument>> {
        let mut embeddings = self
            .embedding_client
            .embed(std::slice::from_ref(&request.query))
            .await?;
        let embedding = embeddings
            .pop()
            .ok_or(crate::embedding::EmbeddingError::EmptyResponse)?;
        self.check_dimensions("similarity_search", &embedding)?;

        self.ensure_schema().await?;

        #[derive(sqlx::FromRow)]
        struct SearchRow {
            id: String,
            content: String,
            metadata: Option<Json<Map<String, Value>>>,
            distance: f64,
        }

        let (query, filter_binds) = self.search_sql(request.filter.as_ref());
        let mut query_builder = sqlx::query_as::<_, SearchRow>(&query)
            .bind(Self::vec_to_pgvector(&embedding))
            .bind(self.similarity_to_distance_threshold(request.similarity_threshold))
            .bind(request.top_k as i64);
        for bind_value in filter_binds {
            query_builder = match bind_value {
                SqlBindValue::String(s) => query_builder.bind(s),
                SqlBindValue::Number(n) => query_builder.bind(n),
                SqlBindValue::Boolean(b) => query_builder.bind(b),
            };
        }

        let rows = query_builder
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| ScoredDocument {
                score: self.distance_to_similarity(row.distance),
                document: Document {
                    id: row.id,
                    content: row.content,
                    metadata: row.metadata.map(|m| m.0).unwrap_or_default(),
                },
            })
            .collect())
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn name(&self) -> &str {
        BACKEND
    }

    fn dimensions(&self) -> Option<u32> {
        Some(self.dimensions)
    }

    #[instrument(skip(self, documents), fields(backend = "pgvector", operation = "add"))]
    async fn add(&self, documents: Vec<Document>) -> VectorStoreResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let start = Instant::now();
        debug!(
            stage = "vector_operation_started",
            backend = BACKEND,
            operation = "add",
            item_count = documents.len(),
            "Starting vector add operation"
        );

        let mut result = Ok(());
        for batch in documents.chunks(self.max_document_batch_size.max(1)) {
            result = self.add_batch(batch).await;
            if result.is_err() {
                break;
            }
        }
        self.finish("add", start, documents.len(), result)
    }

    #[instrument(skip(self, ids), fields(backend = "pgvector", operation = "delete"))]
    async fn delete(&self, ids: &[String]) -> VectorStoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let start = Instant::now();
        let result: VectorStoreResult<PgQueryResult> = async {
            self.ensure_schema().await?;
            let query = format!("DELETE FROM {} WHERE id = ANY($1)", self.table_name);
            sqlx::query(&query)
                .bind(ids.to_vec())
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Database(e.to_string()))
        }
        .await;

        let deleted = result.as_ref().map(|r| r.rows_affected()).unwrap_or(0) as usize;
        self.finish("delete", start, deleted, result.map(|_| ()))
    }

    #[instrument(skip(self, filter), fields(backend = "pgvector", operation = "delete_by_filter"))]
    async fn delete_by_filter(&self, filter: &MetadataFilter) -> VectorStoreResult<()> {
        let start = Instant::now();
        let result: VectorStoreResult<PgQueryResult> = async {
            if filter.matches_all() {
                return Err(VectorStoreError::UnboundedFilter);
            }
            self.ensure_schema().await?;
            let sql = build_filter_sql(filter, 1);
            let query = format!("DELETE FROM {} WHERE {}", self.table_name, sql.clause);
            let mut query_builder = sqlx::query(&query);
            for bind_value in sql.bind_values {
                query_builder = match bind_value {
                    SqlBindValue::String(s) => query_builder.bind(s),
                    SqlBindValue::Number(n) => query_builder.bind(n),
                    SqlBindValue::Boolean(b) => query_builder.bind(b),
                };
            }
            query_builder
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Database(e.to_string()))
        }
        .await;

        let deleted = result.as_ref().map(|r| r.rows_affected()).unwrap_or(0) as usize;
        self.finish("delete_by_filter", start, deleted, result.map(|_| ()))
    }

    #[instrument(skip(self, request), fields(backend = "pgvector", operation = "similarity_search"))]
    async fn similarity_search(
        &self,
        request: &SearchRequest,
    ) -> VectorStoreResult<Vec<ScoredDocument>> {
        if request.top_k == 0 {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        debug!(
            stage = "vector_operation_started",
            backend = BACKEND,
            operation = "similarity_search",
            top_k = request.top_k,
            threshold = request.similarity_threshold,
            "Starting vector search operation"
        );

        let result = self.search(request).await;
        let count = result.as_ref().map(Vec::len).unwrap_or(0);
        self.finish("similarity_search", start, count, result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::embedding::EmbeddingResult;

    #[derive(Debug)]
    struct FixedWidthClient {
        width: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingClient for FixedWidthClient {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![0.1; self.width]).collect())
        }
    }

    fn lazy_pool() -> PgPool {
        PgPool::connect_lazy("postgres://localhost:1/unreachable").unwrap()
    }

    fn store(config: &VectorStoreConfig, dimensions: u32, width: usize) -> PgVectorStore {
        PgVectorStore::new(
            lazy_pool(),
            config,
            dimensions,
            Arc::new(FixedWidthClient {
                width,
                calls: AtomicUsize::new(0),
            }),
        )
    }

    fn normalize(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[tokio::test]
    async fn test_default_schema_sql() {
        let store = store(&VectorStoreConfig::default(), 768, 768);

        assert_eq!(
            normalize(&store.create_table_sql()),
            "CREATE TABLE IF NOT EXISTS public.vector_store ( id TEXT PRIMARY KEY, content TEXT NOT NULL, metadata JSONB NOT NULL DEFAULT '{}'::jsonb, embedding vector(768) NOT NULL )"
        );
        assert_eq!(
            normalize(&store.create_index_sql()),
            "CREATE INDEX IF NOT EXISTS vector_store_embedding_idx ON public.vector_store USING hnsw (embedding vector_cosine_ops) WITH (m = 16, ef_construction = 64)"
        );
        assert_eq!(store.name(), "pgvector");
        assert_eq!(store.dimensions(), Some(768));
    }

    #[test]
    fn test_drop_table_sql_cascades() {
        assert_eq!(
            drop_table_sql(&VectorStoreConfig::default()),
            [
                "DROP TABLE IF EXISTS public.vector_store CASCADE".to_string(),
                "DROP INDEX IF EXISTS public.vector_store_embedding_idx".to_string(),
            ]
        );

        let config = VectorStoreConfig {
            schema_name: "rag".to_string(),
            table_name: "docs".to_string(),
            ..Default::default()
        };
        assert_eq!(
            drop_table_sql(&config)[0],
            "DROP TABLE IF EXISTS rag.docs CASCADE"
        );
    }

    #[tokio::test]
    async fn test_ivfflat_index_sql() {
        let config = VectorStoreConfig {
            table_name: "docs".to_string(),
            index_type: PgvectorIndexType::IvfFlat,
            distance_metric: DistanceMetric::Euclidean,
            ..Default::default()
        };
        let store = store(&config, 1536, 1536);
        let sql = normalize(&store.create_index_sql());
        assert!(sql.contains("docs_embedding_idx ON public.docs USING ivfflat (embedding vector_l2_ops)"));
        assert!(normalize(&store.create_table_sql()).contains("vector(1536)"));
    }

    #[tokio::test]
    async fn test_search_sql_with_filter() {
        let store = store(&VectorStoreConfig::default(), 768, 768);
        let (sql, binds) = store.search_sql(Some(&MetadataFilter::eq("source", "a.md")));
        let sql = normalize(&sql);

        assert!(sql.contains("(embedding <=> $1::vector) AS distance"));
        assert!(sql.contains("WHERE (embedding <=> $1::vector) <= $2 AND (metadata->>$4 = $5)"));
        assert!(sql.ends_with("LIMIT $3"));
        assert_eq!(binds.len(), 2);

        let (sql, binds) = store.search_sql(None);
        assert!(!sql.contains("metadata->>"));
        assert!(binds.is_empty());
    }

    #[tokio::test]
    async fn test_cosine_similarity_conversion() {
        let store = store(&VectorStoreConfig::default(), 768, 768);
        assert_eq!(store.distance_to_similarity(0.0), 1.0);
        assert!((store.distance_to_similarity(0.25) - 0.75).abs() < 1e-9);
        assert!((store.similarity_to_distance_threshold(0.75) - 0.25).abs() < 1e-9);
        assert_eq!(store.similarity_to_distance_threshold(0.0), f64::MAX);
    }

    #[test]
    fn test_vec_to_pgvector() {
        assert_eq!(PgVectorStore::vec_to_pgvector(&[0.5, 1.0, -2.0]), "[0.5,1,-2]");
        assert_eq!(PgVectorStore::vec_to_pgvector(&[]), "[]");
    }

    #[tokio::test]
    async fn test_add_rejects_wrong_width_before_touching_database() {
        let store = store(&VectorStoreConfig::default(), 768, 1536);
        let err = store
            .add(vec![Document::new("Employees get 25 days of leave.")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 768,
                actual: 1536
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_operations_skip_database() {
        let store = store(&VectorStoreConfig::default(), 768, 768);
        store.add(Vec::new()).await.unwrap();
        store.delete(&[]).await.unwrap();
        let hits = store
            .similarity_search(&SearchRequest::new("leave").with_top_k(0))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_unbounded_filter_is_refused() {
        let store = store(&VectorStoreConfig::default(), 768, 768);

        let err = store
            .delete_by_filter(&MetadataFilter::and(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::UnboundedFilter));

        let err = store
            .delete_by_filter(&MetadataFilter::or(vec![MetadataFilter::and(vec![])]))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::UnboundedFilter));
    }
}

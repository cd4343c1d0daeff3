//! Storage backend for the vector store.
//!
//! A missing or unusable database is not an error at this level: the
//! caller receives `None` and falls back to the no-op vector store.

mod error;

pub use error::{DbError, DbResult};

use crate::config::DatabaseConfig;

/// Connection pool handed to the vector store.
#[cfg(feature = "database-postgres")]
pub type DbPool = sqlx::PgPool;

/// Without a database driver compiled in no pool can exist.
#[cfg(not(feature = "database-postgres"))]
#[derive(Debug, Clone)]
pub enum DbPool {}

/// Connect to the configured database and check it can host vectors.
///
/// Returns `None` when no database is configured or it is unusable.
pub async fn connect(config: &DatabaseConfig) -> Option<DbPool> {
    match config {
        DatabaseConfig::None => {
            tracing::info!(
                stage = "storage_checked",
                available = false,
                "No database configured"
            );
            None
        }
        #[cfg(feature = "database-postgres")]
        DatabaseConfig::Postgres(cfg) => match postgres::connect(cfg).await {
            Ok(pool) => {
                tracing::info!(
                    stage = "storage_checked",
                    available = true,
                    "PostgreSQL with pgvector is available"
                );
                Some(pool)
            }
            Err(e) => {
                tracing::warn!(
                    stage = "storage_checked",
                    available = false,
                    error = %e,
                    "PostgreSQL is unavailable, vector store disabled"
                );
                None
            }
        },
    }
}

#[cfg(feature = "database-postgres")]
mod postgres {
    use std::time::Duration;

    use sqlx::{PgPool, postgres::PgPoolOptions};

    use super::{DbError, DbResult};
    use crate::config::PostgresConfig;

    pub(super) async fn connect(cfg: &PostgresConfig) -> DbResult<PgPool> {
        let pool = PgPoolOptions::new()
            .min_connections(cfg.min_connections)
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .idle_timeout(Some(Duration::from_secs(cfg.idle_timeout_secs)))
            .connect(&cfg.url)
            .await?;

        check_vector_extension(&pool).await?;
        Ok(pool)
    }

    async fn check_vector_extension(pool: &PgPool) -> DbResult<()> {
        let available: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pg_available_extensions WHERE name = 'vector')",
        )
        .fetch_one(pool)
        .await?;

        if available {
            Ok(())
        } else {
            Err(DbError::ExtensionUnavailable("vector"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_database_configured() {
        assert!(connect(&DatabaseConfig::None).await.is_none());
    }

    #[cfg(feature = "database-postgres")]
    #[tokio::test]
    async fn test_unreachable_database_is_unavailable() {
        let config = DatabaseConfig::Postgres(crate::config::PostgresConfig {
            url: "postgres://postgres@127.0.0.1:1/vectors".to_string(),
            min_connections: 0,
            max_connections: 1,
            connect_timeout_secs: 1,
            idle_timeout_secs: 10,
        });
        assert!(connect(&config).await.is_none());
    }
}

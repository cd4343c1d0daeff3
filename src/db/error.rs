use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[cfg(feature = "database-postgres")]
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("PostgreSQL extension '{0}' is not available")]
    ExtensionUnavailable(&'static str),
}

pub type DbResult<T> = Result<T, DbError>;

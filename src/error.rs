use thiserror::Error;

/// Application-wide error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    /// A named unique constraint was violated. Carries the constraint name
    /// so the save workflow can report it back to the caller.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                AppError::Pool(err.to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::UniqueViolation(
                    db.constraint().unwrap_or("unique").to_string(),
                )
            }
            other => AppError::Database(other.to_string()),
        }
    }
}

/// Helper conversion from anyhow::Error
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

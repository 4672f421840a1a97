//! # Store Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds context and categorization            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PersistenceError (forecourt-engine) ← Opaque form the recorder logs   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use forecourt_engine::PersistenceError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A record with the same id already exists.
    #[error("duplicate record: {0}")]
    DuplicateRecord(String),

    /// Query execution failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be decoded into its domain type.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint") => {
                StoreError::DuplicateRecord(db_err.message().to_string())
            }
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
                StoreError::ConnectionFailed(err.to_string())
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<StoreError> for PersistenceError {
    fn from(err: StoreError) -> Self {
        PersistenceError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_carries_message() {
        let err: PersistenceError = StoreError::QueryFailed("disk I/O error".into()).into();
        assert!(err.to_string().contains("disk I/O error"));
    }
}

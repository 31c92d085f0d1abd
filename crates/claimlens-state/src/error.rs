//! Error types for claimlens-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the backing database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Configuration error
    #[error("Store configuration invalid: {0}")]
    Config(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by [`crate::JobStore`] operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// No job exists with the requested id
    #[error("job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// Backend (database / transport) failure
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A record could not be (de)serialized
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

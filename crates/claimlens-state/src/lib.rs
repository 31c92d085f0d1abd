//! ClaimLens State: job persistence for the assessment pipeline
//!
//! This crate owns the Job Store collaborator: the explicit persisted job
//! record, its single-writer partial-update operation, and backends.
//!
//! ## Key Components
//!
//! - `JobRecord` / `JobPatch`: the persisted record and its partial update
//! - `JobStore`: async store trait (read-by-id, upsert-by-id, list)
//! - `MemoryJobStore`: in-memory fake for tests
//! - `SurrealJobStore`: SurrealDB backend (`mem://`, `surrealkv://`, `ws://`)

mod error;
pub mod fakes;
mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use storage_traits::{
    EstimateTier, JobId, JobPatch, JobRecord, JobStatus, JobStore, PhotoRef, StageTimes,
    StorageResult,
};
pub use surreal_store::{StoreConfig, SurrealJobStore};

/// Result type for claimlens-state connection operations
pub type Result<T> = std::result::Result<T, StateError>;

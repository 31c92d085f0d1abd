//! Pipeline error taxonomy.

use claimlens_state::{JobStatus, StorageError};

/// Errors produced while running the assessment pipeline.
///
/// All kinds propagate to the orchestrator's single top-level handler, which
/// records the display string on the job and marks it FAILED.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("upstream provider error: {0}")]
    Upstream(String),

    #[error("provider payload failed schema validation: {0}")]
    Parse(String),

    #[error("quality validation failed: {0}")]
    ValidationFailure(String),

    #[error("orchestration error: {0}")]
    Orchestration(String),

    #[error("invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl PipelineError {
    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Upstream(_) => "upstream",
            PipelineError::Parse(_) => "parse",
            PipelineError::ValidationFailure(_) => "validation_failure",
            PipelineError::Orchestration(_) => "orchestration",
            PipelineError::InvalidTransition { .. } => "invalid_transition",
            PipelineError::Storage(_) => "storage",
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Orchestration(format!("serialization failed: {err}"))
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(PipelineError::Upstream("x".into()).kind(), "upstream");
        assert_eq!(PipelineError::Parse("x".into()).kind(), "parse");
        assert_eq!(
            PipelineError::ValidationFailure("x".into()).kind(),
            "validation_failure"
        );
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = PipelineError::InvalidTransition {
            job_id: "job-1".to_string(),
            from: JobStatus::Costing,
            to: JobStatus::Analyzing,
        };
        assert_eq!(
            err.to_string(),
            "invalid status transition for job job-1: COSTING -> ANALYZING"
        );
    }

    #[test]
    fn test_storage_error_wraps() {
        let err: PipelineError = StorageError::Backend("db down".to_string()).into();
        assert!(err.to_string().contains("db down"));
        assert_eq!(err.kind(), "storage");
    }
}

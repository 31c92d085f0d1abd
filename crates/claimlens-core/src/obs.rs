//! Structured observability hooks for the job lifecycle.
//!
//! This module provides:
//! - Job-scoped tracing spans via the `JobSpan` RAII guard
//! - Emission functions for lifecycle events: job start, stage entry and
//!   completion, job finish and failure, review annotations
//!
//! Events are emitted at `info!` level (warnings at `warn!`). Filter with
//! `RUST_LOG`; pass `--json` to the CLI for JSON lines.

use tracing::{info, warn};

/// RAII guard that keeps a job-scoped span entered for the duration of a run.
///
/// Only hold this across synchronous sections; async code should use
/// [`job_span`] with `tracing::Instrument` instead.
///
/// # Example
///
/// ```ignore
/// let _span = JobSpan::enter("job-12345");
/// // every tracing call now carries job_id = "job-12345"
/// ```
pub struct JobSpan {
    _span: tracing::span::EnteredSpan,
}

impl JobSpan {
    /// Create and enter a span tagged with the job id.
    pub fn enter(job_id: &str) -> Self {
        Self {
            _span: job_span(job_id).entered(),
        }
    }
}

/// Span tagged with the job id, for instrumenting futures.
pub fn job_span(job_id: &str) -> tracing::Span {
    tracing::info_span!("claimlens.job", job_id = %job_id)
}

/// Emit event: job started.
pub fn emit_job_started(job_id: &str, photos: usize, zip_code: &str, tier: &str) {
    info!(
        event = "job.started",
        job_id = %job_id,
        photos = photos,
        zip_code = %zip_code,
        tier = %tier,
    );
}

/// Emit event: a stage was entered.
pub fn emit_stage_entered(job_id: &str, stage: &str, status: &str) {
    info!(event = "stage.entered", job_id = %job_id, stage = %stage, status = %status);
}

/// Emit event: a stage completed.
pub fn emit_stage_completed(job_id: &str, stage: &str, duration_ms: u64) {
    info!(
        event = "stage.completed",
        job_id = %job_id,
        stage = %stage,
        duration_ms = duration_ms,
    );
}

/// Emit event: job reached COMPLETE.
pub fn emit_job_finished(job_id: &str, duration_ms: u64, confidence: f64, grand_total: f64) {
    info!(
        event = "job.finished",
        job_id = %job_id,
        duration_ms = duration_ms,
        confidence = confidence,
        grand_total = grand_total,
    );
}

/// Emit event: job reached FAILED (warning level).
pub fn emit_job_failed(job_id: &str, kind: &str, duration_ms: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "job.failed",
        job_id = %job_id,
        kind = %kind,
        duration_ms = duration_ms,
        error = %error,
    );
}

/// Emit event: the validator asked for manual review (warning level).
pub fn emit_review_required(job_id: &str, confidence: f64, warnings: usize) {
    warn!(
        event = "validation.review_required",
        job_id = %job_id,
        confidence = confidence,
        warnings = warnings,
    );
}

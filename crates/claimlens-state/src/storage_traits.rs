//! Storage trait definitions for ClaimLens
//!
//! The Job Store is the only shared resource of the assessment pipeline:
//! - `JobRecord`: the explicit persisted record of one assessment job
//! - `JobPatch`: a partial update applied atomically to a single record
//! - `JobStore`: read-by-id, partial upsert-by-id and listing
//!
//! All traits are async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Identifiers and enums
// ---------------------------------------------------------------------------

/// Unique identifier for an assessment job
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random JobId
    pub fn new() -> Self {
        JobId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

/// Lifecycle status of a job.
///
/// Forward order: CREATED → ANALYZING → VALIDATING → COMPLIANCE_CHECK →
/// COSTING → GENERATING → COMPLETE. FAILED is reachable from every
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    Analyzing,
    Validating,
    ComplianceCheck,
    Costing,
    Generating,
    Complete,
    Failed,
}

impl JobStatus {
    fn rank(self) -> u8 {
        match self {
            JobStatus::Created => 0,
            JobStatus::Analyzing => 1,
            JobStatus::Validating => 2,
            JobStatus::ComplianceCheck => 3,
            JobStatus::Costing => 4,
            JobStatus::Generating => 5,
            JobStatus::Complete => 6,
            JobStatus::Failed => 7,
        }
    }

    /// Stable string form, identical to the serialized representation.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Created => "CREATED",
            JobStatus::Analyzing => "ANALYZING",
            JobStatus::Validating => "VALIDATING",
            JobStatus::ComplianceCheck => "COMPLIANCE_CHECK",
            JobStatus::Costing => "COSTING",
            JobStatus::Generating => "GENERATING",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` respects the forward-only order.
    ///
    /// Re-entering the current state is allowed (stage completion updates
    /// are written under the same status). Stages may be skipped forward.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobStatus::Failed || next == self {
            return true;
        }
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cost profile controlling labor-rate and material-price selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateTier {
    #[serde(alias = "ECONOMY")]
    Economy,
    #[default]
    #[serde(alias = "STANDARD")]
    Standard,
    #[serde(alias = "PREMIUM")]
    Premium,
}

impl EstimateTier {
    pub const ALL: [EstimateTier; 3] = [
        EstimateTier::Economy,
        EstimateTier::Standard,
        EstimateTier::Premium,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EstimateTier::Economy => "economy",
            EstimateTier::Standard => "standard",
            EstimateTier::Premium => "premium",
        }
    }
}

impl std::str::FromStr for EstimateTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "economy" => Ok(EstimateTier::Economy),
            "standard" => Ok(EstimateTier::Standard),
            "premium" => Ok(EstimateTier::Premium),
            other => Err(format!("unknown estimate tier: {other}")),
        }
    }
}

impl std::fmt::Display for EstimateTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

/// Reference to an uploaded photo (blob storage lives outside the core).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRef {
    pub id: String,
    pub url: String,
    #[serde(alias = "file_name")]
    pub file_name: String,
}

/// Start/complete timestamps of one pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimes {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Full persisted job record.
///
/// Progressively populated by the orchestrator through [`JobPatch`] updates;
/// the orchestrator processing a job is the record's only writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    pub property_address: Option<String>,
    pub property_zip: Option<String>,
    pub property_type: Option<String>,
    pub estimate_tier: EstimateTier,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
    /// Per-stage timestamps keyed by stage name
    #[serde(default)]
    pub stages: BTreeMap<String, StageTimes>,
    /// Per-stage output blobs keyed by stage name
    #[serde(default)]
    pub stage_outputs: BTreeMap<String, serde_json::Value>,
    pub confidence_score: Option<f64>,
    pub error_message: Option<String>,
    pub final_assessment: Option<serde_json::Value>,
    pub total_processing_ms: Option<u64>,
    /// SHA-256 of the canonical pipeline input of the latest attempt
    pub input_digest: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create an empty record in CREATED state.
    pub fn new(job_id: JobId) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Created,
            property_address: None,
            property_zip: None,
            property_type: None,
            estimate_tier: EstimateTier::default(),
            photos: Vec::new(),
            stages: BTreeMap::new(),
            stage_outputs: BTreeMap::new(),
            confidence_score: None,
            error_message: None,
            final_assessment: None,
            total_processing_ms: None,
            input_digest: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Apply a partial update. Fields absent from the patch are untouched.
    pub fn apply(&mut self, patch: JobPatch) {
        if patch.reset {
            self.stages.clear();
            self.stage_outputs.clear();
            self.confidence_score = None;
            self.error_message = None;
            self.final_assessment = None;
            self.total_processing_ms = None;
            self.completed_at = None;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(address) = patch.property_address {
            self.property_address = Some(address);
        }
        if let Some(zip) = patch.property_zip {
            self.property_zip = Some(zip);
        }
        if let Some(kind) = patch.property_type {
            self.property_type = Some(kind);
        }
        if let Some(tier) = patch.estimate_tier {
            self.estimate_tier = tier;
        }
        if let Some(photos) = patch.photos {
            self.photos = photos;
        }
        if let Some((stage, at)) = patch.stage_started {
            self.stages.entry(stage).or_default().started_at = Some(at);
        }
        if let Some((stage, at)) = patch.stage_completed {
            self.stages.entry(stage).or_default().completed_at = Some(at);
        }
        if let Some((stage, output)) = patch.stage_output {
            self.stage_outputs.insert(stage, output);
        }
        if let Some(score) = patch.confidence_score {
            self.confidence_score = Some(score);
        }
        if let Some(message) = patch.error_message {
            self.error_message = Some(message);
        }
        if let Some(final_assessment) = patch.final_assessment {
            self.final_assessment = Some(final_assessment);
        }
        if let Some(ms) = patch.total_processing_ms {
            self.total_processing_ms = Some(ms);
        }
        if let Some(digest) = patch.input_digest {
            self.input_digest = Some(digest);
        }
        if let Some(at) = patch.completed_at {
            self.completed_at = Some(at);
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update of a [`JobRecord`].
///
/// Built with the chained setters and handed to [`JobStore::upsert_job`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPatch {
    /// Clear all per-attempt fields before applying the rest of the patch
    pub reset: bool,
    pub status: Option<JobStatus>,
    pub property_address: Option<String>,
    pub property_zip: Option<String>,
    pub property_type: Option<String>,
    pub estimate_tier: Option<EstimateTier>,
    pub photos: Option<Vec<PhotoRef>>,
    pub stage_started: Option<(String, DateTime<Utc>)>,
    pub stage_completed: Option<(String, DateTime<Utc>)>,
    pub stage_output: Option<(String, serde_json::Value)>,
    pub confidence_score: Option<f64>,
    pub error_message: Option<String>,
    pub final_assessment: Option<serde_json::Value>,
    pub total_processing_ms: Option<u64>,
    pub input_digest: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_reset(mut self) -> Self {
        self.reset = true;
        self
    }

    pub fn with_property(
        mut self,
        address: Option<String>,
        zip: Option<String>,
        property_type: Option<String>,
    ) -> Self {
        self.property_address = address;
        self.property_zip = zip;
        self.property_type = property_type;
        self
    }

    pub fn with_tier(mut self, tier: EstimateTier) -> Self {
        self.estimate_tier = Some(tier);
        self
    }

    pub fn with_photos(mut self, photos: Vec<PhotoRef>) -> Self {
        self.photos = Some(photos);
        self
    }

    pub fn stage_started(mut self, stage: &str, at: DateTime<Utc>) -> Self {
        self.stage_started = Some((stage.to_string(), at));
        self
    }

    pub fn stage_completed(mut self, stage: &str, at: DateTime<Utc>) -> Self {
        self.stage_completed = Some((stage.to_string(), at));
        self
    }

    pub fn stage_output(mut self, stage: &str, output: serde_json::Value) -> Self {
        self.stage_output = Some((stage.to_string(), output));
        self
    }

    pub fn with_confidence(mut self, score: f64) -> Self {
        self.confidence_score = Some(score);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_final_assessment(mut self, value: serde_json::Value) -> Self {
        self.final_assessment = Some(value);
        self
    }

    pub fn with_processing_ms(mut self, ms: u64) -> Self {
        self.total_processing_ms = Some(ms);
        self
    }

    pub fn with_input_digest(mut self, digest: impl Into<String>) -> Self {
        self.input_digest = Some(digest.into());
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }
}

// ---------------------------------------------------------------------------
// JobStore
// ---------------------------------------------------------------------------

/// Persistent job store.
///
/// Guarantees:
/// - `upsert_job` applies the whole patch or nothing.
/// - `upsert_job` on an unknown id creates a CREATED record first.
/// - `get_job` on an unknown id returns `StorageError::JobNotFound`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Retrieve a job record by ID.
    async fn get_job(&self, job_id: &JobId) -> StorageResult<JobRecord>;

    /// Apply a partial update to a job, creating it if absent. Returns the
    /// record as stored after the update.
    async fn upsert_job(&self, job_id: &JobId, patch: JobPatch) -> StorageResult<JobRecord>;

    /// List all jobs, newest first.
    async fn list_jobs(&self) -> StorageResult<Vec<JobRecord>>;
}

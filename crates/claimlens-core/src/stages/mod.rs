//! Uniform stage contract and the default four-stage list.
//!
//! The orchestrator knows nothing about individual stages: it walks a
//! `Vec<Arc<dyn Stage>>`, handing each one the [`Dossier`] produced so far.
//! Adding or removing a stage means changing [`default_stages`], not the
//! orchestrator.

pub mod compliance;
pub mod costing;
pub mod normalize;
pub mod validate;

use std::sync::Arc;

use async_trait::async_trait;
use claimlens_state::{EstimateTier, JobId, JobStatus, PhotoRef};
use serde_json::Value;

use crate::domain::{Assessment, PipelineError, PipelineInput, PropertyData, Result};
use crate::policy::PolicyConfig;
use crate::provider::PhotoDescriptionProvider;

pub use compliance::{ComplianceEvaluator, ComplianceReport};
pub use costing::{CostEstimate, CostEstimator};
pub use normalize::AssessmentNormalizer;
pub use validate::{QualityValidator, ValidationReport, ValidationStatus};

/// Read-only job facts shared by every stage of one run.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub job_id: JobId,
    pub photos: Vec<PhotoRef>,
    pub property: PropertyData,
    pub tier: EstimateTier,
}

impl StageContext {
    pub fn from_input(input: &PipelineInput) -> Self {
        Self {
            job_id: input.job_id.clone(),
            photos: input.photos.clone(),
            property: input.property_data.clone(),
            tier: input.tier(),
        }
    }

    pub fn zip_code(&self) -> &str {
        &self.property.zip_code
    }
}

/// Everything the stages have produced so far for one run.
///
/// `assessment` is the working copy: the validator replaces it with the
/// corrected version, and later stages only ever read that one.
#[derive(Debug, Clone, Default)]
pub struct Dossier {
    pub raw_assessment: Option<Assessment>,
    pub assessment: Option<Assessment>,
    pub initial_confidence: Option<f64>,
    pub validation: Option<ValidationReport>,
    pub compliance: Option<ComplianceReport>,
    pub cost: Option<CostEstimate>,
}

impl Dossier {
    /// The current working assessment.
    pub fn assessment(&self) -> Result<&Assessment> {
        self.assessment.as_ref().ok_or_else(|| {
            PipelineError::Orchestration("no assessment available to this stage".to_string())
        })
    }
}

/// Result of one stage invocation.
#[derive(Debug)]
pub struct StageOutcome {
    pub dossier: Dossier,
    /// Persisted as the stage's output blob on the job record
    pub output: Value,
    /// Set when the stage completed but the run must stop here
    pub halt: Option<PipelineError>,
}

impl StageOutcome {
    pub fn proceed(dossier: Dossier, output: Value) -> Self {
        Self {
            dossier,
            output,
            halt: None,
        }
    }

    pub fn halt(dossier: Dossier, output: Value, reason: PipelineError) -> Self {
        Self {
            dossier,
            output,
            halt: Some(reason),
        }
    }
}

/// One pipeline step.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Key used for timestamps and output blobs on the job record.
    fn name(&self) -> &'static str;

    /// Job status while this stage runs.
    fn status(&self) -> JobStatus;

    async fn process(&self, dossier: Dossier, ctx: &StageContext) -> Result<StageOutcome>;
}

/// The standard stage list: normalize, validate, compliance, costing.
pub fn default_stages(
    provider: Arc<dyn PhotoDescriptionProvider>,
    policy: Arc<PolicyConfig>,
) -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(AssessmentNormalizer::new(provider)),
        Arc::new(QualityValidator::new(policy.clone())),
        Arc::new(ComplianceEvaluator::new(policy.clone())),
        Arc::new(CostEstimator::new(policy)),
    ]
}

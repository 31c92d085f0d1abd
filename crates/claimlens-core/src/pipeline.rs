//! Pipeline orchestration and job state recording.
//!
//! The orchestrator walks its stage list strictly in order, writing a
//! partial update to the job store on every stage entry and exit. Any error
//! is handled once, at the top of [`AssessmentPipeline::run`]: the job is
//! marked FAILED with the error text and elapsed time, and the caller gets a
//! failed [`PipelineResult`] rather than an `Err`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use claimlens_state::{JobId, JobPatch, JobStatus, JobStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, Instrument};

use crate::domain::{
    DamageItem, PhotoOrganization, PipelineError, PipelineInput, PropertySummary, Result,
    ScopeEntry,
};
use crate::obs;
use crate::policy::PolicyConfig;
use crate::provider::PhotoDescriptionProvider;
use crate::stages::compliance::ComplianceStatus;
use crate::stages::{
    default_stages, ComplianceReport, CostEstimate, Dossier, Stage, StageContext,
    ValidationStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Complete,
    Failed,
}

/// Run summary stored under `final_assessment.metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentMetadata {
    pub confidence_score: f64,
    pub processing_time_ms: u64,
    pub stages_used: Vec<String>,
    #[serde(default)]
    pub validation_status: Option<ValidationStatus>,
    #[serde(default)]
    pub compliance_status: Option<ComplianceStatus>,
}

/// Combined deliverable of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAssessment {
    pub assessment_id: String,
    pub property: Option<PropertySummary>,
    pub damage_inventory: Vec<DamageItem>,
    pub scope_of_work: Vec<ScopeEntry>,
    pub photo_organization: PhotoOrganization,
    pub recommendations: Vec<String>,
    pub compliance: Option<ComplianceReport>,
    pub cost_estimate: Option<CostEstimate>,
    pub metadata: AssessmentMetadata,
}

impl FinalAssessment {
    /// Assemble from the dossier. The property summary comes from the raw
    /// provider output; everything else from the corrected assessment.
    fn build(
        job_id: &JobId,
        dossier: Dossier,
        stages_used: Vec<String>,
        processing_time_ms: u64,
    ) -> Result<Self> {
        let Dossier {
            raw_assessment,
            assessment,
            initial_confidence,
            validation,
            compliance,
            cost,
        } = dossier;

        let assessment = assessment.ok_or_else(|| {
            PipelineError::Orchestration("pipeline produced no assessment".to_string())
        })?;
        let property = raw_assessment
            .and_then(|raw| raw.property)
            .or_else(|| assessment.property.clone());
        let confidence_score = validation
            .as_ref()
            .map(|v| v.confidence_score)
            .or(initial_confidence)
            .unwrap_or(0.0);

        Ok(Self {
            assessment_id: job_id.to_string(),
            property,
            damage_inventory: assessment.damage_inventory,
            scope_of_work: assessment.scope_of_work,
            photo_organization: assessment.photo_organization,
            recommendations: assessment.recommendations,
            metadata: AssessmentMetadata {
                confidence_score,
                processing_time_ms,
                stages_used,
                validation_status: validation.as_ref().map(|v| v.status),
                compliance_status: compliance.as_ref().map(|c| c.compliance_status),
            },
            compliance,
            cost_estimate: cost,
        })
    }

    pub fn grand_total(&self) -> Option<f64> {
        self.cost_estimate.as_ref().map(|c| c.grand_total)
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub job_id: JobId,
    pub status: RunStatus,
    pub processing_time_ms: u64,
    /// Stage name -> output blob, for every stage that completed
    pub stage_outputs: BTreeMap<String, Value>,
    pub final_assessment: Option<FinalAssessment>,
    pub confidence_score: Option<f64>,
    /// Error recorded on the job when `status` is failed
    pub error: Option<String>,
}

impl PipelineResult {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Complete
    }
}

/// Sequential assessment pipeline over a job store.
pub struct AssessmentPipeline {
    store: Arc<dyn JobStore>,
    stages: Vec<Arc<dyn Stage>>,
    policy: Arc<PolicyConfig>,
}

impl AssessmentPipeline {
    /// Pipeline with the default four stages.
    pub fn new(
        store: Arc<dyn JobStore>,
        provider: Arc<dyn PhotoDescriptionProvider>,
        policy: PolicyConfig,
    ) -> Self {
        let policy = Arc::new(policy);
        Self {
            store,
            stages: default_stages(provider, policy.clone()),
            policy,
        }
    }

    /// Replace the stage list.
    pub fn with_stages(mut self, stages: Vec<Arc<dyn Stage>>) -> Self {
        self.stages = stages;
        self
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Run every stage to completion or failure.
    ///
    /// Returns `Err` only when the failure itself cannot be recorded.
    pub async fn run(&self, input: PipelineInput) -> Result<PipelineResult> {
        let span = obs::job_span(input.job_id.as_str());
        self.execute(input).instrument(span).await
    }

    /// Re-run the whole pipeline for a stored job, from CREATED.
    pub async fn resume(&self, job_id: &JobId) -> Result<PipelineResult> {
        let record = self.store.get_job(job_id).await?;
        info!(
            job_id = %job_id,
            previous_status = %record.status,
            "Resuming job from stored record"
        );
        let input = PipelineInput::from_record(&record, &self.policy.fallback_zip_code);
        self.run(input).await
    }

    async fn execute(&self, input: PipelineInput) -> Result<PipelineResult> {
        let started = Instant::now();
        let job_id = input.job_id.clone();
        obs::emit_job_started(
            job_id.as_str(),
            input.photos.len(),
            &input.property_data.zip_code,
            input.tier().as_str(),
        );

        let mut stage_outputs = BTreeMap::new();
        match self.drive(&input, started, &mut stage_outputs).await {
            Ok(final_assessment) => {
                let processing_time_ms = final_assessment.metadata.processing_time_ms;
                let confidence = final_assessment.metadata.confidence_score;
                obs::emit_job_finished(
                    job_id.as_str(),
                    processing_time_ms,
                    confidence,
                    final_assessment.grand_total().unwrap_or(0.0),
                );
                Ok(PipelineResult {
                    job_id,
                    status: RunStatus::Complete,
                    processing_time_ms,
                    stage_outputs,
                    final_assessment: Some(final_assessment),
                    confidence_score: Some(confidence),
                    error: None,
                })
            }
            Err(err) => {
                let processing_time_ms = elapsed_ms(started);
                let message = err.to_string();
                obs::emit_job_failed(job_id.as_str(), err.kind(), processing_time_ms, &err);

                self.store
                    .upsert_job(
                        &job_id,
                        JobPatch::status(JobStatus::Failed)
                            .with_error(message.clone())
                            .with_processing_ms(processing_time_ms)
                            .completed_at(Utc::now()),
                    )
                    .await?;

                Ok(PipelineResult {
                    job_id,
                    status: RunStatus::Failed,
                    processing_time_ms,
                    stage_outputs,
                    final_assessment: None,
                    confidence_score: None,
                    error: Some(message),
                })
            }
        }
    }

    async fn drive(
        &self,
        input: &PipelineInput,
        started: Instant,
        stage_outputs: &mut BTreeMap<String, Value>,
    ) -> Result<FinalAssessment> {
        let job_id = &input.job_id;
        let property = &input.property_data;

        // A run always starts from a clean CREATED record.
        self.store
            .upsert_job(
                job_id,
                JobPatch::status(JobStatus::Created)
                    .with_reset()
                    .with_property(
                        property.address.clone(),
                        Some(property.zip_code.clone()),
                        property.property_type.clone(),
                    )
                    .with_tier(input.tier())
                    .with_photos(input.photos.clone())
                    .with_input_digest(input.digest()),
            )
            .await?;

        let ctx = StageContext::from_input(input);
        let mut current = JobStatus::Created;
        let mut dossier = Dossier::default();

        for stage in &self.stages {
            let name = stage.name();
            let status = stage.status();
            advance(job_id, &mut current, status)?;

            self.store
                .upsert_job(
                    job_id,
                    JobPatch::status(status).stage_started(name, Utc::now()),
                )
                .await?;
            obs::emit_stage_entered(job_id.as_str(), name, status.as_str());

            let stage_started = Instant::now();
            let outcome = stage.process(dossier, &ctx).await?;

            self.store
                .upsert_job(
                    job_id,
                    JobPatch::status(status)
                        .stage_completed(name, Utc::now())
                        .stage_output(name, outcome.output.clone()),
                )
                .await?;
            obs::emit_stage_completed(job_id.as_str(), name, elapsed_ms(stage_started));
            stage_outputs.insert(name.to_string(), outcome.output);

            if let Some(reason) = outcome.halt {
                return Err(reason);
            }
            dossier = outcome.dossier;
        }

        advance(job_id, &mut current, JobStatus::Generating)?;
        self.store
            .upsert_job(
                job_id,
                JobPatch::status(JobStatus::Generating)
                    .stage_started(GENERATING_STAGE, Utc::now()),
            )
            .await?;

        let processing_time_ms = elapsed_ms(started);
        let final_assessment =
            FinalAssessment::build(job_id, dossier, self.stage_names(), processing_time_ms)?;

        advance(job_id, &mut current, JobStatus::Complete)?;
        self.store
            .upsert_job(
                job_id,
                JobPatch::status(JobStatus::Complete)
                    .stage_completed(GENERATING_STAGE, Utc::now())
                    .with_final_assessment(serde_json::to_value(&final_assessment)?)
                    .with_confidence(final_assessment.metadata.confidence_score)
                    .with_processing_ms(processing_time_ms)
                    .completed_at(Utc::now()),
            )
            .await?;

        Ok(final_assessment)
    }
}

/// Stage-times key for final assessment assembly.
const GENERATING_STAGE: &str = "generating";

fn advance(job_id: &JobId, current: &mut JobStatus, next: JobStatus) -> Result<()> {
    if !current.can_transition_to(next) {
        return Err(PipelineError::InvalidTransition {
            job_id: job_id.to_string(),
            from: *current,
            to: next,
        });
    }
    *current = next;
    Ok(())
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

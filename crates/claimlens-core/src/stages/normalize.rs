//! Stage 1: call the photo description provider, validate its payload and
//! score the initial confidence.

use std::sync::Arc;

use async_trait::async_trait;
use claimlens_state::JobStatus;
use serde::Serialize;
use tracing::{debug, info};

use super::{Dossier, Stage, StageContext, StageOutcome};
use crate::domain::{Assessment, Result};
use crate::provider::{DescriptionRequest, PhotoDescriptionProvider};
use crate::schema::parse_provider_payload;

const UNASSIGNED_PHOTO_WEIGHT: f64 = 0.2;
const MISSING_SCOPE_WEIGHT: f64 = 0.3;

/// Confidence in `[0, 1]` derived from photo assignment and scope coverage.
///
/// A ratio whose denominator is zero contributes nothing.
pub fn initial_confidence(assessment: &Assessment) -> f64 {
    let mut score = 1.0;

    let total_photos = assessment.photo_organization.total_count();
    if total_photos > 0 {
        let unassigned = assessment.photo_organization.unassigned_count();
        score -= (unassigned as f64 / total_photos as f64) * UNASSIGNED_PHOTO_WEIGHT;
    }

    let total_items = assessment.damage_inventory.len();
    if total_items > 0 {
        let without_scope = assessment.items_without_scope();
        score -= (without_scope as f64 / total_items as f64) * MISSING_SCOPE_WEIGHT;
    }

    score.clamp(0.0, 1.0)
}

#[derive(Serialize)]
struct NormalizedOutput<'a> {
    #[serde(flatten)]
    assessment: &'a Assessment,
    confidence_score: f64,
    provider: &'a str,
}

/// Wraps the external provider behind the stage contract.
pub struct AssessmentNormalizer {
    provider: Arc<dyn PhotoDescriptionProvider>,
}

impl AssessmentNormalizer {
    pub fn new(provider: Arc<dyn PhotoDescriptionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Stage for AssessmentNormalizer {
    fn name(&self) -> &'static str {
        "assessment"
    }

    fn status(&self) -> JobStatus {
        JobStatus::Analyzing
    }

    async fn process(&self, mut dossier: Dossier, ctx: &StageContext) -> Result<StageOutcome> {
        let request = DescriptionRequest {
            job_id: ctx.job_id.clone(),
            photos: ctx.photos.clone(),
            property_data: ctx.property.clone(),
        };

        let payload = self.provider.describe(&request).await?;
        debug!(job_id = %ctx.job_id, provider = self.provider.name(), "Provider payload received");

        let assessment = parse_provider_payload(payload)?;
        let confidence = initial_confidence(&assessment);

        info!(
            job_id = %ctx.job_id,
            damage_items = assessment.damage_inventory.len(),
            scope_entries = assessment.scope_of_work.len(),
            confidence = confidence,
            "Assessment normalized"
        );

        let output = serde_json::to_value(NormalizedOutput {
            assessment: &assessment,
            confidence_score: confidence,
            provider: self.provider.name(),
        })?;

        dossier.raw_assessment = Some(assessment.clone());
        dossier.assessment = Some(assessment);
        dossier.initial_confidence = Some(confidence);
        Ok(StageOutcome::proceed(dossier, output))
    }
}

//! Orchestrator entry-point input.

use claimlens_state::{EstimateTier, JobId, JobRecord, PhotoRef};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Property metadata supplied with a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyData {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, rename = "type")]
    pub property_type: Option<String>,
    pub zip_code: String,
}

/// Everything needed to run the pipeline once for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInput {
    pub job_id: JobId,
    pub photos: Vec<PhotoRef>,
    pub property_data: PropertyData,
    #[serde(default)]
    pub estimate_tier: Option<EstimateTier>,
}

impl PipelineInput {
    pub fn tier(&self) -> EstimateTier {
        self.estimate_tier.unwrap_or_default()
    }

    /// Rebuild the input from a stored job record.
    ///
    /// `fallback_zip` is used when the record carries no ZIP code.
    pub fn from_record(record: &JobRecord, fallback_zip: &str) -> Self {
        Self {
            job_id: record.job_id.clone(),
            photos: record.photos.clone(),
            property_data: PropertyData {
                address: record.property_address.clone(),
                property_type: record.property_type.clone(),
                zip_code: record
                    .property_zip
                    .clone()
                    .filter(|z| !z.trim().is_empty())
                    .unwrap_or_else(|| fallback_zip.to_string()),
            },
            estimate_tier: Some(record.estimate_tier),
        }
    }

    /// SHA-256 hex digest of the canonical JSON form of this input.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }
}

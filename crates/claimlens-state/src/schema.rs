//! SurrealDB row mapping for job records
//!
//! `DbJob` mirrors [`crate::storage_traits::JobRecord`] with top-level
//! timestamps stored as native SurrealDB datetimes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_traits::{EstimateTier, JobId, JobRecord, JobStatus, PhotoRef, StageTimes};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Module for serializing optional chrono DateTime to SurrealDB datetime format
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let sd = SurrealDatetime::from(*d);
                serde::Serialize::serialize(&Some(sd), serializer)
            }
            None => serde::Serialize::serialize(&None::<SurrealDatetime>, serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

/// Job row as stored in the `jobs` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbJob {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    pub job_id: String,
    pub status: JobStatus,
    pub property_address: Option<String>,
    pub property_zip: Option<String>,
    pub property_type: Option<String>,
    pub estimate_tier: EstimateTier,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
    #[serde(default)]
    pub stages: BTreeMap<String, StageTimes>,
    #[serde(default)]
    pub stage_outputs: BTreeMap<String, serde_json::Value>,
    pub confidence_score: Option<f64>,
    pub error_message: Option<String>,
    pub final_assessment: Option<serde_json::Value>,
    pub total_processing_ms: Option<u64>,
    pub input_digest: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "surreal_datetime_opt")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<JobRecord> for DbJob {
    fn from(r: JobRecord) -> Self {
        DbJob {
            id: None,
            job_id: r.job_id.0,
            status: r.status,
            property_address: r.property_address,
            property_zip: r.property_zip,
            property_type: r.property_type,
            estimate_tier: r.estimate_tier,
            photos: r.photos,
            stages: r.stages,
            stage_outputs: r.stage_outputs,
            confidence_score: r.confidence_score,
            error_message: r.error_message,
            final_assessment: r.final_assessment,
            total_processing_ms: r.total_processing_ms,
            input_digest: r.input_digest,
            created_at: r.created_at,
            updated_at: r.updated_at,
            completed_at: r.completed_at,
        }
    }
}

impl From<DbJob> for JobRecord {
    fn from(row: DbJob) -> Self {
        JobRecord {
            job_id: JobId(row.job_id),
            status: row.status,
            property_address: row.property_address,
            property_zip: row.property_zip,
            property_type: row.property_type,
            estimate_tier: row.estimate_tier,
            photos: row.photos,
            stages: row.stages,
            stage_outputs: row.stage_outputs,
            confidence_score: row.confidence_score,
            error_message: row.error_message,
            final_assessment: row.final_assessment,
            total_processing_ms: row.total_processing_ms,
            input_digest: row.input_digest,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        }
    }
}

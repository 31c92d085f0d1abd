//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryJobStore`, which satisfies the [`JobStore`] contract
//! without any external dependencies.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryJobStore
// ---------------------------------------------------------------------------

/// In-memory job store backed by a `HashMap<JobId, JobRecord>`.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, JobRecord>>,
    /// Every patch applied, in order (inspection aid for tests)
    history: Mutex<Vec<(JobId, JobPatch)>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fully formed record, replacing any existing one.
    pub fn insert(&self, record: JobRecord) -> StorageResult<()> {
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        jobs.insert(record.job_id.0.clone(), record);
        Ok(())
    }

    /// Statuses written for `job_id`, in write order.
    pub fn status_history(&self, job_id: &JobId) -> Vec<JobStatus> {
        self.history
            .lock()
            .map(|h| {
                h.iter()
                    .filter(|(id, _)| id == job_id)
                    .filter_map(|(_, patch)| patch.status)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get_job(&self, job_id: &JobId) -> StorageResult<JobRecord> {
        let jobs = self
            .jobs
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        jobs.get(&job_id.0)
            .cloned()
            .ok_or_else(|| StorageError::JobNotFound {
                job_id: job_id.0.clone(),
            })
    }

    async fn upsert_job(&self, job_id: &JobId, patch: JobPatch) -> StorageResult<JobRecord> {
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if let Ok(mut history) = self.history.lock() {
            history.push((job_id.clone(), patch.clone()));
        }
        let record = jobs
            .entry(job_id.0.clone())
            .or_insert_with(|| JobRecord::new(job_id.clone()));
        record.apply(patch);
        Ok(record.clone())
    }

    async fn list_jobs(&self) -> StorageResult<Vec<JobRecord>> {
        let jobs = self
            .jobs
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let mut all: Vec<JobRecord> = jobs.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

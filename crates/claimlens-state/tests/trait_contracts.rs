//! Trait contract tests for JobStore.
//!
//! Every conforming implementation must pass these; they run against the
//! in-memory fake and the in-memory SurrealDB backend.

use chrono::Utc;
use claimlens_state::fakes::MemoryJobStore;
use claimlens_state::storage_traits::*;
use claimlens_state::{StorageError, SurrealJobStore};
use serde_json::json;

async fn contract_upsert_creates_missing_job(store: &dyn JobStore) {
    let id = JobId::new();
    let record = store
        .upsert_job(
            &id,
            JobPatch::new()
                .with_property(
                    Some("1 Main St".to_string()),
                    Some("77002".to_string()),
                    Some("SINGLE_FAMILY_RESIDENTIAL".to_string()),
                )
                .with_tier(EstimateTier::Economy),
        )
        .await
        .unwrap();

    assert_eq!(record.job_id, id);
    assert_eq!(record.status, JobStatus::Created);
    assert_eq!(record.estimate_tier, EstimateTier::Economy);

    let fetched = store.get_job(&id).await.unwrap();
    assert_eq!(fetched.property_zip.as_deref(), Some("77002"));
}

async fn contract_get_missing_job_fails(store: &dyn JobStore) {
    let err = store.get_job(&JobId::from("nope")).await.unwrap_err();
    assert!(matches!(err, StorageError::JobNotFound { .. }));
}

async fn contract_partial_update_preserves_other_fields(store: &dyn JobStore) {
    let id = JobId::new();
    store
        .upsert_job(
            &id,
            JobPatch::new().with_photos(vec![PhotoRef {
                id: "p1".to_string(),
                url: "https://blob/p1.jpg".to_string(),
                file_name: "p1.jpg".to_string(),
            }]),
        )
        .await
        .unwrap();

    let started = Utc::now();
    store
        .upsert_job(
            &id,
            JobPatch::status(JobStatus::Analyzing).stage_started("assessment", started),
        )
        .await
        .unwrap();
    store
        .upsert_job(
            &id,
            JobPatch::status(JobStatus::Analyzing)
                .stage_completed("assessment", Utc::now())
                .stage_output("assessment", json!({"damage_inventory": []})),
        )
        .await
        .unwrap();

    let record = store.get_job(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Analyzing);
    assert_eq!(record.photos.len(), 1);
    let times = &record.stages["assessment"];
    assert!(times.started_at.is_some());
    assert!(times.completed_at.is_some());
    assert_eq!(
        record.stage_outputs["assessment"],
        json!({"damage_inventory": []})
    );
}

async fn contract_failure_fields_persist(store: &dyn JobStore) {
    let id = JobId::new();
    store
        .upsert_job(
            &id,
            JobPatch::status(JobStatus::Failed)
                .with_error("Provider unreachable")
                .with_processing_ms(42)
                .completed_at(Utc::now()),
        )
        .await
        .unwrap();

    let record = store.get_job(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some("Provider unreachable"));
    assert_eq!(record.total_processing_ms, Some(42));
    assert!(record.completed_at.is_some());
}

async fn contract_list_contains_all_jobs(store: &dyn JobStore) {
    let a = JobId::new();
    let b = JobId::new();
    store.upsert_job(&a, JobPatch::new()).await.unwrap();
    store.upsert_job(&b, JobPatch::new()).await.unwrap();

    let ids: Vec<JobId> = store
        .list_jobs()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.job_id)
        .collect();
    assert!(ids.contains(&a));
    assert!(ids.contains(&b));
}

// ===========================================================================
// MemoryJobStore
// ===========================================================================

#[tokio::test]
async fn memory_upsert_creates_missing_job() {
    contract_upsert_creates_missing_job(&MemoryJobStore::new()).await;
}

#[tokio::test]
async fn memory_get_missing_job_fails() {
    contract_get_missing_job_fails(&MemoryJobStore::new()).await;
}

#[tokio::test]
async fn memory_partial_update_preserves_other_fields() {
    contract_partial_update_preserves_other_fields(&MemoryJobStore::new()).await;
}

#[tokio::test]
async fn memory_failure_fields_persist() {
    contract_failure_fields_persist(&MemoryJobStore::new()).await;
}

#[tokio::test]
async fn memory_list_contains_all_jobs() {
    contract_list_contains_all_jobs(&MemoryJobStore::new()).await;
}

#[tokio::test]
async fn memory_status_history_tracks_writes() {
    let store = MemoryJobStore::new();
    let id = JobId::new();
    store
        .upsert_job(&id, JobPatch::status(JobStatus::Analyzing))
        .await
        .unwrap();
    store
        .upsert_job(&id, JobPatch::status(JobStatus::Failed))
        .await
        .unwrap();

    assert_eq!(
        store.status_history(&id),
        vec![JobStatus::Analyzing, JobStatus::Failed]
    );
}

// ===========================================================================
// SurrealJobStore (mem://)
// ===========================================================================

#[tokio::test]
async fn surreal_upsert_creates_missing_job() {
    let store = SurrealJobStore::in_memory().await.unwrap();
    contract_upsert_creates_missing_job(&store).await;
}

#[tokio::test]
async fn surreal_get_missing_job_fails() {
    let store = SurrealJobStore::in_memory().await.unwrap();
    contract_get_missing_job_fails(&store).await;
}

#[tokio::test]
async fn surreal_partial_update_preserves_other_fields() {
    let store = SurrealJobStore::in_memory().await.unwrap();
    contract_partial_update_preserves_other_fields(&store).await;
}

#[tokio::test]
async fn surreal_failure_fields_persist() {
    let store = SurrealJobStore::in_memory().await.unwrap();
    contract_failure_fields_persist(&store).await;
}

#[tokio::test]
async fn surreal_list_contains_all_jobs() {
    let store = SurrealJobStore::in_memory().await.unwrap();
    contract_list_contains_all_jobs(&store).await;
}

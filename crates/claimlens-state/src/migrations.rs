//! SurrealDB schema migrations and initialization
//!
//! Sets up the `jobs` table with its constraints and indexes.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all ClaimLens tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing ClaimLens SurrealDB schema");
    init_jobs_table(db).await?;
    info!("ClaimLens schema initialization complete");
    Ok(())
}

/// Initialize `jobs` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE jobs {
///   job_id:              STRING (unique)
///   status:              STRING (CREATED | ANALYZING | ... | COMPLETE | FAILED)
///   property_address:    STRING?
///   property_zip:        STRING? (indexed)
///   property_type:       STRING?
///   estimate_tier:       STRING (economy | standard | premium)
///   photos:              ARRAY<OBJECT>
///   stages:              OBJECT (stage name -> {started_at, completed_at})
///   stage_outputs:       OBJECT (stage name -> output blob)
///   confidence_score:    FLOAT?
///   error_message:       STRING?
///   final_assessment:    OBJECT?
///   total_processing_ms: INT?
///   input_digest:        STRING?
///   created_at:          DATETIME (indexed)
///   updated_at:          DATETIME
///   completed_at:        DATETIME?
/// }
/// ```
///
/// Status transitions are enforced by the orchestrator, not the database.
async fn init_jobs_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing jobs table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS jobs SCHEMALESS
            PERMISSIONS
                FOR select, create, update FULL
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_job_id ON TABLE jobs COLUMNS job_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_job_status ON TABLE jobs COLUMNS status;
        DEFINE INDEX IF NOT EXISTS idx_job_zip ON TABLE jobs COLUMNS property_zip;
        DEFINE INDEX IF NOT EXISTS idx_job_created_at ON TABLE jobs COLUMNS created_at;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ jobs table initialized");
    Ok(())
}

//! SurrealDB-backed JobStore implementation
//!
//! Uses `schema::DbJob` for persistence, converting to/from `storage_traits`
//! types at the boundary.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::schema::DbJob;
use crate::storage_traits::{JobId, JobPatch, JobRecord, JobStore, StorageResult};

/// Default on-disk location used when no database URL is configured
pub const DEFAULT_LOCAL_PATH: &str = ".claimlens/db";

/// Connection settings for the job database
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Endpoint URL (`mem://`, `surrealkv://path`, `ws://host:port`, ...)
    pub url: String,
    /// Namespace (default: "claimlens")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Credentials for remote endpoints
    pub username: Option<String>,
    pub password: Option<String>,
    /// Whether the credentials belong to a root user
    pub is_root: bool,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: "claimlens".to_string(),
            database: "main".to_string(),
            username: None,
            password: None,
            is_root: false,
        }
    }

    /// Set credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - CLAIMLENS_DB_URL (optional, default: `surrealkv://.claimlens/db`)
    /// - CLAIMLENS_DB_NAMESPACE (optional, default: "claimlens")
    /// - CLAIMLENS_DB_DATABASE (optional, default: "main")
    /// - CLAIMLENS_DB_USERNAME / CLAIMLENS_DB_PASSWORD (optional, both or neither)
    /// - CLAIMLENS_DB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, StateError> {
        let url = std::env::var("CLAIMLENS_DB_URL")
            .unwrap_or_else(|_| format!("surrealkv://{DEFAULT_LOCAL_PATH}"));
        let namespace =
            std::env::var("CLAIMLENS_DB_NAMESPACE").unwrap_or_else(|_| "claimlens".to_string());
        let database =
            std::env::var("CLAIMLENS_DB_DATABASE").unwrap_or_else(|_| "main".to_string());
        let username = std::env::var("CLAIMLENS_DB_USERNAME").ok();
        let password = std::env::var("CLAIMLENS_DB_PASSWORD").ok();
        if username.is_some() != password.is_some() {
            return Err(StateError::Config(
                "CLAIMLENS_DB_USERNAME and CLAIMLENS_DB_PASSWORD must be set together".to_string(),
            ));
        }
        let is_root = std::env::var("CLAIMLENS_DB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            url,
            namespace,
            database,
            username,
            password,
            is_root,
        })
    }
}

/// SurrealDB-backed implementation of [`JobStore`].
pub struct SurrealJobStore {
    db: Surreal<Any>,
    /// Serializes read-modify-write cycles so each patch lands atomically
    write_lock: Mutex<()>,
}

impl SurrealJobStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect(&StoreConfig::new("mem://")).await
    }

    /// Connect using an explicit configuration and initialise the schema.
    pub async fn connect(config: &StoreConfig) -> crate::Result<Self> {
        if let Some(path) = config.url.strip_prefix("surrealkv://") {
            std::fs::create_dir_all(path).map_err(|e| {
                StateError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    path, e
                ))
            })?;
        }

        let db = surrealdb::engine::any::connect(&config.url)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.url, e))
            })?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            if config.is_root {
                db.signin(Root {
                    username: username.as_str(),
                    password: password.as_str(),
                })
                .await
                .map_err(|e| StateError::Connection(format!("Root auth failed: {e}")))?;
            } else {
                db.signin(Database {
                    namespace: config.namespace.as_str(),
                    database: config.database.as_str(),
                    username: username.as_str(),
                    password: password.as_str(),
                })
                .await
                .map_err(|e| StateError::Connection(format!("DB auth failed: {e}")))?;
            }
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        info!(url = %config.url, "SurrealJobStore connected");
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// Create from environment variables (see [`StoreConfig::from_env`]).
    pub async fn from_env() -> crate::Result<Self> {
        let config = StoreConfig::from_env()?;
        Self::connect(&config).await
    }

    // -- private helpers -----------------------------------------------------

    async fn fetch_job(&self, jid: &str) -> StorageResult<Option<DbJob>> {
        let jid_owned = jid.to_string();
        let mut res = self
            .db
            .query("SELECT * FROM jobs WHERE job_id = $jid")
            .bind(("jid", jid_owned))
            .await
            .and_then(|res| res.check())
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<DbJob> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl JobStore for SurrealJobStore {
    async fn get_job(&self, job_id: &JobId) -> StorageResult<JobRecord> {
        self.fetch_job(&job_id.0)
            .await?
            .map(JobRecord::from)
            .ok_or_else(|| StorageError::JobNotFound {
                job_id: job_id.0.clone(),
            })
    }

    async fn upsert_job(&self, job_id: &JobId, patch: JobPatch) -> StorageResult<JobRecord> {
        let _guard = self.write_lock.lock().await;

        match self.fetch_job(&job_id.0).await? {
            Some(row) => {
                let mut record = JobRecord::from(row);
                record.apply(patch);
                let updated = DbJob::from(record.clone());
                let jid_owned = job_id.0.clone();

                debug!(job_id = %job_id, status = %record.status, "updating job");

                let mut res = self
                    .db
                    .query("UPDATE jobs CONTENT $row WHERE job_id = $jid")
                    .bind(("row", updated))
                    .bind(("jid", jid_owned))
                    .await
                    .and_then(|res| res.check())
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                let rows: Vec<DbJob> = res
                    .take(0)
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                if rows.is_empty() {
                    return Err(StorageError::Backend(format!(
                        "update of job {} matched no rows",
                        job_id
                    )));
                }

                Ok(record)
            }
            None => {
                let mut record = JobRecord::new(job_id.clone());
                record.apply(patch);

                debug!(job_id = %job_id, status = %record.status, "creating job");

                let _created: Option<DbJob> = self
                    .db
                    .create("jobs")
                    .content(DbJob::from(record.clone()))
                    .await
                    .map_err(|e| StorageError::Backend(e.to_string()))?;

                Ok(record)
            }
        }
    }

    async fn list_jobs(&self) -> StorageResult<Vec<JobRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM jobs ORDER BY created_at DESC")
            .await
            .and_then(|res| res.check())
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let rows: Vec<DbJob> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(rows.into_iter().map(JobRecord::from).collect())
    }
}

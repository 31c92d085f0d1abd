//! Photo description provider boundary.
//!
//! Photographic damage recognition is an external capability. The pipeline
//! only sees it through [`PhotoDescriptionProvider`], whose output is treated
//! as untrusted JSON until it passes [`crate::schema::parse_provider_payload`].

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use claimlens_state::{JobId, PhotoRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{PipelineError, PropertyData};

/// Request sent to the provider for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionRequest {
    pub job_id: JobId,
    pub photos: Vec<PhotoRef>,
    pub property_data: PropertyData,
}

/// Provider failures. Every variant surfaces as [`PipelineError::Upstream`].
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transport(String),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider returned an unusable body: {0}")]
    InvalidBody(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        PipelineError::Upstream(err.to_string())
    }
}

/// External photo description capability.
#[async_trait]
pub trait PhotoDescriptionProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Describe the damage visible in the request's photos.
    async fn describe(&self, request: &DescriptionRequest) -> Result<Value, ProviderError>;
}

// ---------------------------------------------------------------------------
// HTTP provider
// ---------------------------------------------------------------------------

/// HTTP provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Endpoint receiving `POST` description requests
    pub endpoint: String,
    /// Bearer token (optional)
    pub token: Option<String>,
}

impl ProviderConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - CLAIMLENS_PROVIDER_URL (required)
    /// - CLAIMLENS_PROVIDER_TOKEN (optional)
    pub fn from_env() -> Result<Self, ProviderError> {
        let endpoint = std::env::var("CLAIMLENS_PROVIDER_URL").map_err(|_| {
            ProviderError::Unavailable("CLAIMLENS_PROVIDER_URL not set".to_string())
        })?;
        Ok(Self {
            endpoint,
            token: std::env::var("CLAIMLENS_PROVIDER_TOKEN").ok(),
        })
    }
}

/// Provider reached over HTTP. No request timeout is applied here; callers
/// impose deadlines externally.
pub struct HttpDescriptionProvider {
    config: ProviderConfig,
    http_client: reqwest::Client,
}

impl HttpDescriptionProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("claimlens-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Create provider from environment variables
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(ProviderConfig::from_env()?)
    }
}

#[async_trait]
impl PhotoDescriptionProvider for HttpDescriptionProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn describe(&self, request: &DescriptionRequest) -> Result<Value, ProviderError> {
        info!(
            job_id = %request.job_id,
            photos = request.photos.len(),
            endpoint = %self.config.endpoint,
            "Requesting photo description"
        );

        let mut builder = self.http_client.post(&self.config.endpoint).json(request);
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidBody(e.to_string()))?;
        debug!(job_id = %request.job_id, "Provider response received");
        Ok(body)
    }
}

// ---------------------------------------------------------------------------
// Static provider
// ---------------------------------------------------------------------------

/// Provider that replays a fixed response. Used by tests and by the CLI's
/// `--provider-fixture` mode.
#[derive(Debug)]
pub struct StaticDescriptionProvider {
    response: Result<Value, String>,
    calls: AtomicUsize,
}

impl StaticDescriptionProvider {
    pub fn new(response: Value) -> Self {
        Self {
            response: Ok(response),
            calls: AtomicUsize::new(0),
        }
    }

    /// Provider that always fails as if unreachable.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Load the response from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ProviderError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Unavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidBody(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(value))
    }

    /// Number of `describe` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhotoDescriptionProvider for StaticDescriptionProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn describe(&self, _request: &DescriptionRequest) -> Result<Value, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Ok(value) => Ok(value.clone()),
            Err(message) => Err(ProviderError::Unavailable(message.clone())),
        }
    }
}

//! ClaimLens Core Library
//!
//! Turns property-damage photos and property metadata into a damage
//! assessment, a compliance review and a cost estimate through four
//! sequential stages:
//!
//! 1. `AssessmentNormalizer` - provider call, schema check, initial confidence
//! 2. `QualityValidator` - five quality checks and language correction
//! 3. `ComplianceEvaluator` - jurisdiction, permits, fraud risk, carrier fit
//! 4. `CostEstimator` - regional, tier-aware task pricing
//!
//! `AssessmentPipeline` sequences them and records every state transition on
//! a `claimlens_state::JobStore`.

pub mod domain;
pub mod obs;
pub mod pipeline;
pub mod policy;
pub mod provider;
pub mod schema;
pub mod stages;
pub mod telemetry;

pub use domain::{
    Assessment, DamageItem, Elevation, LocationType, PhotoOrganization, PipelineError,
    PipelineInput, PropertyData, PropertySummary, Result, ScopeEntry, Severity, Task,
};

pub use pipeline::{AssessmentMetadata, AssessmentPipeline, FinalAssessment, PipelineResult, RunStatus};

pub use policy::{
    CompliancePolicy, CostingPolicy, FraudPolicy, PolicyConfig, PolicyError, TierComparisonMode,
    ValidationPolicy,
};

pub use provider::{
    DescriptionRequest, HttpDescriptionProvider, PhotoDescriptionProvider, ProviderConfig,
    ProviderError, StaticDescriptionProvider,
};

pub use schema::parse_provider_payload;

pub use stages::{
    default_stages, AssessmentNormalizer, ComplianceEvaluator, ComplianceReport, CostEstimate,
    CostEstimator, Dossier, QualityValidator, Stage, StageContext, StageOutcome,
    ValidationReport, ValidationStatus,
};

pub use telemetry::init_tracing;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

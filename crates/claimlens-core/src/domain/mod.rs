//! Domain types for the ClaimLens assessment pipeline.

pub mod assessment;
pub mod error;
pub mod input;

pub use assessment::{
    Assessment, DamageItem, Elevation, LocationType, PhotoOrganization, PropertySummary,
    ScopeEntry, Severity, Task,
};
pub use error::{PipelineError, Result};
pub use input::{PipelineInput, PropertyData};

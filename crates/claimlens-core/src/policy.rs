//! Policy parameters for validation, compliance, fraud scoring and costing.
//!
//! Every threshold the stages use lives here with its default. A TOML file
//! may override any subset; omitted sections and keys keep their defaults.
//!
//! ```toml
//! [fraud]
//! severe_ratio_points = 20.0
//!
//! [costing]
//! tier_comparison = "recompute"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors raised while loading a policy file.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("cannot read policy file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("policy file is not valid TOML: {0}")]
    Parse(String),

    #[error("invalid policy value: {0}")]
    Invalid(String),
}

/// Full policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// ZIP used when a resumed job has none stored
    pub fallback_zip_code: String,
    pub validation: ValidationPolicy,
    pub compliance: CompliancePolicy,
    pub fraud: FraudPolicy,
    pub costing: CostingPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            fallback_zip_code: "77001".to_string(),
            validation: ValidationPolicy::default(),
            compliance: CompliancePolicy::default(),
            fraud: FraudPolicy::default(),
            costing: CostingPolicy::default(),
        }
    }
}

impl PolicyConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, PolicyError> {
        let config: PolicyConfig =
            toml::from_str(text).map_err(|e| PolicyError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let text = std::fs::read_to_string(path).map_err(|e| PolicyError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, PolicyError> {
        toml::to_string_pretty(self).map_err(|e| PolicyError::Parse(e.to_string()))
    }

    /// Reject values that would break score bounds or pricing.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(PolicyError::Invalid(format!("{name} must be within [0, 1], got {v}")))
            }
        };
        let non_negative = |name: &str, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(PolicyError::Invalid(format!("{name} must be >= 0, got {v}")))
            }
        };

        unit("validation.warning_penalty", self.validation.warning_penalty)?;
        unit(
            "validation.review_confidence_floor",
            self.validation.review_confidence_floor,
        )?;
        unit(
            "compliance.photo_coverage_min",
            self.compliance.photo_coverage_min,
        )?;
        non_negative(
            "compliance.roofing_permit_min_sq_ft",
            self.compliance.roofing_permit_min_sq_ft,
        )?;
        unit("fraud.severe_ratio_threshold", self.fraud.severe_ratio_threshold)?;
        non_negative(
            "fraud.unassigned_ratio_threshold",
            self.fraud.unassigned_ratio_threshold,
        )?;
        non_negative("fraud.severe_ratio_points", self.fraud.severe_ratio_points)?;
        non_negative(
            "fraud.unassigned_ratio_points",
            self.fraud.unassigned_ratio_points,
        )?;
        non_negative("fraud.max_score", self.fraud.max_score)?;
        non_negative("fraud.high_risk_above", self.fraud.high_risk_above)?;
        non_negative("fraud.medium_risk_above", self.fraud.medium_risk_above)?;
        if self.fraud.medium_risk_above > self.fraud.high_risk_above {
            return Err(PolicyError::Invalid(
                "fraud.medium_risk_above must not exceed fraud.high_risk_above".to_string(),
            ));
        }
        unit("costing.overhead_rate", self.costing.overhead_rate)?;
        unit("costing.profit_rate", self.costing.profit_rate)?;
        non_negative("costing.economy_factor", self.costing.economy_factor)?;
        non_negative("costing.premium_factor", self.costing.premium_factor)?;
        Ok(())
    }
}

/// Quality validator thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// A severe item with fewer tasks raises a consistency warning
    pub severe_min_tasks: usize,
    /// A minor item with more tasks raises a consistency warning
    pub minor_max_tasks: usize,
    /// Confidence deducted per warning
    pub warning_penalty: f64,
    /// Below this confidence the result needs review
    pub review_confidence_floor: f64,
    /// More warnings than this and the result needs review
    pub review_warning_limit: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            severe_min_tasks: 3,
            minor_max_tasks: 5,
            warning_penalty: 0.05,
            review_confidence_floor: 0.9,
            review_warning_limit: 2,
        }
    }
}

/// Compliance evaluator thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompliancePolicy {
    /// Minimum share of damage items with photo evidence
    pub photo_coverage_min: f64,
    /// More flagged checks than this requires attention
    pub requires_attention_flag_limit: usize,
    /// Roofing area above which a permit is required
    pub roofing_permit_min_sq_ft: f64,
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        Self {
            photo_coverage_min: 0.8,
            requires_attention_flag_limit: 2,
            roofing_permit_min_sq_ft: 100.0,
        }
    }
}

/// Additive fraud-risk heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudPolicy {
    pub severe_ratio_threshold: f64,
    pub severe_ratio_points: f64,
    pub unassigned_ratio_threshold: f64,
    pub unassigned_ratio_points: f64,
    pub high_risk_above: f64,
    pub medium_risk_above: f64,
    /// Scores are clamped into `[0, max_score]`
    pub max_score: f64,
}

impl Default for FraudPolicy {
    fn default() -> Self {
        Self {
            severe_ratio_threshold: 0.7,
            severe_ratio_points: 15.0,
            unassigned_ratio_threshold: 0.3,
            unassigned_ratio_points: 10.0,
            high_risk_above: 30.0,
            medium_risk_above: 15.0,
            max_score: 100.0,
        }
    }
}

/// How the economy/standard/premium comparison figures are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierComparisonMode {
    /// Scale the standard-tier total by fixed factors
    #[default]
    Scalar,
    /// Price every task again at each tier
    Recompute,
}

/// Cost estimator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostingPolicy {
    pub overhead_rate: f64,
    pub profit_rate: f64,
    pub tier_comparison: TierComparisonMode,
    pub economy_factor: f64,
    pub premium_factor: f64,
}

impl Default for CostingPolicy {
    fn default() -> Self {
        Self {
            overhead_rate: 0.20,
            profit_rate: 0.10,
            tier_comparison: TierComparisonMode::Scalar,
            economy_factor: 0.75,
            premium_factor: 1.45,
        }
    }
}

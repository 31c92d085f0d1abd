//! Stage 3: jurisdiction, building-code and insurance checks, permits,
//! fraud-risk scoring and carrier compatibility.

use std::sync::Arc;

use async_trait::async_trait;
use claimlens_state::JobStatus;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Dossier, Stage, StageContext, StageOutcome};
use crate::domain::{Assessment, Result};
use crate::policy::{CompliancePolicy, FraudPolicy, PolicyConfig};

const JURISDICTIONS: &[(&str, &str)] = &[
    ("77001", "Houston, TX (Harris County)"),
    ("77002", "Houston, TX (Harris County)"),
    ("90001", "Los Angeles, CA (Los Angeles County)"),
    ("10001", "New York, NY (New York County)"),
    ("60601", "Chicago, IL (Cook County)"),
];

/// Trades that must be performed by licensed professionals.
const LICENSED_TRADES: &[&str] = &["electrical", "plumbing", "hvac"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Approved,
    ApprovedWithNotes,
    RequiresAttention,
}

impl ComplianceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplianceStatus::Approved => "approved",
            ComplianceStatus::ApprovedWithNotes => "approved_with_notes",
            ComplianceStatus::RequiresAttention => "requires_attention",
        }
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceCheckStatus {
    Pass,
    Flagged,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub category: String,
    pub status: ComplianceCheckStatus,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permit {
    pub permit_type: String,
    pub reason: String,
    pub estimated_cost: f64,
    pub timeline_days: u32,
}

impl Permit {
    fn new(permit_type: &str, reason: impl Into<String>, cost: f64, days: u32) -> Self {
        Self {
            permit_type: permit_type.to_string(),
            reason: reason.into(),
            estimated_cost: cost,
            timeline_days: days,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudIndicators {
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentationStandard {
    MeetsRequirements,
    NeedsImprovement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierCompatibility {
    pub xactimate_compatible: bool,
    pub symbility_compatible: bool,
    pub documentation_standard: DocumentationStandard,
}

/// Compliance evaluator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub compliance_status: ComplianceStatus,
    pub jurisdiction: String,
    pub checks: Vec<ComplianceCheck>,
    pub permits_required: Vec<Permit>,
    pub fraud_indicators: FraudIndicators,
    pub carrier_compatibility: CarrierCompatibility,
    pub recommendations: Vec<String>,
}

/// Jurisdiction label for a ZIP code. Unknown codes get a placeholder label.
pub fn jurisdiction_for(zip_code: &str) -> String {
    let zip_code = zip_code.trim();
    JURISDICTIONS
        .iter()
        .find(|(zip, _)| *zip == zip_code)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| format!("ZIP {zip_code} (Jurisdiction TBD)"))
}

fn has_trade(assessment: &Assessment, trade: &str) -> bool {
    assessment.all_tasks().any(|t| t.is_trade(trade))
}

fn check_building_codes(assessment: &Assessment) -> ComplianceCheck {
    let mut issues = Vec::new();
    if assessment
        .all_tasks()
        .any(|t| t.description.to_lowercase().contains("structural"))
    {
        issues.push("Structural work may require engineer approval");
    }
    if has_trade(assessment, "electrical") {
        issues.push("Electrical work must be performed by licensed electrician");
    }

    ComplianceCheck {
        category: "building_codes".to_string(),
        status: if issues.is_empty() {
            ComplianceCheckStatus::Pass
        } else {
            ComplianceCheckStatus::Flagged
        },
        notes: if issues.is_empty() {
            "All work complies with 2021 International Building Code".to_string()
        } else {
            issues.join("; ")
        },
    }
}

fn check_insurance_standards(assessment: &Assessment, policy: &CompliancePolicy) -> ComplianceCheck {
    let total_items = assessment.damage_inventory.len();
    let with_photos = total_items - assessment.items_without_photos();
    let coverage = if total_items == 0 {
        1.0
    } else {
        with_photos as f64 / total_items as f64
    };

    let mut issues = Vec::new();
    if coverage < policy.photo_coverage_min {
        issues.push(format!(
            "Insufficient photo documentation (< {:.0}% of damage items)",
            policy.photo_coverage_min * 100.0
        ));
    }
    if assessment.task_count() < total_items {
        issues.push("Scope tasks insufficient for damage items".to_string());
    }

    ComplianceCheck {
        category: "insurance_standards".to_string(),
        status: if issues.is_empty() {
            ComplianceCheckStatus::Pass
        } else {
            ComplianceCheckStatus::Warning
        },
        notes: if issues.is_empty() {
            "Meets carrier documentation standards".to_string()
        } else {
            issues.join("; ")
        },
    }
}

/// Total area of roofing tasks measured in square feet.
fn roofing_area(assessment: &Assessment) -> f64 {
    assessment
        .all_tasks()
        .filter(|t| t.is_trade("roofing") && t.unit_normalized() == "sq ft")
        .map(|t| t.quantity_or_zero())
        .sum()
}

fn permits_required(assessment: &Assessment, policy: &CompliancePolicy) -> Vec<Permit> {
    let mut permits = Vec::new();

    if has_trade(assessment, "electrical") {
        permits.push(Permit::new(
            "Electrical",
            "Electrical work requires permit",
            150.0,
            5,
        ));
    }

    let area = roofing_area(assessment);
    if area > policy.roofing_permit_min_sq_ft {
        permits.push(Permit::new(
            "Roofing",
            format!("Roof work exceeds {area} sq ft"),
            125.0,
            3,
        ));
    }

    if has_trade(assessment, "plumbing") {
        permits.push(Permit::new(
            "Plumbing",
            "Plumbing modifications require permit",
            100.0,
            3,
        ));
    }

    permits
}

/// Additive fraud-risk score, clamped into `[0, policy.max_score]`.
pub fn score_fraud(assessment: &Assessment, policy: &FraudPolicy) -> FraudIndicators {
    let total_items = assessment.damage_inventory.len();
    let mut flags = Vec::new();
    let mut score = 0.0;

    let severe = assessment
        .damage_inventory
        .iter()
        .filter(|d| d.is_severe_or_critical())
        .count();
    if severe as f64 > total_items as f64 * policy.severe_ratio_threshold {
        flags.push("High proportion of severe damage claims".to_string());
        score += policy.severe_ratio_points;
    }

    let unassigned_ratio =
        assessment.photo_organization.unassigned_count() as f64 / (total_items + 1) as f64;
    if unassigned_ratio > policy.unassigned_ratio_threshold {
        flags.push("High number of unassigned photos".to_string());
        score += policy.unassigned_ratio_points;
    }

    let score = score.clamp(0.0, policy.max_score);
    let risk_level = if score > policy.high_risk_above {
        RiskLevel::High
    } else if score > policy.medium_risk_above {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    FraudIndicators {
        risk_level,
        risk_score: score,
        flags,
    }
}

fn carrier_compatibility(assessment: &Assessment) -> CarrierCompatibility {
    let proper_scope = assessment.all_tasks().all(|t| t.has_required_fields());
    let documented = assessment.items_without_photos() == 0;

    CarrierCompatibility {
        xactimate_compatible: proper_scope,
        symbility_compatible: proper_scope,
        documentation_standard: if documented {
            DocumentationStandard::MeetsRequirements
        } else {
            DocumentationStandard::NeedsImprovement
        },
    }
}

fn recommendations(assessment: &Assessment, permits: &[Permit]) -> Vec<String> {
    let mut out = Vec::new();

    if !permits.is_empty() {
        let total_cost: f64 = permits.iter().map(|p| p.estimated_cost).sum();
        let max_days = permits.iter().map(|p| p.timeline_days).max().unwrap_or(0);
        out.push(format!(
            "Obtain {} permit(s) - Total: ${}, Timeline: {} days",
            permits.len(),
            total_cost,
            max_days
        ));
    }

    if LICENSED_TRADES.iter().any(|trade| has_trade(assessment, trade)) {
        out.push("Ensure all licensed trades are performed by certified professionals".to_string());
    }

    if assessment
        .damage_inventory
        .iter()
        .any(|d| !d.safety_concerns.is_empty())
    {
        out.push("Address all safety concerns before beginning repair work".to_string());
    }

    out
}

/// Evaluate an assessment against jurisdiction and carrier requirements.
pub fn evaluate_compliance(
    assessment: &Assessment,
    zip_code: &str,
    policy: &PolicyConfig,
) -> ComplianceReport {
    let checks = vec![
        check_building_codes(assessment),
        check_insurance_standards(assessment, &policy.compliance),
    ];
    let permits = permits_required(assessment, &policy.compliance);

    let flagged = checks
        .iter()
        .filter(|c| c.status == ComplianceCheckStatus::Flagged)
        .count();
    let compliance_status = if flagged > policy.compliance.requires_attention_flag_limit {
        ComplianceStatus::RequiresAttention
    } else if !permits.is_empty() || flagged > 0 {
        ComplianceStatus::ApprovedWithNotes
    } else {
        ComplianceStatus::Approved
    };

    ComplianceReport {
        compliance_status,
        jurisdiction: jurisdiction_for(zip_code),
        recommendations: recommendations(assessment, &permits),
        fraud_indicators: score_fraud(assessment, &policy.fraud),
        carrier_compatibility: carrier_compatibility(assessment),
        checks,
        permits_required: permits,
    }
}

/// Stage 3 wrapper around [`evaluate_compliance`].
pub struct ComplianceEvaluator {
    policy: Arc<PolicyConfig>,
}

impl ComplianceEvaluator {
    pub fn new(policy: Arc<PolicyConfig>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Stage for ComplianceEvaluator {
    fn name(&self) -> &'static str {
        "compliance"
    }

    fn status(&self) -> JobStatus {
        JobStatus::ComplianceCheck
    }

    async fn process(&self, mut dossier: Dossier, ctx: &StageContext) -> Result<StageOutcome> {
        let report = evaluate_compliance(dossier.assessment()?, ctx.zip_code(), &self.policy);

        info!(
            job_id = %ctx.job_id,
            status = %report.compliance_status,
            jurisdiction = %report.jurisdiction,
            permits = report.permits_required.len(),
            fraud_score = report.fraud_indicators.risk_score,
            "Compliance evaluation complete"
        );

        let output = serde_json::to_value(&report)?;
        dossier.compliance = Some(report);
        Ok(StageOutcome::proceed(dossier, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assessment(tasks: serde_json::Value) -> Assessment {
        serde_json::from_value(json!({
            "damage_inventory": [{
                "item_id": "d1",
                "location": "Roof",
                "location_type": "exterior",
                "elevation": "roof",
                "damage_type": "hail",
                "severity": "moderate",
                "description": "Hail impact on shingles",
                "photos": ["p1"]
            }],
            "scope_of_work": [{"damage_item_id": "d1", "tasks": tasks}],
            "photo_organization": {"exterior": {"roof": ["p1"]}}
        }))
        .unwrap()
    }

    #[test]
    fn test_known_and_unknown_jurisdictions() {
        assert_eq!(jurisdiction_for("77002"), "Houston, TX (Harris County)");
        assert_eq!(jurisdiction_for("60601"), "Chicago, IL (Cook County)");
        assert_eq!(jurisdiction_for("99999"), "ZIP 99999 (Jurisdiction TBD)");
    }

    #[test]
    fn test_clean_scope_is_approved() {
        let a = assessment(json!([
            {"task_id": "t1", "description": "Replace shingles", "quantity": 80, "unit": "sq ft", "trade": "roofing"}
        ]));
        let report = evaluate_compliance(&a, "77001", &PolicyConfig::default());
        assert_eq!(report.compliance_status, ComplianceStatus::Approved);
        assert!(report.permits_required.is_empty());
        assert!(report.recommendations.is_empty());
        assert!(report.carrier_compatibility.xactimate_compatible);
    }

    #[test]
    fn test_electrical_work_flags_and_requires_permit() {
        let a = assessment(json!([
            {"task_id": "t1", "description": "Replace outlet", "quantity": 1, "unit": "each", "trade": "electrical"}
        ]));
        let report = evaluate_compliance(&a, "77001", &PolicyConfig::default());
        assert_eq!(report.checks[0].status, ComplianceCheckStatus::Flagged);
        assert_eq!(report.compliance_status, ComplianceStatus::ApprovedWithNotes);
        assert_eq!(report.permits_required[0].permit_type, "Electrical");
        assert_eq!(
            report.recommendations,
            vec![
                "Obtain 1 permit(s) - Total: $150, Timeline: 5 days".to_string(),
                "Ensure all licensed trades are performed by certified professionals".to_string()
            ]
        );
    }

    #[test]
    fn test_permits_summarize_cost_and_longest_timeline() {
        let a = assessment(json!([
            {"task_id": "t1", "description": "Rewire", "quantity": 1, "unit": "each", "trade": "electrical"},
            {"task_id": "t2", "description": "Replace supply line", "quantity": 1, "unit": "each", "trade": "plumbing"}
        ]));
        let report = evaluate_compliance(&a, "77001", &PolicyConfig::default());
        assert_eq!(report.permits_required.len(), 2);
        assert_eq!(
            report.recommendations[0],
            "Obtain 2 permit(s) - Total: $250, Timeline: 5 days"
        );
    }

    #[test]
    fn test_structural_description_flags_building_codes() {
        let a = assessment(json!([
            {"task_id": "t1", "description": "Sister Structural rafter", "quantity": 2, "unit": "each", "trade": "general_carpentry"}
        ]));
        let check = check_building_codes(&a);
        assert_eq!(check.status, ComplianceCheckStatus::Flagged);
        assert_eq!(check.notes, "Structural work may require engineer approval");
    }

    #[test]
    fn test_insurance_warning_on_thin_scope() {
        let a = assessment(json!([]));
        let check = check_insurance_standards(&a, &CompliancePolicy::default());
        assert_eq!(check.status, ComplianceCheckStatus::Warning);
        assert_eq!(check.notes, "Scope tasks insufficient for damage items");
    }

    #[test]
    fn test_fraud_score_is_clamped() {
        let mut a = assessment(json!([]));
        a.damage_inventory[0].severity = crate::domain::Severity::Critical;
        a.photo_organization.unassigned = vec!["p2".to_string()];
        let policy = FraudPolicy {
            severe_ratio_points: 80.0,
            unassigned_ratio_points: 80.0,
            ..FraudPolicy::default()
        };
        let fraud = score_fraud(&a, &policy);
        assert_eq!(fraud.risk_score, 100.0);
        assert_eq!(fraud.risk_level, RiskLevel::High);
        assert_eq!(fraud.flags.len(), 2);
    }
}

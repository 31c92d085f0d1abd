//! Stage 2: quality checks and language correction.
//!
//! Five checks run in a fixed order. Photo correlation and scope alignment
//! can fail the run; completeness and consistency only warn. The language
//! pass rewrites informal wording in damage descriptions and always passes.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use claimlens_state::JobStatus;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Dossier, Stage, StageContext, StageOutcome};
use crate::domain::{Assessment, PipelineError, Result, Severity};
use crate::obs;
use crate::policy::{PolicyConfig, ValidationPolicy};

/// Informal phrase -> professional replacement, applied in this order.
const LEXICON: &[(&str, &str)] = &[
    ("really bad", "severe"),
    ("messed up", "damaged"),
    ("broken", "damaged"),
    ("busted", "damaged"),
    ("needs fixed", "requires repair"),
    ("sheetrock", "drywall"),
];

const CORRECTION_REASON: &str = "Professionalized language";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warning,
    Fail,
}

/// Result of one quality check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub check: String,
    pub status: CheckStatus,
    pub details: String,
}

impl CheckOutcome {
    fn from_issues(check: &str, issues: Vec<String>, on_issue: CheckStatus, clean: &str) -> Self {
        if issues.is_empty() {
            Self {
                check: check.to_string(),
                status: CheckStatus::Pass,
                details: clean.to_string(),
            }
        } else {
            Self {
                check: check.to_string(),
                status: on_issue,
                details: issues.join("; "),
            }
        }
    }
}

/// One applied language substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub field: String,
    pub original: String,
    pub corrected: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pass,
    NeedsReview,
    Fail,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Pass => "pass",
            ValidationStatus::NeedsReview => "needs_review",
            ValidationStatus::Fail => "fail",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full validator output, including the corrected assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub confidence_score: f64,
    pub validations: Vec<CheckOutcome>,
    pub corrections_made: Vec<Correction>,
    pub enhanced_assessment: Assessment,
}

impl ValidationReport {
    pub fn warning_count(&self) -> usize {
        self.count(CheckStatus::Warning)
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.validations
            .iter()
            .filter(|v| v.status == CheckStatus::Fail)
    }

    fn count(&self, status: CheckStatus) -> usize {
        self.validations.iter().filter(|v| v.status == status).count()
    }

    /// Human-readable summary of the failing checks.
    pub fn failure_summary(&self) -> String {
        self.failed_checks()
            .map(|c| format!("{}: {}", c.check, c.details))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Unassigned photos, items without photos, items without scope.
pub fn check_completeness(assessment: &Assessment) -> CheckOutcome {
    let mut issues = Vec::new();

    let unassigned = assessment.photo_organization.unassigned_count();
    if unassigned > 0 {
        issues.push(format!("{unassigned} photos remain unclassified"));
    }
    let without_photos = assessment.items_without_photos();
    if without_photos > 0 {
        issues.push(format!("{without_photos} damage items lack photo evidence"));
    }
    let without_scope = assessment.items_without_scope();
    if without_scope > 0 {
        issues.push(format!("{without_scope} damage items lack repair scope"));
    }

    CheckOutcome::from_issues(
        "completeness",
        issues,
        CheckStatus::Warning,
        "All elements complete",
    )
}

/// Severity against task volume. Items with no scope at all are left to
/// the completeness check.
pub fn check_consistency(assessment: &Assessment, policy: &ValidationPolicy) -> CheckOutcome {
    let mut issues = Vec::new();

    for item in &assessment.damage_inventory {
        if !assessment.has_scope(&item.item_id) {
            continue;
        }
        let task_count = assessment.tasks_for(&item.item_id).count();

        if item.severity == Severity::Severe && task_count < policy.severe_min_tasks {
            issues.push(format!(
                "Damage {} marked severe but only {} tasks",
                item.item_id, task_count
            ));
        }
        if item.severity == Severity::Minor && task_count > policy.minor_max_tasks {
            issues.push(format!(
                "Damage {} marked minor but has {} tasks",
                item.item_id, task_count
            ));
        }
    }

    CheckOutcome::from_issues(
        "consistency",
        issues,
        CheckStatus::Warning,
        "Severity and scope aligned",
    )
}

/// Every photo a damage item cites must be in the photo organization.
pub fn check_photo_correlation(assessment: &Assessment) -> CheckOutcome {
    let index = assessment.photo_organization.all_photo_ids();
    let issues = assessment
        .damage_inventory
        .iter()
        .flat_map(|item| item.photos.iter())
        .filter(|photo| !index.contains(photo.as_str()))
        .map(|photo| format!("Photo {photo} referenced but not in organization"))
        .collect();

    CheckOutcome::from_issues(
        "photo_correlation",
        issues,
        CheckStatus::Fail,
        "All photos properly correlated",
    )
}

/// Scope entries must resolve to damage items and carry complete tasks.
pub fn check_scope_alignment(assessment: &Assessment) -> CheckOutcome {
    let item_ids: HashSet<&str> = assessment
        .damage_inventory
        .iter()
        .map(|d| d.item_id.as_str())
        .collect();
    let mut issues = Vec::new();

    for entry in &assessment.scope_of_work {
        if !item_ids.contains(entry.damage_item_id.as_str()) {
            issues.push(format!(
                "Scope references non-existent damage item {}",
                entry.damage_item_id
            ));
        }
        for task in &entry.tasks {
            if !task.has_required_fields() {
                issues.push(format!("Task {} missing required fields", task.task_id));
            }
        }
    }

    CheckOutcome::from_issues(
        "scope_alignment",
        issues,
        CheckStatus::Fail,
        "Scope properly aligned with damage",
    )
}

fn lexicon() -> &'static [(Regex, &'static str)] {
    static COMPILED: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        LEXICON
            .iter()
            .filter_map(|(informal, professional)| {
                Regex::new(&format!("(?i){}", regex::escape(informal)))
                    .ok()
                    .map(|re| (re, *professional))
            })
            .collect()
    })
}

/// Rewrite informal phrases in one piece of text. Returns `None` when
/// nothing matched.
pub fn professionalize(text: &str) -> Option<String> {
    let mut corrected = text.to_string();
    let mut changed = false;
    for (pattern, replacement) in lexicon() {
        if pattern.is_match(&corrected) {
            corrected = pattern.replace_all(&corrected, *replacement).into_owned();
            changed = true;
        }
    }
    changed.then_some(corrected)
}

/// Apply the lexicon to every damage description in place.
pub fn normalize_language(assessment: &mut Assessment) -> Vec<Correction> {
    let mut corrections = Vec::new();
    for item in &mut assessment.damage_inventory {
        if let Some(corrected) = professionalize(&item.description) {
            corrections.push(Correction {
                field: format!("damage_inventory[{}].description", item.item_id),
                original: std::mem::replace(&mut item.description, corrected.clone()),
                corrected,
                reason: CORRECTION_REASON.to_string(),
            });
        }
    }
    corrections
}

fn language_outcome(corrections: &[Correction]) -> CheckOutcome {
    let details = if corrections.is_empty() {
        "Professional terminology maintained".to_string()
    } else {
        format!("{} language corrections applied", corrections.len())
    };
    CheckOutcome {
        check: "professional_language".to_string(),
        status: CheckStatus::Pass,
        details,
    }
}

/// Run all five checks and decide the overall status.
pub fn validate_assessment(mut assessment: Assessment, policy: &ValidationPolicy) -> ValidationReport {
    let mut validations = vec![
        check_completeness(&assessment),
        check_consistency(&assessment, policy),
        check_photo_correlation(&assessment),
        check_scope_alignment(&assessment),
    ];
    let corrections = normalize_language(&mut assessment);
    validations.push(language_outcome(&corrections));

    let passed = validations
        .iter()
        .filter(|v| v.status == CheckStatus::Pass)
        .count();
    let warnings = validations
        .iter()
        .filter(|v| v.status == CheckStatus::Warning)
        .count();
    let failed = validations
        .iter()
        .filter(|v| v.status == CheckStatus::Fail)
        .count();

    let confidence = (passed as f64 / validations.len() as f64
        - policy.warning_penalty * warnings as f64)
        .clamp(0.0, 1.0);

    let status = if failed > 0 {
        ValidationStatus::Fail
    } else if warnings > policy.review_warning_limit || confidence < policy.review_confidence_floor
    {
        ValidationStatus::NeedsReview
    } else {
        ValidationStatus::Pass
    };

    ValidationReport {
        status,
        confidence_score: confidence,
        validations,
        corrections_made: corrections,
        enhanced_assessment: assessment,
    }
}

/// Stage 2 wrapper around [`validate_assessment`].
pub struct QualityValidator {
    policy: Arc<PolicyConfig>,
}

impl QualityValidator {
    pub fn new(policy: Arc<PolicyConfig>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Stage for QualityValidator {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn status(&self) -> JobStatus {
        JobStatus::Validating
    }

    async fn process(&self, mut dossier: Dossier, ctx: &StageContext) -> Result<StageOutcome> {
        let assessment = dossier.assessment()?.clone();
        let report = validate_assessment(assessment, &self.policy.validation);

        info!(
            job_id = %ctx.job_id,
            status = %report.status,
            confidence = report.confidence_score,
            corrections = report.corrections_made.len(),
            "Quality validation complete"
        );

        let output = serde_json::to_value(&report)?;
        dossier.assessment = Some(report.enhanced_assessment.clone());

        let halt = match report.status {
            ValidationStatus::Fail => {
                warn!(job_id = %ctx.job_id, "Quality validation failed, halting pipeline");
                Some(PipelineError::ValidationFailure(report.failure_summary()))
            }
            ValidationStatus::NeedsReview => {
                obs::emit_review_required(
                    ctx.job_id.as_str(),
                    report.confidence_score,
                    report.warning_count(),
                );
                None
            }
            ValidationStatus::Pass => None,
        };

        dossier.validation = Some(report);
        Ok(match halt {
            Some(reason) => StageOutcome::halt(dossier, output, reason),
            None => StageOutcome::proceed(dossier, output),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> serde_json::Value {
        json!({
            "damage_inventory": [{
                "item_id": "d1",
                "location": "Kitchen",
                "location_type": "interior",
                "damage_type": "water",
                "severity": "moderate",
                "description": "Sheetrock is broken near the sink",
                "photos": ["p1"]
            }],
            "scope_of_work": [{
                "damage_item_id": "d1",
                "tasks": [{"task_id": "t1", "description": "Replace drywall", "quantity": 40, "unit": "sq ft", "trade": "drywall"}]
            }],
            "photo_organization": {"interior": {"Kitchen": ["p1"]}}
        })
    }

    fn parse(v: serde_json::Value) -> Assessment {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_clean_assessment_passes() {
        let report = validate_assessment(parse(base()), &ValidationPolicy::default());
        assert_eq!(report.status, ValidationStatus::Pass);
        assert_eq!(report.confidence_score, 1.0);
        assert_eq!(report.validations.len(), 5);
        let names: Vec<&str> = report.validations.iter().map(|v| v.check.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "completeness",
                "consistency",
                "photo_correlation",
                "scope_alignment",
                "professional_language"
            ]
        );
    }

    #[test]
    fn test_language_corrections_are_recorded_and_applied() {
        let report = validate_assessment(parse(base()), &ValidationPolicy::default());
        assert_eq!(report.corrections_made.len(), 1);
        let correction = &report.corrections_made[0];
        assert_eq!(correction.field, "damage_inventory[d1].description");
        assert_eq!(correction.original, "Sheetrock is broken near the sink");
        assert_eq!(correction.corrected, "drywall is damaged near the sink");
        assert_eq!(correction.reason, "Professionalized language");
        assert_eq!(
            report.enhanced_assessment.damage_inventory[0].description,
            "drywall is damaged near the sink"
        );
    }

    #[test]
    fn test_language_normalization_is_idempotent() {
        let mut assessment = parse(base());
        assert_eq!(normalize_language(&mut assessment).len(), 1);
        assert!(normalize_language(&mut assessment).is_empty());
    }

    #[test]
    fn test_unknown_photo_fails_correlation() {
        let mut v = base();
        v["damage_inventory"][0]["photos"] = json!(["p1", "p9"]);
        let outcome = check_photo_correlation(&parse(v));
        assert_eq!(outcome.status, CheckStatus::Fail);
        assert_eq!(outcome.details, "Photo p9 referenced but not in organization");
    }

    #[test]
    fn test_dangling_scope_fails_alignment() {
        let mut v = base();
        v["scope_of_work"][0]["damage_item_id"] = json!("d404");
        let report = validate_assessment(parse(v), &ValidationPolicy::default());
        assert_eq!(report.status, ValidationStatus::Fail);
        assert!(report
            .failure_summary()
            .contains("Scope references non-existent damage item d404"));
    }

    #[test]
    fn test_task_missing_unit_fails_alignment() {
        let mut v = base();
        v["scope_of_work"][0]["tasks"][0]
            .as_object_mut()
            .unwrap()
            .remove("unit");
        let outcome = check_scope_alignment(&parse(v));
        assert_eq!(outcome.status, CheckStatus::Fail);
        assert_eq!(outcome.details, "Task t1 missing required fields");
    }

    #[test]
    fn test_severe_item_with_one_task_warns() {
        let mut v = base();
        v["damage_inventory"][0]["severity"] = json!("severe");
        let report = validate_assessment(parse(v), &ValidationPolicy::default());
        assert_eq!(report.validations[1].status, CheckStatus::Warning);
        assert_eq!(
            report.validations[1].details,
            "Damage d1 marked severe but only 1 tasks"
        );
        // 4/5 - 0.05
        assert!((report.confidence_score - 0.75).abs() < 1e-9);
        assert_eq!(report.status, ValidationStatus::NeedsReview);
    }

    #[test]
    fn test_consistency_counts_tasks_across_scope_entries() {
        let mut v = base();
        v["damage_inventory"][0]["severity"] = json!("severe");
        let extra = json!({
            "damage_item_id": "d1",
            "tasks": [
                {"task_id": "t2", "description": "Prime wall", "quantity": 40, "unit": "sq ft", "trade": "painting"},
                {"task_id": "t3", "description": "Paint wall", "quantity": 40, "unit": "sq ft", "trade": "painting"}
            ]
        });
        v["scope_of_work"].as_array_mut().unwrap().push(extra);
        let outcome = check_consistency(&parse(v), &ValidationPolicy::default());
        assert_eq!(outcome.status, CheckStatus::Pass);
    }

    #[test]
    fn test_policy_changes_consistency_threshold() {
        let mut v = base();
        v["damage_inventory"][0]["severity"] = json!("severe");
        let policy = ValidationPolicy {
            severe_min_tasks: 1,
            ..ValidationPolicy::default()
        };
        assert_eq!(check_consistency(&parse(v), &policy).status, CheckStatus::Pass);
    }

    #[test]
    fn test_confidence_clamped_at_zero() {
        let policy = ValidationPolicy {
            warning_penalty: 1.0,
            ..ValidationPolicy::default()
        };
        let mut v = base();
        v["damage_inventory"][0]["severity"] = json!("severe");
        v["photo_organization"]["unassigned"] = json!(["p2"]);
        let report = validate_assessment(parse(v), &policy);
        assert_eq!(report.confidence_score, 0.0);
    }
}

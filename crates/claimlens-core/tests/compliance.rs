//! Compliance evaluator: jurisdictions, permits, fraud scoring, carrier checks.

use claimlens_core::stages::compliance::{
    evaluate_compliance, jurisdiction_for, score_fraud, ComplianceStatus, DocumentationStandard,
    RiskLevel,
};
use claimlens_core::{parse_provider_payload, Assessment, FraudPolicy, PolicyConfig};
use serde_json::{json, Value};

fn fixture() -> Value {
    serde_json::from_str(include_str!("fixtures/assessment.json")).unwrap()
}

fn parse(v: Value) -> Assessment {
    parse_provider_payload(v).unwrap()
}

#[test]
fn test_roofing_permit_cites_combined_area() {
    // 90 + 60 sq ft of roofing; the linear-ft drip edge does not count
    let report = evaluate_compliance(&parse(fixture()), "77002", &PolicyConfig::default());

    let roofing = report
        .permits_required
        .iter()
        .find(|p| p.permit_type == "Roofing")
        .expect("roofing permit");
    assert_eq!(roofing.reason, "Roof work exceeds 150 sq ft");
    assert_eq!(roofing.estimated_cost, 125.0);
    assert_eq!(roofing.timeline_days, 3);
}

#[test]
fn test_fixture_report() {
    let report = evaluate_compliance(&parse(fixture()), "77002", &PolicyConfig::default());

    assert_eq!(report.jurisdiction, "Houston, TX (Harris County)");
    assert_eq!(report.compliance_status, ComplianceStatus::ApprovedWithNotes);
    let permits: Vec<&str> = report
        .permits_required
        .iter()
        .map(|p| p.permit_type.as_str())
        .collect();
    assert_eq!(permits, vec!["Roofing", "Plumbing"]);
    assert_eq!(
        report.recommendations,
        vec![
            "Obtain 2 permit(s) - Total: $225, Timeline: 3 days".to_string(),
            "Ensure all licensed trades are performed by certified professionals".to_string(),
            "Address all safety concerns before beginning repair work".to_string(),
        ]
    );
    assert_eq!(report.fraud_indicators.risk_level, RiskLevel::Low);
    assert!(report.fraud_indicators.flags.is_empty());
    assert!(report.carrier_compatibility.xactimate_compatible);
    assert!(report.carrier_compatibility.symbility_compatible);
    assert_eq!(
        report.carrier_compatibility.documentation_standard,
        DocumentationStandard::MeetsRequirements
    );
}

#[test]
fn test_small_roof_job_needs_no_permit() {
    let mut v = fixture();
    v["scope_of_work"][1]["tasks"][0]["quantity"] = json!(30);
    let report = evaluate_compliance(&parse(v), "77002", &PolicyConfig::default());
    assert!(report
        .permits_required
        .iter()
        .all(|p| p.permit_type != "Roofing"));
}

#[test]
fn test_unknown_zip_gets_fallback_label() {
    assert_eq!(jurisdiction_for("59718"), "ZIP 59718 (Jurisdiction TBD)");
    let report = evaluate_compliance(&parse(fixture()), "59718", &PolicyConfig::default());
    assert_eq!(report.jurisdiction, "ZIP 59718 (Jurisdiction TBD)");
}

#[test]
fn test_missing_photos_degrade_documentation() {
    let mut v = fixture();
    v["damage_inventory"][1]["photos"] = json!([]);
    let report = evaluate_compliance(&parse(v), "77002", &PolicyConfig::default());

    let insurance = &report.checks[1];
    assert_eq!(insurance.category, "insurance_standards");
    assert_eq!(
        insurance.notes,
        "Insufficient photo documentation (< 80% of damage items)"
    );
    assert_eq!(
        report.carrier_compatibility.documentation_standard,
        DocumentationStandard::NeedsImprovement
    );
}

#[test]
fn test_incomplete_task_breaks_carrier_compatibility() {
    let mut v = fixture();
    v["scope_of_work"][0]["tasks"][0]
        .as_object_mut()
        .unwrap()
        .remove("quantity");
    let report = evaluate_compliance(&parse(v), "77002", &PolicyConfig::default());
    assert!(!report.carrier_compatibility.xactimate_compatible);
    assert!(!report.carrier_compatibility.symbility_compatible);
}

#[test]
fn test_flag_limit_controls_requires_attention() {
    let mut v = fixture();
    v["scope_of_work"][0]["tasks"][2]["trade"] = json!("electrical");
    let mut policy = PolicyConfig::default();
    policy.compliance.requires_attention_flag_limit = 0;

    let report = evaluate_compliance(&parse(v), "77002", &policy);
    assert_eq!(report.compliance_status, ComplianceStatus::RequiresAttention);
}

fn all_severe_with_loose_photos() -> Assessment {
    let mut v = fixture();
    v["damage_inventory"][0]["severity"] = json!("critical");
    v["photo_organization"]["unassigned"] = json!(["p7", "p8"]);
    parse(v)
}

#[test]
fn test_default_fraud_points_reach_medium() {
    let fraud = score_fraud(&all_severe_with_loose_photos(), &FraudPolicy::default());
    assert_eq!(fraud.risk_score, 25.0);
    assert_eq!(fraud.risk_level, RiskLevel::Medium);
    assert_eq!(
        fraud.flags,
        vec![
            "High proportion of severe damage claims".to_string(),
            "High number of unassigned photos".to_string(),
        ]
    );
}

#[test]
fn test_fraud_high_when_combined_score_exceeds_threshold() {
    let policy = FraudPolicy {
        severe_ratio_points: 20.0,
        unassigned_ratio_points: 15.0,
        ..FraudPolicy::default()
    };
    let fraud = score_fraud(&all_severe_with_loose_photos(), &policy);
    assert_eq!(fraud.risk_score, 35.0);
    assert_eq!(fraud.risk_level, RiskLevel::High);
}

#[test]
fn test_fraud_thresholds_are_strict() {
    // Exactly 70% severe does not trigger
    let mut v = fixture();
    let mut items = Vec::new();
    for i in 0..10 {
        let mut item = v["damage_inventory"][1].clone();
        item["item_id"] = json!(format!("x{i}"));
        item["severity"] = json!(if i < 7 { "severe" } else { "minor" });
        items.push(item);
    }
    v["damage_inventory"] = json!(items);
    v["scope_of_work"] = json!([]);
    let fraud = score_fraud(&parse(v), &FraudPolicy::default());
    assert_eq!(fraud.risk_score, 0.0);
    assert_eq!(fraud.risk_level, RiskLevel::Low);
}

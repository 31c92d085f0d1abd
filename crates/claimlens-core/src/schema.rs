//! Boundary validation of provider payloads.
//!
//! The photo description provider returns free-form JSON. Nothing enters the
//! typed domain model until it has passed [`parse_provider_payload`].

use std::collections::HashSet;

use serde_json::Value;

use crate::domain::{Assessment, PipelineError, Result};

/// Parse and validate a provider payload into an [`Assessment`].
///
/// Accepts either a JSON object or a JSON string holding the object (text
/// responses, optionally wrapped in a Markdown code fence). Fails with
/// [`PipelineError::Parse`] when the shape does not match.
pub fn parse_provider_payload(payload: Value) -> Result<Assessment> {
    let payload = match payload {
        Value::String(text) => {
            let body = strip_code_fence(&text);
            serde_json::from_str::<Value>(body)
                .map_err(|e| PipelineError::Parse(format!("payload text is not JSON: {e}")))?
        }
        other => other,
    };

    if !payload.is_object() {
        return Err(PipelineError::Parse(format!(
            "expected a JSON object, got {}",
            json_type(&payload)
        )));
    }

    let assessment: Assessment =
        serde_json::from_value(payload).map_err(|e| PipelineError::Parse(e.to_string()))?;

    check_structure(&assessment)?;
    Ok(assessment)
}

fn check_structure(assessment: &Assessment) -> Result<()> {
    let mut seen = HashSet::new();
    for item in &assessment.damage_inventory {
        if item.item_id.trim().is_empty() {
            return Err(PipelineError::Parse(
                "damage_inventory item with empty item_id".to_string(),
            ));
        }
        if !seen.insert(item.item_id.as_str()) {
            return Err(PipelineError::Parse(format!(
                "duplicate damage item id {}",
                item.item_id
            )));
        }
    }

    for entry in &assessment.scope_of_work {
        for task in &entry.tasks {
            if let Some(q) = task.quantity {
                if !q.is_finite() || q < 0.0 {
                    return Err(PipelineError::Parse(format!(
                        "task {} has invalid quantity {}",
                        task.task_id, q
                    )));
                }
            }
        }
    }
    Ok(())
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

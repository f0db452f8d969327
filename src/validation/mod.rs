//! Validation engine
//!
//! Compiles a tracker schema into a validation-clean form (UI keywords
//! stripped, caller-supplied enum values merged) and checks a candidate
//! payload against it, producing structured per-field errors. A negative
//! result never raises: the report is data for the caller to branch on.

mod check;
mod clean;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::schema::TrackerSchema;

pub use clean::{clean_schema, CustomEnumValues};

/// Outcome of validating a payload against a tracker schema
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    /// Human-readable `path: message` lines, in schema order
    pub errors: Vec<String>,
    /// Per-field messages keyed by dotted path, for attaching to inputs
    pub field_errors: BTreeMap<String, Vec<String>>,
}

/// Validate `payload` against `schema`, merging `custom_enum_values` into
/// declared enum lists before checking.
pub fn validate(
    schema: &TrackerSchema,
    payload: &Value,
    custom_enum_values: Option<&CustomEnumValues>,
) -> ValidationReport {
    let cleaned = clean_schema(schema, custom_enum_values);
    let violations = check::check_payload(&cleaned, payload);

    let mut report = ValidationReport {
        is_valid: violations.is_empty(),
        ..ValidationReport::default()
    };

    for violation in violations {
        let label = if violation.path.is_empty() {
            "root"
        } else {
            violation.path.as_str()
        };
        report.errors.push(format!("{label}: {}", violation.message));

        if !violation.path.is_empty() {
            let messages = report.field_errors.entry(violation.path).or_default();
            if !messages.contains(&violation.message) {
                messages.push(violation.message);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TrackerSchema {
        serde_json::from_value(serde_json::json!({
            "type": "object",
            "properties": {
                "mood": { "type": "string", "enum": ["happy", "sad"] },
                "wakeTime": { "type": "string", "format": "time" },
                "peeLog": {
                    "type": "object",
                    "dependsOn": "mood",
                    "required": ["time"],
                    "properties": { "time": { "type": "string" } }
                }
            },
            "required": ["mood"]
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_payload() {
        let report = validate(
            &schema(),
            &serde_json::json!({ "mood": "happy", "wakeTime": "26:99" }),
            None,
        );
        // Time values are deliberately checked as plain strings
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
        assert!(report.field_errors.is_empty());
    }

    #[test]
    fn test_custom_enum_value_accepted() {
        let mut custom = CustomEnumValues::new();
        custom.insert("mood".into(), vec!["angry".into()]);

        let without = validate(&schema(), &serde_json::json!({ "mood": "angry" }), None);
        assert!(!without.is_valid);

        let with = validate(
            &schema(),
            &serde_json::json!({ "mood": "angry" }),
            Some(&custom),
        );
        assert!(with.is_valid);
    }

    #[test]
    fn test_report_carries_dotted_field_errors() {
        let report = validate(
            &schema(),
            &serde_json::json!({ "mood": "happy", "peeLog": {} }),
            None,
        );
        assert!(!report.is_valid);
        assert_eq!(report.errors, ["peeLog.time: This field is required"]);
        assert_eq!(
            report.field_errors["peeLog.time"],
            ["This field is required"]
        );
    }

    #[test]
    fn test_duplicate_messages_deduplicated() {
        // Both a type failure and an enum check cannot fire twice with the
        // same message, but a repeated message for one field collapses.
        let report = validate(&schema(), &serde_json::json!({ "mood": 3 }), None);
        assert_eq!(report.field_errors["mood"], ["must be string"]);
    }
}

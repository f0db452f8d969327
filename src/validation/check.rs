//! Payload checker
//!
//! Walks a validation-clean schema against a candidate payload and collects
//! violations addressed by dotted field path. Required-property failures
//! report at the path of the *missing* field (`parent.missingChild`), which
//! is what lets a form attach the message to the right input. Unknown
//! payload keys are ignored.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::schema::{FieldType, SchemaNode, TrackerSchema, ValueFormat};

/// One validation failure at a dotted field path; an empty path addresses
/// the payload root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

const REQUIRED_MESSAGE: &str = "This field is required";

/// Check a payload against a cleaned schema
pub fn check_payload(schema: &TrackerSchema, payload: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();

    let Some(object) = payload.as_object() else {
        violations.push(Violation {
            path: String::new(),
            message: "must be object".into(),
        });
        return violations;
    };

    if let Some(required) = &schema.required {
        for name in required {
            if !object.contains_key(name) {
                violations.push(required_violation(None, name));
            }
        }
    }

    for (name, node) in &schema.properties {
        if let Some(value) = object.get(name) {
            check_node(name, node, value, &mut violations);
        }
    }

    violations
}

fn required_violation(parent: Option<&str>, name: &str) -> Violation {
    let path = match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    };
    Violation {
        path,
        message: REQUIRED_MESSAGE.into(),
    }
}

fn violation(path: &str, message: impl Into<String>) -> Violation {
    Violation {
        path: path.to_string(),
        message: message.into(),
    }
}

fn check_node(path: &str, node: &SchemaNode, value: &Value, out: &mut Vec<Violation>) {
    match node.field_type {
        FieldType::String => check_string(path, node, value, out),
        FieldType::Number => check_number(path, node, value, out),
        FieldType::Boolean => {
            if !value.is_boolean() {
                out.push(violation(path, "must be boolean"));
            }
        }
        FieldType::Array => check_array(path, node, value, out),
        FieldType::Object => check_object(path, node, value, out),
    }
}

fn check_string(path: &str, node: &SchemaNode, value: &Value, out: &mut Vec<Violation>) {
    let Some(text) = value.as_str() else {
        out.push(violation(path, "must be string"));
        return;
    };

    if let Some(allowed) = &node.enum_values {
        if !allowed.iter().any(|a| a == text) {
            out.push(violation(
                path,
                "must be equal to one of the allowed values",
            ));
        }
    }

    match node.format {
        Some(ValueFormat::DateTime) => {
            if DateTime::parse_from_rfc3339(text).is_err() {
                out.push(violation(path, "must match format \"date-time\""));
            }
        }
        Some(ValueFormat::Date) => {
            if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_err() {
                out.push(violation(path, "must match format \"date\""));
            }
        }
        // Time is stripped by cleaning; plain string is enough.
        _ => {}
    }
}

fn check_number(path: &str, node: &SchemaNode, value: &Value, out: &mut Vec<Violation>) {
    let Some(number) = value.as_f64() else {
        out.push(violation(path, "must be number"));
        return;
    };

    if let Some(minimum) = node.minimum {
        if number < minimum {
            out.push(violation(path, format!("must be >= {minimum}")));
        }
    }
    if let Some(maximum) = node.maximum {
        if number > maximum {
            out.push(violation(path, format!("must be <= {maximum}")));
        }
    }
}

fn check_array(path: &str, node: &SchemaNode, value: &Value, out: &mut Vec<Violation>) {
    let Some(elements) = value.as_array() else {
        out.push(violation(path, "must be array"));
        return;
    };

    if let Some(items) = &node.items {
        for (index, element) in elements.iter().enumerate() {
            check_node(&format!("{path}.{index}"), items, element, out);
        }
    }
}

fn check_object(path: &str, node: &SchemaNode, value: &Value, out: &mut Vec<Violation>) {
    let Some(object) = value.as_object() else {
        out.push(violation(path, "must be object"));
        return;
    };

    if let Some(required) = &node.required {
        for name in required {
            if !object.contains_key(name) {
                out.push(required_violation(Some(path), name));
            }
        }
    }

    if let Some(children) = &node.properties {
        for (name, child) in children {
            if let Some(child_value) = object.get(name) {
                check_node(&format!("{path}.{name}"), child, child_value, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::clean::clean_schema;

    fn cleaned() -> TrackerSchema {
        let schema: TrackerSchema = serde_json::from_value(serde_json::json!({
            "type": "object",
            "properties": {
                "mood": { "type": "string", "enum": ["happy", "sad"] },
                "loggedAt": { "type": "string", "format": "date-time" },
                "satisfaction": {
                    "type": "array",
                    "items": { "type": "number", "minimum": 1, "maximum": 10 }
                },
                "peeLog": {
                    "type": "object",
                    "required": ["time"],
                    "properties": { "time": { "type": "string" } }
                }
            },
            "required": ["mood"]
        }))
        .unwrap();
        clean_schema(&schema, None)
    }

    #[test]
    fn test_missing_root_required_reports_field_path() {
        let violations = check_payload(&cleaned(), &serde_json::json!({}));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "mood");
        assert_eq!(violations[0].message, REQUIRED_MESSAGE);
    }

    #[test]
    fn test_missing_nested_required_reports_dotted_path() {
        let violations = check_payload(
            &cleaned(),
            &serde_json::json!({ "mood": "happy", "peeLog": {} }),
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "peeLog.time");
        assert_eq!(violations[0].message, REQUIRED_MESSAGE);
    }

    #[test]
    fn test_enum_and_format_violations() {
        let violations = check_payload(
            &cleaned(),
            &serde_json::json!({ "mood": "angry", "loggedAt": "not-a-date" }),
        );
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert!(paths.contains(&"mood"));
        assert!(paths.contains(&"loggedAt"));
    }

    #[test]
    fn test_array_items_report_indexed_paths() {
        let violations = check_payload(
            &cleaned(),
            &serde_json::json!({ "mood": "happy", "satisfaction": [5, 0, "high"] }),
        );
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, ["satisfaction.1", "satisfaction.2"]);
        assert_eq!(violations[0].message, "must be >= 1");
        assert_eq!(violations[1].message, "must be number");
    }

    #[test]
    fn test_non_object_payload_is_single_root_violation() {
        let violations = check_payload(&cleaned(), &serde_json::json!(42));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].path.is_empty());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let violations = check_payload(
            &cleaned(),
            &serde_json::json!({ "mood": "happy", "surprise": true }),
        );
        assert!(violations.is_empty());
    }
}

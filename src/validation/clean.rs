//! Validation-clean schema copies
//!
//! Strips the UI-only keywords a stored schema carries (`dynamicCount`,
//! `inputType`, `fallbackInputType`, `dependsOn`, `createLinkedLog`) and
//! unions caller-supplied enum values into the declared lists, keyed by
//! dotted field path. The `time` format is dropped as well: the wire form
//! `HH:MM[:SS]` needs no timezone-aware check, so time values validate as
//! plain strings.

use std::collections::HashMap;

use crate::schema::{SchemaNode, TrackerSchema, ValueFormat};

/// Caller-supplied ad-hoc enum values, keyed by dotted field path
pub type CustomEnumValues = HashMap<String, Vec<String>>;

/// Produce the validation-clean copy of a tracker schema
pub fn clean_schema(schema: &TrackerSchema, custom: Option<&CustomEnumValues>) -> TrackerSchema {
    let mut cleaned = TrackerSchema {
        required: schema.required.clone(),
        ..TrackerSchema::default()
    };
    for (name, node) in &schema.properties {
        cleaned
            .properties
            .insert(name.clone(), clean_node(node, Some(name), custom));
    }
    cleaned
}

fn clean_node(node: &SchemaNode, path: Option<&str>, custom: Option<&CustomEnumValues>) -> SchemaNode {
    let mut cleaned = SchemaNode::of_type(node.field_type);

    cleaned.title = node.title.clone();
    cleaned.description = node.description.clone();
    cleaned.default = node.default.clone();
    cleaned.required = node.required.clone();
    cleaned.minimum = node.minimum;
    cleaned.maximum = node.maximum;
    cleaned.format = match node.format {
        Some(ValueFormat::Time) => None,
        other => other,
    };

    if let Some(declared) = &node.enum_values {
        let mut merged = declared.clone();
        if let (Some(path), Some(custom)) = (path, custom) {
            if let Some(extra) = custom.get(path) {
                for value in extra {
                    if !merged.contains(value) {
                        merged.push(value.clone());
                    }
                }
            }
        }
        cleaned.enum_values = Some(merged);
    }

    // Array element schemas carry no path: ad-hoc enum values address named
    // fields only.
    if let Some(items) = &node.items {
        cleaned.items = Some(Box::new(clean_node(items, None, custom)));
    }

    if let Some(children) = &node.properties {
        let mut cleaned_children = indexmap::IndexMap::new();
        for (name, child) in children {
            let child_path = path.map(|p| format!("{p}.{name}"));
            cleaned_children.insert(
                name.clone(),
                clean_node(child, child_path.as_deref(), custom),
            );
        }
        cleaned.properties = Some(cleaned_children);
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TrackerSchema {
        serde_json::from_value(serde_json::json!({
            "type": "object",
            "properties": {
                "craving": {
                    "type": "boolean",
                    "inputType": "checkbox",
                    "createLinkedLog": { "trackerName": "cravings" }
                },
                "mood": { "type": "string", "enum": ["happy", "sad"] },
                "wakeTime": { "type": "string", "format": "time" },
                "peeLog": {
                    "type": "object",
                    "dependsOn": "craving",
                    "properties": {
                        "kind": { "type": "string", "enum": ["small"] }
                    }
                },
                "doses": {
                    "type": "array",
                    "dynamicCount": "doseCount",
                    "items": { "type": "number", "fallbackInputType": "number" }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_ui_keywords_stripped_at_every_depth() {
        let cleaned = clean_schema(&schema(), None);

        assert!(cleaned.properties["craving"].create_linked_log.is_none());
        assert!(cleaned.properties["craving"].input_type.is_none());
        assert!(cleaned.properties["peeLog"].depends_on.is_none());
        assert!(cleaned.properties["doses"].dynamic_count.is_none());
        let items = cleaned.properties["doses"].items.as_ref().unwrap();
        assert!(items.fallback_input_type.is_none());
    }

    #[test]
    fn test_time_format_dropped_but_others_kept() {
        let cleaned = clean_schema(&schema(), None);
        assert!(cleaned.properties["wakeTime"].format.is_none());
    }

    #[test]
    fn test_custom_enum_values_merged_by_path() {
        let mut custom = CustomEnumValues::new();
        custom.insert("mood".into(), vec!["angry".into(), "sad".into()]);
        custom.insert("peeLog.kind".into(), vec!["large".into()]);

        let cleaned = clean_schema(&schema(), Some(&custom));

        assert_eq!(
            cleaned.properties["mood"].enum_values.as_deref().unwrap(),
            ["happy".to_string(), "sad".into(), "angry".into()]
        );
        let nested = &cleaned.properties["peeLog"].properties.as_ref().unwrap()["kind"];
        assert_eq!(
            nested.enum_values.as_deref().unwrap(),
            ["small".to_string(), "large".into()]
        );
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let once = clean_schema(&schema(), None);
        let twice = clean_schema(&once, None);
        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }
}

//! Schema node types
//!
//! The extended JSON-Schema vocabulary describing a tracker's fields. The
//! serialized keyword names are a wire contract: external tools authoring
//! tracker schemas rely on exactly these names and semantics. UI-only
//! keywords (`dynamicCount`, `inputType`, `fallbackInputType`, `dependsOn`)
//! are carried verbatim for the form layer and stripped before validation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primitive type of a schema field
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

/// String-value format hint
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueFormat {
    #[serde(rename = "date-time")]
    DateTime,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "time")]
    Time,
}

/// Declares that activity on the owning field should spawn a derived entry
/// in another tracker
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkSpec {
    /// Name of the linked tracker (matched after normalization)
    pub tracker_name: String,

    /// Copies values from the primary payload: target field -> source field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_mapping: Option<IndexMap<String, String>>,

    /// Fill unset date/time fields of the derived entry with the current
    /// time (defaults to true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_current_time: Option<bool>,
}

impl LinkSpec {
    /// Whether unset date/time fields should be filled with the current time
    pub fn fills_current_time(&self) -> bool {
        self.use_current_time.unwrap_or(true)
    }
}

/// One field descriptor, recursive through `items` and `properties`
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Allowed values for string fields; grows monotonically via submissions
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ValueFormat>,

    /// Element schema for array fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,

    /// Child descriptors for object fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SchemaNode>>,

    /// Required child names for object fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    /// UI-only: this array's length is driven by the named field's value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_count: Option<String>,

    /// This field is only active when the named field is truthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,

    /// Linked-log declaration for cascade processing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_linked_log: Option<LinkSpec>,

    /// UI-only: renderer key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,

    /// UI-only: renderer used when `inputType` is not registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_input_type: Option<String>,
}

impl SchemaNode {
    /// Bare node of the given type, no constraints
    pub fn of_type(field_type: FieldType) -> Self {
        Self {
            field_type,
            title: None,
            description: None,
            enum_values: None,
            default: None,
            format: None,
            items: None,
            properties: None,
            required: None,
            minimum: None,
            maximum: None,
            dynamic_count: None,
            depends_on: None,
            create_linked_log: None,
            input_type: None,
            fallback_input_type: None,
        }
    }

    /// Append enum values not already present. Returns true if anything was
    /// added. This is the append-only union used for monotonic schema
    /// updates; it never removes or reorders existing values.
    pub fn union_enum(&mut self, values: &[String]) -> bool {
        let existing = self.enum_values.get_or_insert_with(Vec::new);
        let mut changed = false;
        for value in values {
            if !existing.contains(value) {
                existing.push(value.clone());
                changed = true;
            }
        }
        changed
    }
}

/// Root schema of a tracker; always an object
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TrackerSchema {
    #[serde(rename = "type")]
    pub schema_type: RootType,

    pub properties: IndexMap<String, SchemaNode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

/// The literal `"object"` root type
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootType {
    #[serde(rename = "object")]
    Object,
}

impl Default for TrackerSchema {
    fn default() -> Self {
        Self {
            schema_type: RootType::Object,
            properties: IndexMap::new(),
            required: None,
        }
    }
}

impl TrackerSchema {
    /// Whether a top-level field is listed in the root `required` array
    pub fn is_required(&self, field: &str) -> bool {
        self.required
            .as_ref()
            .map(|r| r.iter().any(|f| f == field))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_enum_appends_in_order() {
        let mut node = SchemaNode::of_type(FieldType::String);
        node.enum_values = Some(vec!["happy".into(), "sad".into()]);

        let changed = node.union_enum(&["angry".into(), "sad".into()]);

        assert!(changed);
        assert_eq!(
            node.enum_values.as_deref().unwrap(),
            ["happy".to_string(), "sad".into(), "angry".into()]
        );
    }

    #[test]
    fn test_union_enum_no_change_for_known_values() {
        let mut node = SchemaNode::of_type(FieldType::String);
        node.enum_values = Some(vec!["happy".into()]);

        assert!(!node.union_enum(&["happy".into()]));
        assert_eq!(node.enum_values.as_deref().unwrap().len(), 1);
    }

    #[test]
    fn test_schema_wire_names_round_trip() {
        let json = serde_json::json!({
            "type": "object",
            "properties": {
                "craving": {
                    "type": "boolean",
                    "createLinkedLog": {
                        "trackerName": "cravings",
                        "dataMapping": { "time": "loggedAt" }
                    }
                },
                "loggedAt": { "type": "string", "format": "date-time" }
            },
            "required": ["loggedAt"]
        });

        let schema: TrackerSchema = serde_json::from_value(json.clone()).unwrap();
        let link = schema.properties["craving"]
            .create_linked_log
            .as_ref()
            .unwrap();
        assert_eq!(link.tracker_name, "cravings");
        assert!(link.fills_current_time());
        assert_eq!(
            schema.properties["loggedAt"].format,
            Some(ValueFormat::DateTime)
        );

        // Serialization emits exactly the contract keyword names
        let back = serde_json::to_value(&schema).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn test_root_type_rejects_non_object() {
        let json = serde_json::json!({ "type": "array", "properties": {} });
        assert!(serde_json::from_value::<TrackerSchema>(json).is_err());
    }
}

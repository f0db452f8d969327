//! Cascade trigger discovery and derived-payload assembly
//!
//! A tracker schema can declare a linked-log relationship two ways: a flat
//! field carrying `createLinkedLog` directly (legacy style), or an
//! object-typed field whose `dependsOn` target carries the declaration
//! (nested-object style). Both resolve here into one [`LinkTrigger`] per
//! relationship before any I/O happens, so the fan-out code never branches
//! on declaration style. Everything in this module is pure and synchronous.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::schema::{FieldType, LinkSpec, TrackerSchema, ValueFormat};

/// JS-style truthiness, matching the form layer's `dependsOn` semantics:
/// `null`, `false`, `0`, and `""` are falsy, everything else truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Unset for mapping purposes: absent handled by callers; `null` and `""`
/// count as empty.
fn is_empty_value(value: &Value) -> bool {
    matches!(value, Value::Null) || matches!(value, Value::String(s) if s.is_empty())
}

/// One discovered cascade relationship, resolved to a common link spec
#[derive(Debug, Clone, PartialEq)]
pub struct LinkTrigger {
    /// Field whose submitted value fired the trigger
    pub field: String,
    pub link: LinkSpec,
    pub base: TriggerBase,
}

/// How the derived payload is seeded
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerBase {
    /// Legacy flat style: the payload is assembled from `dataMapping` alone
    Flag,
    /// Nested-object style: the submitted nested object seeds the payload
    NestedObject { object: Map<String, Value> },
}

/// Scan a schema's top-level fields against a submitted payload and collect
/// the cascade triggers. `name_fallback` enables deriving a target tracker
/// name from the field name when no `createLinkedLog` exists.
pub fn discover_triggers(
    schema: &TrackerSchema,
    payload: &Map<String, Value>,
    name_fallback: bool,
) -> Vec<LinkTrigger> {
    // Pass A: a dependsOn field whose declaration is consumed by a
    // nested-object field must not also fire as a legacy flag.
    let mut covered: HashSet<&str> = HashSet::new();
    for node in schema.properties.values() {
        if node.field_type != FieldType::Object {
            continue;
        }
        let Some(depends_on) = &node.depends_on else {
            continue;
        };
        let declares_link = schema
            .properties
            .get(depends_on)
            .map(|d| d.create_linked_log.is_some())
            .unwrap_or(false);
        if declares_link {
            covered.insert(depends_on.as_str());
        }
    }

    let mut triggers = Vec::new();

    // Pass B, legacy style
    for (name, node) in &schema.properties {
        if covered.contains(name.as_str()) {
            continue;
        }
        let Some(link) = &node.create_linked_log else {
            continue;
        };
        if payload.get(name).map(is_truthy).unwrap_or(false) {
            triggers.push(LinkTrigger {
                field: name.clone(),
                link: link.clone(),
                base: TriggerBase::Flag,
            });
        }
    }

    // Pass B, nested-object style
    for (name, node) in &schema.properties {
        if node.field_type != FieldType::Object {
            continue;
        }
        let Some(depends_on) = &node.depends_on else {
            continue;
        };
        if !payload.get(depends_on).map(is_truthy).unwrap_or(false) {
            continue;
        }
        let Some(Value::Object(object)) = payload.get(name) else {
            continue;
        };

        let declared = schema
            .properties
            .get(depends_on)
            .and_then(|d| d.create_linked_log.clone());
        let link = match declared {
            Some(link) => link,
            None if name_fallback => LinkSpec {
                tracker_name: fallback_tracker_name(name),
                data_mapping: None,
                use_current_time: None,
            },
            None => continue,
        };

        triggers.push(LinkTrigger {
            field: name.clone(),
            link,
            base: TriggerBase::NestedObject {
                object: object.clone(),
            },
        });
    }

    triggers
}

/// Derive a likely tracker name from a field name: lowercase, trailing
/// `log` stripped, whitespace to underscores (`peeLog` -> `pee`).
pub fn fallback_tracker_name(field: &str) -> String {
    let lowered = field.to_lowercase();
    let stripped = lowered.strip_suffix("log").unwrap_or(&lowered);
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Seed the derived payload: the nested object verbatim (nested style) or
/// empty (legacy style), then the `dataMapping` overlay copying parent
/// payload values into unset targets.
pub fn build_base_payload(trigger: &LinkTrigger, parent: &Map<String, Value>) -> Map<String, Value> {
    let mut payload = match &trigger.base {
        TriggerBase::Flag => Map::new(),
        TriggerBase::NestedObject { object } => object.clone(),
    };

    if let Some(mapping) = &trigger.link.data_mapping {
        for (target, source) in mapping {
            let Some(source_value) = parent.get(source) else {
                continue;
            };
            if is_empty_value(source_value) {
                continue;
            }
            let target_unset = payload.get(target).map(is_empty_value).unwrap_or(true);
            if target_unset {
                payload.insert(target.clone(), source_value.clone());
            }
        }
    }

    payload
}

/// Fill unset required date/time fields of the target schema with `now`,
/// formatted per the field's declared format. A link with
/// `useCurrentTime: false` leaves the fields alone.
pub fn fill_time_fields(
    target_schema: &TrackerSchema,
    payload: &mut Map<String, Value>,
    use_current_time: bool,
    now: DateTime<Utc>,
) {
    if !use_current_time {
        return;
    }

    for (name, node) in &target_schema.properties {
        let Some(format) = node.format else {
            continue;
        };
        if !target_schema.is_required(name) {
            continue;
        }
        let unset = payload.get(name).map(is_empty_value).unwrap_or(true);
        if !unset {
            continue;
        }

        let value = match format {
            ValueFormat::DateTime => now.to_rfc3339_opts(SecondsFormat::Millis, true),
            ValueFormat::Date => now.format("%Y-%m-%d").to_string(),
            ValueFormat::Time => now.format("%H:%M:%S").to_string(),
        };
        payload.insert(name.clone(), Value::String(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schema(json: serde_json::Value) -> TrackerSchema {
        serde_json::from_value(json).unwrap()
    }

    fn payload(json: serde_json::Value) -> Map<String, Value> {
        match json {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    #[test]
    fn test_is_truthy_follows_js_semantics() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&serde_json::json!(false)));
        assert!(!is_truthy(&serde_json::json!(0)));
        assert!(!is_truthy(&serde_json::json!("")));
        assert!(is_truthy(&serde_json::json!(true)));
        assert!(is_truthy(&serde_json::json!(1)));
        assert!(is_truthy(&serde_json::json!("x")));
        assert!(is_truthy(&serde_json::json!({})));
    }

    #[test]
    fn test_legacy_flag_trigger_fires_on_truthy_value() {
        let schema = schema(serde_json::json!({
            "type": "object",
            "properties": {
                "craving": {
                    "type": "boolean",
                    "createLinkedLog": {
                        "trackerName": "cravings",
                        "dataMapping": { "time": "loggedAt" }
                    }
                }
            }
        }));

        let fired = discover_triggers(&schema, &payload(serde_json::json!({ "craving": true })), false);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].field, "craving");
        assert_eq!(fired[0].base, TriggerBase::Flag);

        let quiet =
            discover_triggers(&schema, &payload(serde_json::json!({ "craving": false })), false);
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_nested_declaration_suppresses_legacy_style() {
        // `craving` declares the link, `cravingLog` consumes it as a nested
        // object; the relationship must fire exactly once, nested style.
        let schema = schema(serde_json::json!({
            "type": "object",
            "properties": {
                "craving": {
                    "type": "boolean",
                    "createLinkedLog": { "trackerName": "cravings" }
                },
                "cravingLog": {
                    "type": "object",
                    "dependsOn": "craving",
                    "properties": {}
                }
            }
        }));

        let fired = discover_triggers(
            &schema,
            &payload(serde_json::json!({
                "craving": true,
                "cravingLog": { "intensity": 7 }
            })),
            false,
        );

        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].field, "cravingLog");
        assert_eq!(fired[0].link.tracker_name, "cravings");
        match &fired[0].base {
            TriggerBase::NestedObject { object } => {
                assert_eq!(object["intensity"], 7);
            }
            other => panic!("expected nested base, got {other:?}"),
        }
    }

    #[test]
    fn test_name_fallback_only_behind_flag() {
        let schema = schema(serde_json::json!({
            "type": "object",
            "properties": {
                "pee": { "type": "boolean" },
                "peeLog": {
                    "type": "object",
                    "dependsOn": "pee",
                    "properties": {}
                }
            }
        }));
        let data = payload(serde_json::json!({ "pee": true, "peeLog": { "volume": 2 } }));

        assert!(discover_triggers(&schema, &data, false).is_empty());

        let fired = discover_triggers(&schema, &data, true);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].link.tracker_name, "pee");
    }

    #[test]
    fn test_fallback_tracker_name() {
        assert_eq!(fallback_tracker_name("peeLog"), "pee");
        assert_eq!(fallback_tracker_name("cravings"), "cravings");
        assert_eq!(fallback_tracker_name("Night Feed Log"), "night_feed");
    }

    #[test]
    fn test_build_base_payload_mapping_styles() {
        let link: LinkSpec = serde_json::from_value(serde_json::json!({
            "trackerName": "cravings",
            "dataMapping": { "time": "loggedAt", "note": "comment" }
        }))
        .unwrap();
        let parent = payload(serde_json::json!({
            "loggedAt": "2024-01-01T00:00:00.000Z",
            "comment": ""
        }));

        // Legacy: empty source values never copy
        let flag = LinkTrigger {
            field: "craving".into(),
            link: link.clone(),
            base: TriggerBase::Flag,
        };
        let built = build_base_payload(&flag, &parent);
        assert_eq!(built["time"], "2024-01-01T00:00:00.000Z");
        assert!(!built.contains_key("note"));

        // Nested: existing values win over the overlay
        let nested = LinkTrigger {
            field: "cravingLog".into(),
            link,
            base: TriggerBase::NestedObject {
                object: payload(serde_json::json!({ "time": "already-set", "strength": 3 })),
            },
        };
        let built = build_base_payload(&nested, &parent);
        assert_eq!(built["time"], "already-set");
        assert_eq!(built["strength"], 3);
    }

    #[test]
    fn test_craving_link_produces_valid_derived_payload() {
        let smoking = schema(serde_json::json!({
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
            }
        }));
        let cravings = schema(serde_json::json!({
            "type": "object",
            "properties": { "time": { "type": "string", "format": "date-time" } },
            "required": ["time"]
        }));
        let data = payload(serde_json::json!({
            "craving": true,
            "loggedAt": "2024-01-01T00:00:00.000Z"
        }));

        let triggers = discover_triggers(&smoking, &data, false);
        assert_eq!(triggers.len(), 1);

        let mut derived = build_base_payload(&triggers[0], &data);
        fill_time_fields(
            &cravings,
            &mut derived,
            triggers[0].link.fills_current_time(),
            Utc::now(),
        );
        // The mapped value wins; the current-time fill only covers gaps
        assert_eq!(derived["time"], "2024-01-01T00:00:00.000Z");

        let report = crate::validation::validate(&cravings, &Value::Object(derived), None);
        assert!(report.is_valid);
    }

    #[test]
    fn test_fill_time_fields_targets_required_formats_only() {
        let target = schema(serde_json::json!({
            "type": "object",
            "properties": {
                "time": { "type": "string", "format": "time" },
                "day": { "type": "string", "format": "date" },
                "note": { "type": "string" },
                "optionalAt": { "type": "string", "format": "date-time" }
            },
            "required": ["time", "day", "note"]
        }));
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 8, 30, 15).unwrap();

        let mut data = payload(serde_json::json!({}));
        fill_time_fields(&target, &mut data, true, now);
        assert_eq!(data["time"], "08:30:15");
        assert_eq!(data["day"], "2024-01-02");
        // Not required, not filled
        assert!(!data.contains_key("optionalAt"));
        // No format, not filled
        assert!(!data.contains_key("note"));

        let mut untouched = payload(serde_json::json!({ "time": "07:00:00" }));
        fill_time_fields(&target, &mut untouched, false, now);
        assert_eq!(untouched.len(), 1);
    }
}

//! Form-value conversions
//!
//! Date and time fields travel in two representations: the wire/storage
//! format (RFC 3339 UTC for `date-time`, `HH:MM:SS` for `time`) and the
//! editable form format (`YYYY-MM-DDTHH:MM` datetime-local, `HH:MM`).
//! Drafts are stored normalized and converted back when an entry is
//! resumed. Values already in the target representation pass through
//! unchanged, so the conversions are safe to apply twice.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::node::{FieldType, TrackerSchema, ValueFormat};

/// `YYYY-MM-DDTHH:MM` (datetime-local) to RFC 3339 UTC with milliseconds.
/// RFC 3339 input passes through; anything else is returned unchanged.
pub fn datetime_local_to_iso(value: &str) -> String {
    if DateTime::parse_from_rfc3339(value).is_ok() {
        return value.to_string();
    }
    match NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M") {
        Ok(naive) => naive
            .and_utc()
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        Err(_) => value.to_string(),
    }
}

/// RFC 3339 to `YYYY-MM-DDTHH:MM`, truncating to minutes. Values already in
/// datetime-local form (or unparseable) are returned unchanged.
pub fn iso_to_datetime_local(value: &str) -> String {
    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => parsed
            .with_timezone(&Utc)
            .format("%Y-%m-%dT%H:%M")
            .to_string(),
        Err(_) => value.to_string(),
    }
}

/// `HH:MM` (time input) to the `HH:MM:SS` wire form; `HH:MM:SS` passes
/// through.
pub fn time_to_wire(value: &str) -> String {
    let bytes = value.as_bytes();
    let is_hh_mm = bytes.len() == 5
        && bytes[2] == b':'
        && bytes[0].is_ascii_digit()
        && bytes[1].is_ascii_digit()
        && bytes[3].is_ascii_digit()
        && bytes[4].is_ascii_digit();
    if is_hh_mm {
        format!("{value}:00")
    } else {
        value.to_string()
    }
}

/// `HH:MM:00` back to the `HH:MM` form value. Non-zero seconds are kept so
/// the wire value survives a form round trip intact.
pub fn time_to_form(value: &str) -> String {
    match value.strip_suffix(":00") {
        Some(head) if head.len() == 5 => head.to_string(),
        _ => value.to_string(),
    }
}

/// Normalize every date/time field of a form payload to wire format,
/// descending one level into object-typed fields.
pub fn convert_form_data(schema: &TrackerSchema, data: &mut Map<String, Value>) {
    for (name, node) in &schema.properties {
        match node.format {
            Some(ValueFormat::DateTime) => convert_in_place(data, name, datetime_local_to_iso),
            Some(ValueFormat::Time) => convert_in_place(data, name, time_to_wire),
            _ => {}
        }
        if node.field_type == FieldType::Object {
            if let (Some(children), Some(Value::Object(nested))) =
                (&node.properties, data.get_mut(name))
            {
                for (child_name, child) in children {
                    match child.format {
                        Some(ValueFormat::DateTime) => {
                            convert_in_place(nested, child_name, datetime_local_to_iso)
                        }
                        Some(ValueFormat::Time) => convert_in_place(nested, child_name, time_to_wire),
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Inverse of [`convert_form_data`]: wire format back to editable values.
pub fn convert_to_form_data(schema: &TrackerSchema, data: &mut Map<String, Value>) {
    for (name, node) in &schema.properties {
        match node.format {
            Some(ValueFormat::DateTime) => convert_in_place(data, name, iso_to_datetime_local),
            Some(ValueFormat::Time) => convert_in_place(data, name, time_to_form),
            _ => {}
        }
        if node.field_type == FieldType::Object {
            if let (Some(children), Some(Value::Object(nested))) =
                (&node.properties, data.get_mut(name))
            {
                for (child_name, child) in children {
                    match child.format {
                        Some(ValueFormat::DateTime) => {
                            convert_in_place(nested, child_name, iso_to_datetime_local)
                        }
                        Some(ValueFormat::Time) => convert_in_place(nested, child_name, time_to_form),
                        _ => {}
                    }
                }
            }
        }
    }
}

fn convert_in_place(data: &mut Map<String, Value>, key: &str, convert: fn(&str) -> String) {
    if let Some(Value::String(s)) = data.get(key) {
        if !s.is_empty() {
            let converted = convert(s);
            data.insert(key.to_string(), Value::String(converted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TrackerSchema {
        serde_json::from_value(serde_json::json!({
            "type": "object",
            "properties": {
                "loggedAt": { "type": "string", "format": "date-time" },
                "wakeTime": { "type": "string", "format": "time" },
                "note": { "type": "string" },
                "peeLog": {
                    "type": "object",
                    "properties": {
                        "time": { "type": "string", "format": "time" }
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_datetime_local_to_iso() {
        assert_eq!(
            datetime_local_to_iso("2024-01-01T10:30"),
            "2024-01-01T10:30:00.000Z"
        );
        // Already ISO passes through
        assert_eq!(
            datetime_local_to_iso("2024-01-01T10:30:00.000Z"),
            "2024-01-01T10:30:00.000Z"
        );
    }

    #[test]
    fn test_time_conversions() {
        assert_eq!(time_to_wire("08:15"), "08:15:00");
        assert_eq!(time_to_wire("08:15:30"), "08:15:30");
        assert_eq!(time_to_form("08:15:00"), "08:15");
        assert_eq!(time_to_form("08:15:30"), "08:15:30");
    }

    #[test]
    fn test_payload_round_trip() {
        let schema = schema();
        let mut data: Map<String, Value> = serde_json::from_value(serde_json::json!({
            "loggedAt": "2024-01-01T10:30",
            "wakeTime": "07:45",
            "note": "unchanged",
            "peeLog": { "time": "08:00" }
        }))
        .unwrap();

        convert_form_data(&schema, &mut data);
        assert_eq!(data["loggedAt"], "2024-01-01T10:30:00.000Z");
        assert_eq!(data["wakeTime"], "07:45:00");
        assert_eq!(data["peeLog"]["time"], "08:00:00");
        assert_eq!(data["note"], "unchanged");

        let stored = data.clone();
        convert_to_form_data(&schema, &mut data);
        assert_eq!(data["loggedAt"], "2024-01-01T10:30");
        assert_eq!(data["wakeTime"], "07:45");

        // Converting back to wire format reproduces the stored values
        convert_form_data(&schema, &mut data);
        assert_eq!(data, stored);
    }
}

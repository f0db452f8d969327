//! Schema traversal
//!
//! Depth-first walk over every named field of a tracker schema. Paths are
//! dot-joined for nested object properties (`parent.child`); array element
//! schemas are reached through their owning node, not as separate visits.

use super::node::{SchemaNode, TrackerSchema};

/// Visit every named field of the schema, nested fields included
pub fn for_each_field<F>(schema: &TrackerSchema, mut visit: F)
where
    F: FnMut(&str, &SchemaNode),
{
    for (name, node) in &schema.properties {
        walk(name, node, &mut visit);
    }
}

fn walk<F>(path: &str, node: &SchemaNode, visit: &mut F)
where
    F: FnMut(&str, &SchemaNode),
{
    visit(path, node);
    if let Some(children) = &node.properties {
        for (name, child) in children {
            let child_path = format!("{path}.{name}");
            walk(&child_path, child, visit);
        }
    }
}

/// Resolve a dotted path to its node, if declared
pub fn node_at_path<'a>(schema: &'a TrackerSchema, path: &str) -> Option<&'a SchemaNode> {
    let mut segments = path.split('.');
    let mut node = schema.properties.get(segments.next()?)?;
    for segment in segments {
        node = node.properties.as_ref()?.get(segment)?;
    }
    Some(node)
}

/// Mutable variant of [`node_at_path`]
pub fn node_at_path_mut<'a>(
    schema: &'a mut TrackerSchema,
    path: &str,
) -> Option<&'a mut SchemaNode> {
    let mut segments = path.split('.');
    let mut node = schema.properties.get_mut(segments.next()?)?;
    for segment in segments {
        node = node.properties.as_mut()?.get_mut(segment)?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::node::FieldType;

    fn sample_schema() -> TrackerSchema {
        serde_json::from_value(serde_json::json!({
            "type": "object",
            "properties": {
                "mood": { "type": "string", "enum": ["happy", "sad"] },
                "peeLog": {
                    "type": "object",
                    "properties": {
                        "time": { "type": "string", "format": "time" },
                        "volume": { "type": "number" }
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_for_each_field_visits_nested_paths() {
        let schema = sample_schema();
        let mut paths = Vec::new();
        for_each_field(&schema, |path, _| paths.push(path.to_string()));
        assert_eq!(paths, ["mood", "peeLog", "peeLog.time", "peeLog.volume"]);
    }

    #[test]
    fn test_node_at_path_resolves_dotted_paths() {
        let schema = sample_schema();
        assert_eq!(
            node_at_path(&schema, "peeLog.volume").unwrap().field_type,
            FieldType::Number
        );
        assert!(node_at_path(&schema, "peeLog.missing").is_none());
        assert!(node_at_path(&schema, "missing").is_none());
    }

    #[test]
    fn test_node_at_path_mut_allows_enum_union() {
        let mut schema = sample_schema();
        let node = node_at_path_mut(&mut schema, "mood").unwrap();
        assert!(node.union_enum(&["angry".into()]));
        assert_eq!(
            schema.properties["mood"].enum_values.as_deref().unwrap(),
            ["happy".to_string(), "sad".into(), "angry".into()]
        );
    }
}

//! Draft store
//!
//! Persists partially-filled entries keyed by user and tracker so input can
//! be resumed later. Drafts are intentionally incomplete and are never
//! validated against the tracker schema. Stored values are wire-normalized;
//! the form projection converts them back into editable representations.

use std::collections::HashMap;

use bson::{doc, DateTime};
use serde_json::{Map, Value};

use crate::db::schemas::{DraftDoc, DRAFT_COLLECTION};
use crate::db::{parse_object_id, MongoClient, MongoCollection};
use crate::schema::{forms, TrackerSchema};
use crate::services::trackers::TrackerService;
use crate::types::{Result, WaymarkError};

/// Draft persistence scoped to the owning user
#[derive(Clone)]
pub struct DraftService {
    mongo: MongoClient,
    trackers: TrackerService,
}

impl DraftService {
    pub fn new(mongo: MongoClient) -> Self {
        let trackers = TrackerService::new(mongo.clone());
        Self { mongo, trackers }
    }

    async fn drafts(&self) -> Result<MongoCollection<DraftDoc>> {
        self.mongo.collection(DRAFT_COLLECTION).await
    }

    /// Save a new draft; requires active membership in the target tracker
    pub async fn save(
        &self,
        user_id: &str,
        tracker_id: &str,
        data: Map<String, Value>,
        custom_enum_values: HashMap<String, Vec<String>>,
    ) -> Result<DraftDoc> {
        // Tracker resolution doubles as the membership check
        let tracker = self.trackers.get_for_user(user_id, tracker_id).await?;

        let drafts = self.drafts().await?;
        let id = drafts
            .insert_one(DraftDoc::new(
                user_id.to_string(),
                tracker.id_hex(),
                data,
                custom_enum_values,
            ))
            .await?;

        drafts
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| WaymarkError::Internal("draft missing after insert".into()))
    }

    /// All drafts of a user, most recently updated first
    pub async fn list(&self, user_id: &str) -> Result<Vec<DraftDoc>> {
        let drafts = self.drafts().await?;
        drafts
            .find_many_sorted(
                doc! { "user_id": user_id },
                doc! { "metadata.updated_at": -1 },
                None,
                None,
                false,
            )
            .await
    }

    /// One draft owned by the user
    pub async fn get(&self, user_id: &str, draft_id: &str) -> Result<DraftDoc> {
        let oid = parse_object_id(draft_id, "draft")?;
        let drafts = self.drafts().await?;
        drafts
            .find_one(doc! { "_id": oid, "user_id": user_id })
            .await?
            .ok_or(WaymarkError::NotFound("Draft"))
    }

    /// Replace a draft's content, optionally retargeting it to another
    /// tracker the user is a member of
    pub async fn update(
        &self,
        user_id: &str,
        draft_id: &str,
        tracker_id: &str,
        data: Map<String, Value>,
        custom_enum_values: HashMap<String, Vec<String>>,
    ) -> Result<DraftDoc> {
        let existing = self.get(user_id, draft_id).await?;

        if existing.tracker_id != tracker_id {
            self.trackers.get_for_user(user_id, tracker_id).await?;
        }

        let data_bson = bson::to_bson(&data)
            .map_err(|e| WaymarkError::Internal(format!("Draft serialization failed: {e}")))?;
        let custom_bson = bson::to_bson(&custom_enum_values)
            .map_err(|e| WaymarkError::Internal(format!("Draft serialization failed: {e}")))?;

        let oid = parse_object_id(draft_id, "draft")?;
        let drafts = self.drafts().await?;
        drafts
            .update_one(
                doc! { "_id": oid, "user_id": user_id },
                doc! {
                    "$set": {
                        "tracker_id": tracker_id,
                        "data": data_bson,
                        "custom_enum_values": custom_bson,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        self.get(user_id, draft_id).await
    }

    /// Remove a draft owned by the user
    pub async fn delete(&self, user_id: &str, draft_id: &str) -> Result<()> {
        let existing = self.get(user_id, draft_id).await?;
        let oid = parse_object_id(&existing.id_hex(), "draft")?;
        let drafts = self.drafts().await?;
        drafts
            .delete_one(doc! { "_id": oid, "user_id": user_id })
            .await?;
        Ok(())
    }

    /// Editable projection of a draft's stored data (ISO values back to
    /// form representations) against the owning tracker's schema
    pub fn form_data(schema: &TrackerSchema, draft: &DraftDoc) -> Map<String, Value> {
        let mut data = draft.data.clone();
        forms::convert_to_form_data(schema, &mut data);
        data
    }

    /// Scrub a removed enum value from every stored draft of a tracker:
    /// drop it from `custom_enum_values[path]` and clear a draft data field
    /// at `path` currently holding it. Historical log entries are untouched.
    pub async fn scrub_enum_value(
        &self,
        tracker_id: &str,
        field_path: &str,
        value: &str,
    ) -> Result<u64> {
        let drafts = self.drafts().await?;
        let affected = drafts
            .find_many(doc! { "tracker_id": tracker_id })
            .await?;

        let mut scrubbed = 0;
        for mut draft in affected {
            let mut changed = false;

            if let Some(values) = draft.custom_enum_values.get_mut(field_path) {
                let before = values.len();
                values.retain(|v| v != value);
                changed |= values.len() != before;
            }

            changed |= clear_value_at_path(&mut draft.data, field_path, value);

            if changed {
                let data_bson = bson::to_bson(&draft.data).map_err(|e| {
                    WaymarkError::Internal(format!("Draft serialization failed: {e}"))
                })?;
                let custom_bson = bson::to_bson(&draft.custom_enum_values).map_err(|e| {
                    WaymarkError::Internal(format!("Draft serialization failed: {e}"))
                })?;
                drafts
                    .update_one(
                        doc! { "_id": draft._id },
                        doc! {
                            "$set": {
                                "data": data_bson,
                                "custom_enum_values": custom_bson,
                                "metadata.updated_at": DateTime::now(),
                            }
                        },
                    )
                    .await?;
                scrubbed += 1;
            }
        }
        Ok(scrubbed)
    }
}

/// Remove the field at a dotted path if it currently equals `value`.
/// Returns true when something was removed.
fn clear_value_at_path(data: &mut Map<String, Value>, path: &str, value: &str) -> bool {
    let mut segments = path.split('.').collect::<Vec<_>>();
    let Some(last) = segments.pop() else {
        return false;
    };

    let mut current = data;
    for segment in segments {
        match current.get_mut(segment).and_then(Value::as_object_mut) {
            Some(nested) => current = nested,
            None => return false,
        }
    }

    match current.get(last) {
        Some(Value::String(s)) if s == value => {
            current.remove(last);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_value_at_top_level_path() {
        let mut data: Map<String, Value> =
            serde_json::from_value(serde_json::json!({ "mood": "angry", "note": "keep" }))
                .unwrap();

        assert!(clear_value_at_path(&mut data, "mood", "angry"));
        assert!(!data.contains_key("mood"));
        assert_eq!(data["note"], "keep");

        // Different value untouched
        assert!(!clear_value_at_path(&mut data, "note", "angry"));
        assert_eq!(data["note"], "keep");
    }

    #[test]
    fn test_clear_value_at_nested_path() {
        let mut data: Map<String, Value> = serde_json::from_value(serde_json::json!({
            "peeLog": { "kind": "large", "time": "08:00:00" }
        }))
        .unwrap();

        assert!(clear_value_at_path(&mut data, "peeLog.kind", "large"));
        assert!(!data["peeLog"].as_object().unwrap().contains_key("kind"));
        assert!(!clear_value_at_path(&mut data, "peeLog.missing", "x"));
        assert!(!clear_value_at_path(&mut data, "other.kind", "x"));
    }
}

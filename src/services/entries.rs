//! Log entry creation, cascade fan-out, and entry deletes
//!
//! A submission validates against the owning tracker's live schema, persists
//! newly-introduced enum values, writes the primary entry, then walks the
//! schema for linked-log declarations and writes one derived entry per
//! resolvable link. Link failures never propagate: each is logged, recorded
//! as a cascade warning, and skipped. There is no transaction across the
//! primary and derived writes.

use std::collections::HashMap;
use std::sync::Arc;

use bson::doc;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::db::schemas::{DraftDoc, LogEntryDoc, Metadata, DRAFT_COLLECTION, LOG_COLLECTION};
use crate::db::{parse_object_id, MongoClient, MongoCollection};
use crate::schema::{for_each_field, TrackerSchema};
use crate::services::cascade::{
    build_base_payload, discover_triggers, fill_time_fields, LinkTrigger,
};
use crate::services::trackers::{normalize_name, TrackerService};
use crate::services::warnings::{CascadeWarning, CascadeWarningStore};
use crate::types::{Result, WaymarkError};
use crate::validation::{validate, CustomEnumValues};

/// A created primary entry plus the ids of its cascade-derived entries
#[derive(Clone, Debug)]
pub struct CreatedLogEntry {
    pub entry: LogEntryDoc,
    pub created_linked_logs: Vec<String>,
}

/// Log entry lifecycle and cascade processing
#[derive(Clone)]
pub struct LogEntryService {
    mongo: MongoClient,
    trackers: TrackerService,
    warnings: Arc<CascadeWarningStore>,
    cascade_name_fallback: bool,
}

impl LogEntryService {
    pub fn new(
        mongo: MongoClient,
        warnings: Arc<CascadeWarningStore>,
        cascade_name_fallback: bool,
    ) -> Self {
        let trackers = TrackerService::new(mongo.clone());
        Self {
            mongo,
            trackers,
            warnings,
            cascade_name_fallback,
        }
    }

    async fn logs(&self) -> Result<MongoCollection<LogEntryDoc>> {
        self.mongo.collection(LOG_COLLECTION).await
    }

    /// List a user's entries for a tracker, newest first
    pub async fn list_entries(
        &self,
        user_id: &str,
        tracker_id: &str,
        include_deleted: bool,
        limit: Option<i64>,
        skip: Option<u64>,
    ) -> Result<Vec<LogEntryDoc>> {
        let tracker = self.trackers.get_for_user(user_id, tracker_id).await?;
        let logs = self.logs().await?;
        logs.find_many_sorted(
            doc! { "tracker_id": tracker.id_hex(), "user_id": user_id },
            doc! { "metadata.created_at": -1 },
            limit,
            skip,
            include_deleted,
        )
        .await
    }

    /// Create a primary entry and fan out its cascade links
    pub async fn create_log_entry(
        &self,
        user_id: &str,
        tracker_id: &str,
        data: Map<String, Value>,
        custom_enum_values: Option<CustomEnumValues>,
        created_at_override: Option<chrono::DateTime<Utc>>,
        draft_id: Option<String>,
    ) -> Result<CreatedLogEntry> {
        let tracker = self.trackers.get_for_user(user_id, tracker_id).await?;

        let report = validate(
            &tracker.schema,
            &Value::Object(data.clone()),
            custom_enum_values.as_ref(),
        );
        if !report.is_valid {
            return Err(WaymarkError::Validation(report));
        }

        // Durably grow the schema before anything else so the entry is
        // always explicable by the stored enum lists.
        let mut schema = tracker.schema.clone();
        if let Some(custom) = &custom_enum_values {
            let additions = new_enum_values(&schema, custom);
            if !additions.is_empty() {
                schema = self
                    .trackers
                    .merge_enum_values(&tracker.id_hex(), &additions)
                    .await?;
            }
        }

        let created_at = created_at_override
            .map(bson::DateTime::from_chrono)
            .unwrap_or_else(bson::DateTime::now);

        let mut entry = LogEntryDoc::new(tracker.id_hex(), user_id.to_string(), data.clone());
        entry.metadata = Metadata::created_at(created_at);
        let logs = self.logs().await?;
        let id = logs.insert_one(entry.clone()).await?;
        entry._id = Some(id);

        // Cascade fan-out: sequential, and a failing link must never fail
        // the primary submission or the links already written.
        let triggers = discover_triggers(&schema, &data, self.cascade_name_fallback);
        let mut created_linked_logs = Vec::new();
        for trigger in &triggers {
            match self
                .process_link(user_id, &entry, trigger, &data, created_at)
                .await
            {
                Ok(Some(linked_id)) => created_linked_logs.push(linked_id),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "Cascade link on field '{}' of tracker '{}' failed: {}",
                        trigger.field, tracker.name, e
                    );
                    self.record_skip(user_id, &entry, trigger, format!("store failure: {e}"));
                }
            }
        }
        if !triggers.is_empty() {
            info!(
                "Entry {} cascaded {}/{} link(s)",
                entry.id_hex(),
                created_linked_logs.len(),
                triggers.len()
            );
        }

        // A submission that originated from a draft consumes it;
        // failure to remove the draft must not fail the entry.
        if let Some(draft_id) = draft_id {
            if let Err(e) = self.consume_draft(user_id, &draft_id).await {
                warn!("Failed to delete draft {} after submission: {}", draft_id, e);
            }
        }

        Ok(CreatedLogEntry {
            entry,
            created_linked_logs,
        })
    }

    /// Resolve and write one derived entry; `Ok(None)` is a recorded skip
    async fn process_link(
        &self,
        user_id: &str,
        primary: &LogEntryDoc,
        trigger: &LinkTrigger,
        parent_payload: &Map<String, Value>,
        created_at: bson::DateTime,
    ) -> Result<Option<String>> {
        let normalized = normalize_name(&trigger.link.tracker_name);
        let Some(target) = self.trackers.find_by_normalized_name(&normalized).await? else {
            warn!(
                "Linked tracker '{}' not found; skipping link on field '{}'",
                trigger.link.tracker_name, trigger.field
            );
            self.record_skip(user_id, primary, trigger, "linked tracker not found".into());
            return Ok(None);
        };

        if !self.trackers.is_member(user_id, &target.id_hex()).await? {
            warn!(
                "User {} lacks membership in linked tracker '{}'; skipping",
                user_id, target.name
            );
            self.record_skip(
                user_id,
                primary,
                trigger,
                "no membership in linked tracker".into(),
            );
            return Ok(None);
        }

        let mut derived = build_base_payload(trigger, parent_payload);
        fill_time_fields(
            &target.schema,
            &mut derived,
            trigger.link.fills_current_time(),
            Utc::now(),
        );

        let report = validate(&target.schema, &Value::Object(derived.clone()), None);
        if !report.is_valid {
            warn!(
                "Derived entry for linked tracker '{}' failed validation: {}",
                target.name,
                report.errors.join("; ")
            );
            self.record_skip(
                user_id,
                primary,
                trigger,
                format!("derived payload invalid: {}", report.errors.join("; ")),
            );
            return Ok(None);
        }

        let mut linked = LogEntryDoc::new(target.id_hex(), user_id.to_string(), derived);
        linked.metadata = Metadata::created_at(created_at);
        linked.linked_from_log_id = Some(primary.id_hex());

        let logs = self.logs().await?;
        let id = logs.insert_one(linked).await?;
        Ok(Some(id.to_hex()))
    }

    fn record_skip(
        &self,
        user_id: &str,
        primary: &LogEntryDoc,
        trigger: &LinkTrigger,
        reason: String,
    ) {
        self.warnings.record(
            user_id,
            CascadeWarning {
                primary_log_id: primary.id_hex(),
                field: trigger.field.clone(),
                target_tracker_name: trigger.link.tracker_name.clone(),
                reason,
                occurred_at: Utc::now(),
            },
        );
    }

    async fn consume_draft(&self, user_id: &str, draft_id: &str) -> Result<()> {
        let oid = parse_object_id(draft_id, "draft")?;
        let drafts: MongoCollection<DraftDoc> = self.mongo.collection(DRAFT_COLLECTION).await?;
        drafts
            .delete_one(doc! { "_id": oid, "user_id": user_id })
            .await?;
        Ok(())
    }

    /// Soft delete an entry the user authored
    pub async fn delete_log_entry(&self, user_id: &str, log_entry_id: &str) -> Result<()> {
        let oid = parse_object_id(log_entry_id, "log entry")?;
        let logs = self.logs().await?;
        logs.find_one(doc! { "_id": oid, "user_id": user_id })
            .await?
            .ok_or(WaymarkError::NotFound("Log entry"))?;

        logs.soft_delete(doc! { "_id": oid }).await?;
        Ok(())
    }

    /// Privileged: remove an entry document unconditionally
    pub async fn permanently_delete_log_entry(&self, log_entry_id: &str) -> Result<()> {
        let oid = parse_object_id(log_entry_id, "log entry")?;
        let logs = self.logs().await?;
        logs.find_one_any(doc! { "_id": oid })
            .await?
            .ok_or(WaymarkError::NotFound("Log entry"))?;

        logs.delete_one(doc! { "_id": oid }).await?;
        Ok(())
    }
}

/// Custom enum values not yet present in the schema, keyed by dotted path.
/// Only paths whose field declares an enum count; the rest never persist.
pub fn new_enum_values(
    schema: &TrackerSchema,
    custom: &CustomEnumValues,
) -> HashMap<String, Vec<String>> {
    let mut additions = HashMap::new();
    for_each_field(schema, |path, node| {
        let Some(declared) = &node.enum_values else {
            return;
        };
        let Some(values) = custom.get(path) else {
            return;
        };
        let fresh: Vec<String> = values
            .iter()
            .filter(|v| !declared.contains(v))
            .cloned()
            .collect();
        if !fresh.is_empty() {
            additions.insert(path.to_string(), fresh);
        }
    });
    additions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_enum_values_filters_known_and_unknown_paths() {
        let schema: TrackerSchema = serde_json::from_value(serde_json::json!({
            "type": "object",
            "properties": {
                "mood": { "type": "string", "enum": ["happy", "sad"] },
                "note": { "type": "string" }
            }
        }))
        .unwrap();

        let mut custom = CustomEnumValues::new();
        custom.insert("mood".into(), vec!["sad".into(), "angry".into()]);
        // No enum declared: never persisted
        custom.insert("note".into(), vec!["whatever".into()]);
        // Not a declared field
        custom.insert("missing".into(), vec!["x".into()]);

        let additions = new_enum_values(&schema, &custom);
        assert_eq!(additions.len(), 1);
        assert_eq!(additions["mood"], vec!["angry".to_string()]);
    }

    #[test]
    fn test_new_enum_values_empty_when_all_known() {
        let schema: TrackerSchema = serde_json::from_value(serde_json::json!({
            "type": "object",
            "properties": { "mood": { "type": "string", "enum": ["happy"] } }
        }))
        .unwrap();

        let mut custom = CustomEnumValues::new();
        custom.insert("mood".into(), vec!["happy".into()]);
        assert!(new_enum_values(&schema, &custom).is_empty());
    }
}

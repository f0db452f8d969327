//! Tracker lifecycle store
//!
//! Owns tracker definitions and each user's visibility/ordering of them.
//! Trackers are shared: creating a name that already exists joins the
//! existing tracker instead of duplicating it. Soft delete moves a tracker
//! id between the user's active and deleted membership lists; permanent
//! delete (privileged) removes the tracker, purges every membership, and
//! deletes its entries. Schema mutation from submissions is a monotonic
//! enum union; the admin enum-value removal is the sole shrink path.

use std::collections::HashMap;

use bson::{doc, oid::ObjectId, DateTime};
use tracing::warn;

use crate::db::schemas::{
    LogEntryDoc, TrackerDoc, UserTrackersDoc, LOG_COLLECTION, TRACKER_COLLECTION,
    USER_TRACKERS_COLLECTION,
};
use crate::db::{parse_object_id, MongoClient, MongoCollection};
use crate::schema::{node_at_path_mut, TrackerSchema};
use crate::types::{Result, WaymarkError};
use crate::validation::ValidationReport;

/// Normalize a tracker name: lowercase, whitespace runs to single
/// underscores, anything outside `[a-z0-9_]` dropped.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut normalized = String::with_capacity(lowered.len());
    let mut in_whitespace = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                normalized.push('_');
            }
            in_whitespace = true;
        } else {
            in_whitespace = false;
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
                normalized.push(ch);
            }
        }
    }
    normalized
}

/// A tracker as seen by one user
#[derive(Clone, Debug)]
pub struct TrackerRecord {
    pub tracker: TrackerDoc,
    pub is_deleted: bool,
}

/// Tracker definitions plus per-user membership
#[derive(Clone)]
pub struct TrackerService {
    mongo: MongoClient,
}

impl TrackerService {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }

    async fn trackers(&self) -> Result<MongoCollection<TrackerDoc>> {
        self.mongo.collection(TRACKER_COLLECTION).await
    }

    async fn memberships(&self) -> Result<MongoCollection<UserTrackersDoc>> {
        self.mongo.collection(USER_TRACKERS_COLLECTION).await
    }

    async fn entries(&self) -> Result<MongoCollection<LogEntryDoc>> {
        self.mongo.collection(LOG_COLLECTION).await
    }

    /// The user's membership document, created empty on first touch
    pub async fn membership(&self, user_id: &str) -> Result<UserTrackersDoc> {
        let memberships = self.memberships().await?;
        if let Some(existing) = memberships.find_one(doc! { "user_id": user_id }).await? {
            return Ok(existing);
        }

        // First touch. A concurrent creator loses to the unique index on
        // user_id; fall back to the winner's document.
        if let Err(e) = memberships
            .insert_one(UserTrackersDoc::new(user_id.to_string()))
            .await
        {
            warn!("Membership insert for {} raced: {}", user_id, e);
        }

        memberships
            .find_one(doc! { "user_id": user_id })
            .await?
            .ok_or_else(|| WaymarkError::Internal("membership document missing after create".into()))
    }

    /// Whether the tracker is an active membership of the user
    pub async fn is_member(&self, user_id: &str, tracker_id: &str) -> Result<bool> {
        let memberships = self.memberships().await?;
        let found = memberships
            .find_one(doc! { "user_id": user_id, "tracker_ids": tracker_id })
            .await?;
        Ok(found.is_some())
    }

    /// List the user's trackers in display order, optionally including the
    /// soft-deleted ones (annotated)
    pub async fn list_for_user(
        &self,
        user_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<TrackerRecord>> {
        let membership = self.membership(user_id).await?;

        let mut visible_ids = membership.tracker_ids.clone();
        if include_deleted {
            visible_ids.extend(membership.deleted_tracker_ids.iter().cloned());
        }
        if visible_ids.is_empty() {
            return Ok(Vec::new());
        }

        let object_ids: Vec<ObjectId> = visible_ids
            .iter()
            .filter_map(|id| ObjectId::parse_str(id).ok())
            .collect();
        let trackers = self.trackers().await?;
        let docs = trackers
            .find_many(doc! { "_id": { "$in": object_ids } })
            .await?;

        let by_id: HashMap<String, TrackerDoc> =
            docs.into_iter().map(|d| (d.id_hex(), d)).collect();

        let mut ordered = Vec::with_capacity(visible_ids.len());
        for id in &visible_ids {
            if let Some(tracker) = by_id.get(id) {
                ordered.push(TrackerRecord {
                    tracker: tracker.clone(),
                    is_deleted: include_deleted
                        && membership.deleted_tracker_ids.iter().any(|d| d == id),
                });
            }
        }
        Ok(ordered)
    }

    /// Create a tracker, or join the existing one with the same normalized
    /// name, then add (or reinstate) the user's membership
    pub async fn create(
        &self,
        user_id: &str,
        name: &str,
        schema: TrackerSchema,
    ) -> Result<TrackerDoc> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            let mut report = ValidationReport::default();
            report
                .errors
                .push("name: must contain at least one letter, digit, or underscore".into());
            report.field_errors.insert(
                "name".into(),
                vec!["must contain at least one letter, digit, or underscore".into()],
            );
            return Err(WaymarkError::Validation(report));
        }

        let trackers = self.trackers().await?;
        let tracker = match trackers.find_one(doc! { "name": &normalized }).await? {
            Some(existing) => existing,
            None => {
                let id = trackers
                    .insert_one(TrackerDoc::new(normalized.clone(), schema))
                    .await?;
                trackers
                    .find_one(doc! { "_id": id })
                    .await?
                    .ok_or_else(|| {
                        WaymarkError::Internal("tracker missing after insert".into())
                    })?
            }
        };

        self.ensure_member(user_id, &tracker.id_hex()).await?;
        Ok(tracker)
    }

    /// Add the tracker to the user's active list, reinstating it from the
    /// deleted list if present
    async fn ensure_member(&self, user_id: &str, tracker_id: &str) -> Result<()> {
        self.membership(user_id).await?;
        let memberships = self.memberships().await?;
        memberships
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$addToSet": { "tracker_ids": tracker_id },
                    "$pull": { "deleted_tracker_ids": tracker_id },
                    "$set": { "metadata.updated_at": DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    /// Resolve a tracker the user is an active member of
    pub async fn get_for_user(&self, user_id: &str, tracker_id: &str) -> Result<TrackerDoc> {
        let oid = parse_object_id(tracker_id, "tracker")?;
        let trackers = self.trackers().await?;
        let tracker = trackers
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or(WaymarkError::NotFound("Tracker"))?;

        if !self.is_member(user_id, &tracker.id_hex()).await? {
            // Deliberately indistinguishable from absence
            return Err(WaymarkError::NotFound("Tracker"));
        }
        Ok(tracker)
    }

    /// Replace the tracker's schema. Requires membership in either list;
    /// the update is global and affects every member.
    pub async fn update_schema(
        &self,
        user_id: &str,
        tracker_id: &str,
        schema: TrackerSchema,
    ) -> Result<TrackerDoc> {
        let oid = parse_object_id(tracker_id, "tracker")?;
        let trackers = self.trackers().await?;
        trackers
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or(WaymarkError::NotFound("Tracker"))?;

        let membership = self.membership(user_id).await?;
        if !membership.knows(tracker_id) {
            return Err(WaymarkError::NotFound("Tracker"));
        }

        let schema_bson = bson::to_bson(&schema)
            .map_err(|e| WaymarkError::Internal(format!("Schema serialization failed: {e}")))?;
        trackers
            .update_one(
                doc! { "_id": oid },
                doc! { "$set": { "schema": schema_bson, "metadata.updated_at": DateTime::now() } },
            )
            .await?;

        trackers
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or(WaymarkError::NotFound("Tracker"))
    }

    /// Replace the user's active list with the given ordering. Every id
    /// must exist and be a current active membership.
    pub async fn reorder(&self, user_id: &str, tracker_ids: Vec<String>) -> Result<Vec<String>> {
        let mut object_ids = Vec::with_capacity(tracker_ids.len());
        for id in &tracker_ids {
            object_ids.push(parse_object_id(id, "tracker")?);
        }

        let trackers = self.trackers().await?;
        let found = trackers
            .find_many(doc! { "_id": { "$in": object_ids } })
            .await?;
        if found.len() != tracker_ids.len() {
            return Err(WaymarkError::NotFound("Tracker"));
        }

        let membership = self.membership(user_id).await?;
        if !tracker_ids.iter().all(|id| membership.is_active(id)) {
            return Err(WaymarkError::NotFound("Tracker"));
        }

        let memberships = self.memberships().await?;
        memberships
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$set": {
                        "tracker_ids": tracker_ids.clone(),
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(tracker_ids)
    }

    /// Soft delete for this user only: the id moves from the active list to
    /// the deleted list. The tracker document and its entries are untouched.
    pub async fn soft_delete(&self, user_id: &str, tracker_id: &str) -> Result<()> {
        let oid = parse_object_id(tracker_id, "tracker")?;
        let trackers = self.trackers().await?;
        trackers
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or(WaymarkError::NotFound("Tracker"))?;

        if !self.is_member(user_id, tracker_id).await? {
            return Err(WaymarkError::NotFound("Tracker"));
        }

        let memberships = self.memberships().await?;
        memberships
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$pull": { "tracker_ids": tracker_id },
                    "$addToSet": { "deleted_tracker_ids": tracker_id },
                    "$set": { "metadata.updated_at": DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    /// Privileged: remove the tracker, purge it from every user's lists,
    /// and delete all of its log entries
    pub async fn permanent_delete(&self, tracker_id: &str) -> Result<()> {
        let oid = parse_object_id(tracker_id, "tracker")?;
        let trackers = self.trackers().await?;
        trackers
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or(WaymarkError::NotFound("Tracker"))?;

        trackers.delete_one(doc! { "_id": oid }).await?;

        let memberships = self.memberships().await?;
        memberships
            .update_many(
                doc! {},
                doc! {
                    "$pull": {
                        "tracker_ids": tracker_id,
                        "deleted_tracker_ids": tracker_id,
                    }
                },
            )
            .await?;

        let entries = self.entries().await?;
        entries.delete_many(doc! { "tracker_id": tracker_id }).await?;
        Ok(())
    }

    /// Monotonic union of newly-observed enum values into the stored
    /// schema, keyed by dotted field path. Only fields that already declare
    /// an enum grow. Returns the schema to use for the rest of the call.
    ///
    /// Concurrency: re-read, merge, write. Last write wins; because the
    /// merge only appends, a lost concurrent value is re-added by the next
    /// submission that uses it.
    pub async fn merge_enum_values(
        &self,
        tracker_id: &str,
        additions: &HashMap<String, Vec<String>>,
    ) -> Result<TrackerSchema> {
        let oid = parse_object_id(tracker_id, "tracker")?;
        let trackers = self.trackers().await?;
        let mut tracker = trackers
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or(WaymarkError::NotFound("Tracker"))?;

        let mut changed = false;
        for (path, values) in additions {
            if let Some(node) = node_at_path_mut(&mut tracker.schema, path) {
                if node.enum_values.is_some() {
                    changed |= node.union_enum(values);
                }
            }
        }

        if changed {
            let schema_bson = bson::to_bson(&tracker.schema)
                .map_err(|e| WaymarkError::Internal(format!("Schema serialization failed: {e}")))?;
            trackers
                .update_one(
                    doc! { "_id": oid },
                    doc! { "$set": { "schema": schema_bson, "metadata.updated_at": DateTime::now() } },
                )
                .await?;
        }
        Ok(tracker.schema)
    }

    /// Privileged: remove one enum value at a dotted field path, the sole
    /// shrink path for a tracker schema. A value the field never listed is
    /// a no-op. Draft scrubbing is the caller's follow-up.
    pub async fn remove_enum_value(
        &self,
        tracker_id: &str,
        field_path: &str,
        value: &str,
    ) -> Result<TrackerDoc> {
        let oid = parse_object_id(tracker_id, "tracker")?;
        let trackers = self.trackers().await?;
        let mut tracker = trackers
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or(WaymarkError::NotFound("Tracker"))?;

        let removed = match node_at_path_mut(&mut tracker.schema, field_path) {
            Some(node) => match &mut node.enum_values {
                Some(values) => {
                    let before = values.len();
                    values.retain(|v| v != value);
                    values.len() != before
                }
                None => false,
            },
            None => return Err(WaymarkError::NotFound("Tracker field")),
        };

        if removed {
            let schema_bson = bson::to_bson(&tracker.schema)
                .map_err(|e| WaymarkError::Internal(format!("Schema serialization failed: {e}")))?;
            trackers
                .update_one(
                    doc! { "_id": oid },
                    doc! { "$set": { "schema": schema_bson, "metadata.updated_at": DateTime::now() } },
                )
                .await?;
        }

        trackers
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or(WaymarkError::NotFound("Tracker"))
    }

    /// Resolve a tracker by normalized name: exact match first, then a
    /// case/space-insensitive scan over all trackers
    pub async fn find_by_normalized_name(&self, normalized: &str) -> Result<Option<TrackerDoc>> {
        let trackers = self.trackers().await?;
        if let Some(exact) = trackers.find_one(doc! { "name": normalized }).await? {
            return Ok(Some(exact));
        }

        let all = trackers.find_many(doc! {}).await?;
        Ok(all
            .into_iter()
            .find(|t| normalize_name(&t.name) == normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("My Tracker"), "my_tracker");
        assert_eq!(normalize_name("Night  Feeds"), "night_feeds");
        assert_eq!(normalize_name("Café #3"), "caf_3");
        assert_eq!(normalize_name("already_normal"), "already_normal");
        assert_eq!(normalize_name("!!!"), "");
    }
}

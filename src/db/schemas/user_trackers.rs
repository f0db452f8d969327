//! Per-user tracker membership document
//!
//! Holds the user's active tracker ids in display order plus the ids the
//! user has soft-deleted. A tracker id lives in at most one of the two
//! lists; neither list contains duplicates.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for membership documents
pub const USER_TRACKERS_COLLECTION: &str = "user_trackers";

/// Membership document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserTrackersDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, deleted_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owning user id
    pub user_id: String,

    /// Active memberships, in user-chosen display order
    #[serde(default)]
    pub tracker_ids: Vec<String>,

    /// Soft-deleted memberships
    #[serde(default)]
    pub deleted_tracker_ids: Vec<String>,
}

impl UserTrackersDoc {
    /// Create an empty membership document for a user
    pub fn new(user_id: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            tracker_ids: Vec::new(),
            deleted_tracker_ids: Vec::new(),
        }
    }

    /// Whether the tracker is an active membership
    pub fn is_active(&self, tracker_id: &str) -> bool {
        self.tracker_ids.iter().any(|id| id == tracker_id)
    }

    /// Whether the tracker appears in either list
    pub fn knows(&self, tracker_id: &str) -> bool {
        self.is_active(tracker_id)
            || self.deleted_tracker_ids.iter().any(|id| id == tracker_id)
    }
}

impl IntoIndexes for UserTrackersDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One membership document per user
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserTrackersDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_lists_are_disjoint_queries() {
        let mut doc = UserTrackersDoc::new("u1".into());
        doc.tracker_ids.push("a".into());
        doc.deleted_tracker_ids.push("b".into());

        assert!(doc.is_active("a"));
        assert!(!doc.is_active("b"));
        assert!(doc.knows("a"));
        assert!(doc.knows("b"));
        assert!(!doc.knows("c"));
    }
}

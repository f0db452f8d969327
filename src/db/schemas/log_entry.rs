//! Log entry document schema
//!
//! One recorded instance of data conforming to a tracker's schema. Entries
//! are immutable once written except for the soft-delete timestamp;
//! cascade-derived entries carry a back-reference to the primary entry.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for log entries
pub const LOG_COLLECTION: &str = "logs";

/// Log entry document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LogEntryDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, deleted_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owning tracker id (hex string)
    pub tracker_id: String,

    /// Authoring user id
    pub user_id: String,

    /// Schema-conforming payload
    pub data: Map<String, Value>,

    /// Set on cascade-derived entries: the primary entry's id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_from_log_id: Option<String>,
}

impl LogEntryDoc {
    /// Create a new log entry document
    pub fn new(tracker_id: String, user_id: String, data: Map<String, Value>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            tracker_id,
            user_id,
            data,
            linked_from_log_id: None,
        }
    }

    /// Hex string form of the document id
    pub fn id_hex(&self) -> String {
        self._id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

impl IntoIndexes for LogEntryDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Listing: a user's entries for a tracker, newest first
            (
                doc! { "user_id": 1, "tracker_id": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_tracker_created_index".to_string())
                        .build(),
                ),
            ),
            // Purge path on permanent tracker deletion
            (
                doc! { "tracker_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("tracker_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for LogEntryDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

//! Tracker document schema
//!
//! Trackers are shared entities: the first user to create a name owns the
//! storage slot, and visibility is granted through per-user membership
//! documents. There is no `user_id` on the tracker itself.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::schema::TrackerSchema;

/// Collection name for trackers
pub const TRACKER_COLLECTION: &str = "trackers";

/// Tracker document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TrackerDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, deleted_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Normalized name (lowercase, underscores, [a-z0-9_])
    pub name: String,

    /// Field descriptors for entries logged against this tracker
    pub schema: TrackerSchema,
}

impl TrackerDoc {
    /// Create a new tracker document
    pub fn new(name: String, schema: TrackerSchema) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name,
            schema,
        }
    }

    /// Hex string form of the document id
    pub fn id_hex(&self) -> String {
        self._id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

impl IntoIndexes for TrackerDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on normalized name
            (
                doc! { "name": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("name_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for TrackerDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

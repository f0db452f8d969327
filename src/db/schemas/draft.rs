//! Draft entry document schema
//!
//! An unsubmitted, unvalidated snapshot of in-progress entry data, keyed by
//! user and tracker. Deleted on successful submission or explicit removal.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for drafts
pub const DRAFT_COLLECTION: &str = "draft_entries";

/// Draft document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DraftDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, deleted_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owning user id
    pub user_id: String,

    /// Target tracker id (hex string)
    pub tracker_id: String,

    /// In-progress payload, stored wire-normalized
    pub data: Map<String, Value>,

    /// Ad-hoc enum values the user introduced while editing
    #[serde(default)]
    pub custom_enum_values: HashMap<String, Vec<String>>,
}

impl DraftDoc {
    /// Create a new draft document
    pub fn new(
        user_id: String,
        tracker_id: String,
        data: Map<String, Value>,
        custom_enum_values: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            tracker_id,
            data,
            custom_enum_values,
        }
    }

    /// Hex string form of the document id
    pub fn id_hex(&self) -> String {
        self._id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

impl IntoIndexes for DraftDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Listing: a user's drafts, most recently updated first
            (
                doc! { "user_id": 1, "metadata.updated_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_updated_index".to_string())
                        .build(),
                ),
            ),
            // Scrub path on admin enum-value removal
            (
                doc! { "user_id": 1, "tracker_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_tracker_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for DraftDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

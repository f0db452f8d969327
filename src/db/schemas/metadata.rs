//! Common metadata for all documents
//!
//! Tracks creation, update, and soft deletion timestamps. Presence of
//! `deleted_at` is the sole soft-delete marker.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    /// When the document was soft-deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    /// When the document was last updated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    /// When the document was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Create new metadata with current timestamp
    pub fn new() -> Self {
        Self {
            deleted_at: None,
            updated_at: Some(DateTime::now()),
            created_at: Some(DateTime::now()),
        }
    }

    /// Metadata whose creation timestamp is fixed by the caller
    pub fn created_at(created_at: DateTime) -> Self {
        Self {
            deleted_at: None,
            updated_at: Some(DateTime::now()),
            created_at: Some(created_at),
        }
    }

    /// Whether the owning document is soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

//! MongoDB client and collection wrapper
//!
//! Typed collections own index creation, metadata timestamps, and the
//! soft-delete convention: a document is soft-deleted exactly when
//! `metadata.deleted_at` is present, and the default finders exclude such
//! documents.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::{IndexOptions, UpdateModifications},
    results::{DeleteResult, UpdateResult},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::{Result, WaymarkError};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| WaymarkError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        // Verify connection with timeout
        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| WaymarkError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Filter fragment excluding soft-deleted documents
fn not_deleted(mut filter: Document) -> Document {
    filter.insert("metadata.deleted_at", doc! { "$exists": false });
    filter
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply indexes
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        // Apply indexes
        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| WaymarkError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId> {
        let metadata = item.mut_metadata();
        if metadata.created_at.is_none() {
            metadata.created_at = Some(DateTime::now());
        }
        metadata.updated_at = Some(DateTime::now());
        metadata.deleted_at = None;

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| WaymarkError::Database(format!("Insert failed: {}", e)))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| WaymarkError::Database("Failed to get inserted ID".into()))
    }

    /// Find one document by filter, excluding soft-deleted ones
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        self.inner
            .find_one(not_deleted(filter))
            .await
            .map_err(|e| WaymarkError::Database(format!("Find failed: {}", e)))
    }

    /// Find one document by filter, soft-deleted included
    pub async fn find_one_any(&self, filter: Document) -> Result<Option<T>> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| WaymarkError::Database(format!("Find failed: {}", e)))
    }

    /// Find many documents by filter, excluding soft-deleted ones
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>> {
        let cursor = self
            .inner
            .find(not_deleted(filter))
            .await
            .map_err(|e| WaymarkError::Database(format!("Find failed: {}", e)))?;
        Self::collect(cursor).await
    }

    /// Find many documents with sort/limit/skip; `include_deleted` keeps
    /// soft-deleted documents in the result
    pub async fn find_many_sorted(
        &self,
        filter: Document,
        sort: Document,
        limit: Option<i64>,
        skip: Option<u64>,
        include_deleted: bool,
    ) -> Result<Vec<T>> {
        let filter = if include_deleted {
            filter
        } else {
            not_deleted(filter)
        };
        let mut find = self.inner.find(filter).sort(sort);
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        if let Some(skip) = skip {
            find = find.skip(skip);
        }
        let cursor = find
            .await
            .map_err(|e| WaymarkError::Database(format!("Find failed: {}", e)))?;
        Self::collect(cursor).await
    }

    async fn collect(cursor: mongodb::Cursor<T>) -> Result<Vec<T>> {
        use futures_util::StreamExt;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Update one document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| WaymarkError::Database(format!("Update failed: {}", e)))
    }

    /// Update all documents matching the filter
    pub async fn update_many(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult> {
        self.inner
            .update_many(filter, update.into())
            .await
            .map_err(|e| WaymarkError::Database(format!("Update failed: {}", e)))
    }

    /// Soft delete: stamp `metadata.deleted_at`
    pub async fn soft_delete(&self, filter: Document) -> Result<UpdateResult> {
        let update = doc! {
            "$set": {
                "metadata.deleted_at": DateTime::now(),
                "metadata.updated_at": DateTime::now(),
            }
        };

        self.update_one(filter, update).await
    }

    /// Permanently remove one document
    pub async fn delete_one(&self, filter: Document) -> Result<DeleteResult> {
        self.inner
            .delete_one(filter)
            .await
            .map_err(|e| WaymarkError::Database(format!("Delete failed: {}", e)))
    }

    /// Permanently remove all documents matching the filter
    pub async fn delete_many(&self, filter: Document) -> Result<DeleteResult> {
        self.inner
            .delete_many(filter)
            .await
            .map_err(|e| WaymarkError::Database(format!("Delete failed: {}", e)))
    }

    /// Get the underlying collection for advanced operations
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}

/// Parse an ObjectId or report which resource carried the malformed id
pub fn parse_object_id(id: &str, resource: &'static str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| WaymarkError::InvalidId(resource))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_deleted_filter_shape() {
        let filter = not_deleted(doc! { "user_id": "u1" });
        assert_eq!(
            filter.get_document("metadata.deleted_at").unwrap(),
            &doc! { "$exists": false }
        );
        assert_eq!(filter.get_str("user_id").unwrap(), "u1");
    }

    #[test]
    fn test_parse_object_id_reports_resource() {
        let err = parse_object_id("not-an-id", "tracker").unwrap_err();
        assert_eq!(err.to_string(), "Invalid tracker ID");
        assert!(parse_object_id("507f1f77bcf86cd799439011", "tracker").is_ok());
    }
}

//! Document store access
//!
//! MongoDB client, typed collection wrapper, and document schemas.

pub mod mongo;
pub mod schemas;

pub use mongo::{parse_object_id, IntoIndexes, MongoClient, MongoCollection, MutMetadata};

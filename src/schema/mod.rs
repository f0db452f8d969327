//! Tracker schema model
//!
//! Recursive field descriptors for user-defined trackers, the traversal
//! utility shared by validation and cascade processing, and the wire-format
//! conversions used when drafts move between storage and editable form
//! values. Pure data and pure functions; no I/O lives here.

pub mod forms;
mod node;
mod traverse;

pub use node::{FieldType, LinkSpec, RootType, SchemaNode, TrackerSchema, ValueFormat};
pub use traverse::{for_each_field, node_at_path, node_at_path_mut};

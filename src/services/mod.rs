//! Domain services
//!
//! Tracker lifecycle, log entry creation with cascade fan-out, drafts, and
//! cascade skip diagnostics. Each service is a thin handle over the shared
//! Mongo client; all state lives in the document store except the warning
//! store.

pub mod cascade;
pub mod drafts;
pub mod entries;
pub mod trackers;
pub mod warnings;

pub use cascade::{
    build_base_payload, discover_triggers, fill_time_fields, is_truthy, LinkTrigger, TriggerBase,
};
pub use drafts::DraftService;
pub use entries::{new_enum_values, CreatedLogEntry, LogEntryService};
pub use trackers::{normalize_name, TrackerRecord, TrackerService};
pub use warnings::{CascadeWarning, CascadeWarningStore, DEFAULT_WARNING_CAPACITY};

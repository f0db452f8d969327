//! Database schemas for Waymark
//!
//! Defines MongoDB document structures for trackers, log entries, per-user
//! membership, and drafts.

mod draft;
mod log_entry;
mod metadata;
mod tracker;
mod user_trackers;

pub use draft::{DraftDoc, DRAFT_COLLECTION};
pub use log_entry::{LogEntryDoc, LOG_COLLECTION};
pub use metadata::Metadata;
pub use tracker::{TrackerDoc, TRACKER_COLLECTION};
pub use user_trackers::{UserTrackersDoc, USER_TRACKERS_COLLECTION};

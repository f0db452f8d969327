//! Waymark - schema-driven tracker and log-entry service
//!
//! Users define "trackers" (named, schema-described record types) and log
//! structured entries against them, backed by MongoDB.
//!
//! ## Core pieces
//!
//! - **Schema model**: extended JSON-Schema field descriptors with UI and
//!   linked-log keywords
//! - **Validation engine**: strips UI keywords, merges ad-hoc enum values,
//!   produces per-field errors
//! - **Tracker lifecycle**: shared trackers with per-user membership,
//!   ordering, and soft delete
//! - **Cascade service**: one submission can fan out derived entries into
//!   linked trackers, never failing the primary write
//! - **Drafts**: resumable, unvalidated in-progress entries

pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod schema;
pub mod server;
pub mod services;
pub mod types;
pub mod validation;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, WaymarkError};

//! Error taxonomy for Waymark
//!
//! Absence and missing membership are deliberately conflated into
//! `NotFound` so callers cannot probe for the existence of other users'
//! trackers, entries, or drafts.

use thiserror::Error;

use crate::validation::ValidationReport;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, WaymarkError>;

/// Waymark error taxonomy
#[derive(Error, Debug)]
pub enum WaymarkError {
    /// Resource absent, or present but not visible to the caller
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Malformed identifier (not a valid ObjectId)
    #[error("Invalid {0} ID")]
    InvalidId(&'static str),

    /// Payload does not satisfy the tracker schema
    #[error("Validation failed")]
    Validation(ValidationReport),

    /// Document store failure
    #[error("Database error: {0}")]
    Database(String),

    /// Unexpected runtime failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WaymarkError {
    /// Field-level detail, present only for validation failures
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            WaymarkError::Validation(report) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = WaymarkError::NotFound("Tracker");
        assert_eq!(err.to_string(), "Tracker not found");
    }

    #[test]
    fn test_invalid_id_message() {
        let err = WaymarkError::InvalidId("log entry");
        assert_eq!(err.to_string(), "Invalid log entry ID");
    }
}

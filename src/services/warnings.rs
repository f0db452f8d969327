//! Cascade warning store
//!
//! Cascade-link failures are swallowed per-link so a misconfigured link can
//! never fail a primary submission. This store keeps the skip diagnostics
//! observable: every skip is recorded per user, bounded FIFO, and drained
//! through the warnings endpoint. Process-local; warnings do not survive a
//! restart.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;

/// Default per-user warning retention
pub const DEFAULT_WARNING_CAPACITY: usize = 100;

/// One skipped cascade link
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CascadeWarning {
    /// Id of the primary entry whose cascade was skipped
    pub primary_log_id: String,
    /// Schema field that declared the link
    pub field: String,
    /// Declared target tracker name
    pub target_tracker_name: String,
    /// Why the link was skipped
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Bounded per-user store of cascade skip diagnostics
pub struct CascadeWarningStore {
    per_user: DashMap<String, VecDeque<CascadeWarning>>,
    capacity: usize,
}

impl CascadeWarningStore {
    /// Create a store retaining at most `capacity` warnings per user
    pub fn new(capacity: usize) -> Self {
        Self {
            per_user: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a skip; the oldest warning is dropped once at capacity
    pub fn record(&self, user_id: &str, warning: CascadeWarning) {
        let mut entry = self.per_user.entry(user_id.to_string()).or_default();
        if entry.len() >= self.capacity {
            entry.pop_front();
        }
        entry.push_back(warning);
    }

    /// Drain all warnings for a user, oldest first
    pub fn take(&self, user_id: &str) -> Vec<CascadeWarning> {
        self.per_user
            .remove(user_id)
            .map(|(_, warnings)| warnings.into_iter().collect())
            .unwrap_or_default()
    }

    /// Number of pending warnings for a user
    pub fn pending(&self, user_id: &str) -> usize {
        self.per_user.get(user_id).map(|w| w.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(reason: &str) -> CascadeWarning {
        CascadeWarning {
            primary_log_id: "p1".into(),
            field: "craving".into(),
            target_tracker_name: "cravings".into(),
            reason: reason.into(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_take_drains_in_fifo_order() {
        let store = CascadeWarningStore::new(10);
        store.record("u1", warning("first"));
        store.record("u1", warning("second"));

        let drained = store.take("u1");
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].reason, "first");
        assert_eq!(drained[1].reason, "second");
        assert_eq!(store.pending("u1"), 0);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let store = CascadeWarningStore::new(2);
        store.record("u1", warning("first"));
        store.record("u1", warning("second"));
        store.record("u1", warning("third"));

        let drained = store.take("u1");
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].reason, "second");
    }

    #[test]
    fn test_users_are_isolated() {
        let store = CascadeWarningStore::new(10);
        store.record("u1", warning("mine"));
        assert_eq!(store.pending("u2"), 0);
        assert!(store.take("u2").is_empty());
        assert_eq!(store.pending("u1"), 1);
    }
}

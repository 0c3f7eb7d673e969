// ── Coordinator registry ──
//
// Process-owned map of live coordinators keyed by account id, with
// explicit insertion and removal on setup/teardown. The platform
// boundary's "refresh all tracked accounts" operation fans out here.

use dashmap::DashMap;
use tracing::debug;

use crate::coordinator::Coordinator;

/// Registry of live coordinators, keyed by account identifier.
#[derive(Default)]
pub struct CoordinatorRegistry {
    coordinators: DashMap<String, Coordinator>,
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self {
            coordinators: DashMap::new(),
        }
    }

    /// Register a coordinator under an account id, replacing any
    /// previous entry.
    pub fn insert(&self, account_id: impl Into<String>, coordinator: Coordinator) {
        self.coordinators.insert(account_id.into(), coordinator);
    }

    /// Remove an account's coordinator and shut it down. Returns `true`
    /// if one was registered.
    pub async fn remove(&self, account_id: &str) -> bool {
        match self.coordinators.remove(account_id) {
            Some((_, coordinator)) => {
                coordinator.shutdown().await;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, account_id: &str) -> Option<Coordinator> {
        self.coordinators
            .get(account_id)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.coordinators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinators.is_empty()
    }

    /// Request a refresh on every live coordinator.
    pub fn refresh_all(&self) {
        for entry in &self.coordinators {
            debug!(account = %entry.key(), "bulk refresh requested");
            entry.value().request_refresh();
        }
    }
}

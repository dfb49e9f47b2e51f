//! Replication for Tally
//!
//! Budgets and expenses replicate continuously and independently against a
//! remote replica named by the sync token setting. Conflicts resolve by
//! revision (last writer wins) and nothing is validated on the way in.

pub mod config;
pub mod error;
pub mod manager;
pub mod replicator;
pub mod transport;

pub use config::{RetryConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use manager::{ReplicationManager, SessionPhase, SyncStatus};
pub use replicator::{EventSink, ReplicationEvent, ReplicationTask};
pub use transport::{
    DirectoryConnector, DirectoryRemote, PullBatch, ReplicaTransport, TransportConnector,
    WireChange,
};

use crate::models::{Budget, Expense};
use crate::storage::Document;

/// Anything that knows whether the first sync has finished
pub trait SyncGate {
    fn first_sync_done(&self) -> bool;
}

/// A boolean per replicated collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionFlags {
    pub budgets: bool,
    pub expenses: bool,
}

/// Whether each collection has completed its first sync
pub type FirstSync = CollectionFlags;

impl CollectionFlags {
    /// Both flags set
    pub fn done() -> Self {
        Self {
            budgets: true,
            expenses: true,
        }
    }

    pub fn all(&self) -> bool {
        self.budgets && self.expenses
    }

    /// Set the flag of a collection by name; unknown names are ignored
    pub fn set(&mut self, collection: &str, value: bool) {
        if collection == Budget::COLLECTION {
            self.budgets = value;
        } else if collection == Expense::COLLECTION {
            self.expenses = value;
        }
    }
}

impl SyncGate for CollectionFlags {
    fn first_sync_done(&self) -> bool {
        self.all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_by_collection_name() {
        let mut flags = FirstSync::default();
        assert!(!flags.first_sync_done());

        flags.set("budgets", true);
        flags.set("accounts", true);
        assert!(!flags.first_sync_done());

        flags.set("expenses", true);
        assert!(flags.first_sync_done());
        assert_eq!(flags, FirstSync::done());
    }
}

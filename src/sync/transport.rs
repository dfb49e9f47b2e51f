//! Transport layer for replication
//!
//! A [`ReplicaTransport`] is the remote side of a replica pair. The
//! replicator pulls the remote change feed and pushes the local one through
//! it; documents travel as JSON values so transports stay untyped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{SyncError, SyncResult};
use crate::models::{Budget, Expense};
use crate::storage::{Change, Collection, Document, Store};

/// One change as it travels between replicas. `doc == None` is a deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireChange {
    pub id: String,
    pub rev: String,
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<serde_json::Value>,
}

/// A page of the remote change feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullBatch {
    pub changes: Vec<WireChange>,
    /// Checkpoint to pull from next time
    pub last_seq: u64,
}

/// The remote end of replication.
///
/// Implementations must be safe to share between the replicator threads of
/// both collections.
pub trait ReplicaTransport: Send + Sync {
    /// Address this transport was opened with
    fn address(&self) -> &str;

    /// Up to `limit` remote changes of `collection` after checkpoint `since`
    fn pull(&self, collection: &str, since: u64, limit: usize) -> SyncResult<PullBatch>;

    /// Offer local changes to the remote; returns how many it accepted
    fn push(&self, collection: &str, changes: &[WireChange]) -> SyncResult<usize>;

    /// Delete everything the remote holds
    fn erase(&self) -> SyncResult<()>;
}

/// Opens transports from sync tokens
pub trait TransportConnector: Send + Sync {
    fn connect(&self, address: &str) -> SyncResult<Arc<dyn ReplicaTransport>>;
}

/// Convert a local change into its wire form
pub fn to_wire<D: Document>(change: Change<D>) -> SyncResult<WireChange> {
    let doc = match change.doc {
        Some(doc) => Some(
            serde_json::to_value(&doc)
                .map_err(|e| SyncError::Protocol(format!("Failed to encode {}: {}", D::ENTITY, e)))?,
        ),
        None => None,
    };
    Ok(WireChange {
        id: change.id,
        rev: change.revision,
        seq: change.seq,
        doc,
    })
}

/// Decode a wire change into a typed change
pub fn from_wire<D: Document>(wire: WireChange) -> SyncResult<Change<D>> {
    let doc = match wire.doc {
        Some(value) => Some(serde_json::from_value(value).map_err(|e| {
            SyncError::Protocol(format!("Invalid {} '{}': {}", D::ENTITY, wire.id, e))
        })?),
        None => None,
    };
    Ok(Change {
        id: wire.id,
        revision: wire.rev,
        seq: wire.seq,
        doc,
    })
}

fn pull_from<D: Document>(
    collection: &Collection<D>,
    since: u64,
    limit: usize,
) -> SyncResult<PullBatch> {
    let changes = collection.changes_since(since, limit)?;
    let last_seq = changes.last().map_or(since, |c| c.seq);
    Ok(PullBatch {
        changes: changes.into_iter().map(to_wire).collect::<SyncResult<_>>()?,
        last_seq,
    })
}

fn push_into<D: Document>(collection: &Collection<D>, changes: &[WireChange]) -> SyncResult<usize> {
    let mut accepted = 0;
    for wire in changes {
        if collection.apply_replicated(from_wire(wire.clone())?)? {
            accepted += 1;
        }
    }
    Ok(accepted)
}

/// A remote replica kept in a directory, in the same format as the local
/// database.
///
/// The sync token is the directory path, optionally prefixed with
/// `file://`. One process should own a given directory at a time.
pub struct DirectoryRemote {
    address: String,
    store: Store,
}

impl DirectoryRemote {
    /// Directory named by a sync token
    pub fn resolve(address: &str) -> SyncResult<PathBuf> {
        let path = address.trim();
        let path = path.strip_prefix("file://").unwrap_or(path);
        if path.is_empty() {
            return Err(SyncError::InvalidAddress(address.to_string()));
        }
        Ok(PathBuf::from(path))
    }

    pub fn open(address: &str) -> SyncResult<Self> {
        let dir = Self::resolve(address)?;
        let store = Store::open(&dir).map_err(|e| {
            SyncError::transport_retryable(format!("Cannot open remote '{}': {}", address, e))
        })?;
        Ok(Self {
            address: address.to_string(),
            store,
        })
    }
}

impl ReplicaTransport for DirectoryRemote {
    fn address(&self) -> &str {
        &self.address
    }

    fn pull(&self, collection: &str, since: u64, limit: usize) -> SyncResult<PullBatch> {
        if collection == Budget::COLLECTION {
            pull_from(&self.store.budgets, since, limit)
        } else if collection == Expense::COLLECTION {
            pull_from(&self.store.expenses, since, limit)
        } else {
            Err(SyncError::Protocol(format!("Unknown collection '{}'", collection)))
        }
    }

    fn push(&self, collection: &str, changes: &[WireChange]) -> SyncResult<usize> {
        if collection == Budget::COLLECTION {
            push_into(&self.store.budgets, changes)
        } else if collection == Expense::COLLECTION {
            push_into(&self.store.expenses, changes)
        } else {
            Err(SyncError::Protocol(format!("Unknown collection '{}'", collection)))
        }
    }

    fn erase(&self) -> SyncResult<()> {
        self.store.erase()?;
        self.store.recreate_collections()?;
        info!(remote = %self.address, "remote replica erased");
        Ok(())
    }
}

/// Connector for [`DirectoryRemote`]s.
///
/// Remotes are shared per directory, so every session of this process that
/// syncs against the same directory sees the same remote state.
#[derive(Default)]
pub struct DirectoryConnector {
    open: Mutex<HashMap<PathBuf, Arc<DirectoryRemote>>>,
}

impl DirectoryConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransportConnector for DirectoryConnector {
    fn connect(&self, address: &str) -> SyncResult<Arc<dyn ReplicaTransport>> {
        let dir = DirectoryRemote::resolve(address)?;
        let mut open = self
            .open
            .lock()
            .map_err(|e| SyncError::transport_retryable(format!("Failed to acquire lock: {}", e)))?;

        if let Some(remote) = open.get(&dir) {
            return Ok(remote.clone());
        }

        let remote = Arc::new(DirectoryRemote::open(address)?);
        open.insert(dir, remote.clone());
        Ok(remote)
    }
}

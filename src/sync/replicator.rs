//! Continuous replication of one collection
//!
//! Each collection gets its own thread that alternates pull and push cycles
//! against the remote until it is told to stop. Failed cycles are retried
//! forever with backoff; the thread reports what happens through
//! [`ReplicationEvent`]s.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::config::SyncConfig;
use super::error::SyncResult;
use super::transport::{from_wire, to_wire, ReplicaTransport};
use crate::storage::{Collection, Document};

/// What a replicator reports about its collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationEvent {
    /// The remote became reachable (`true`) or stopped being reachable
    Alive { collection: &'static str, alive: bool },
    /// A cycle moved documents in either direction
    Change {
        collection: &'static str,
        ok: bool,
        pulled: usize,
        pushed: usize,
    },
    /// The first cycle after connecting completed
    InitialSyncComplete { collection: &'static str },
}

impl ReplicationEvent {
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Alive { collection, .. }
            | Self::Change { collection, .. }
            | Self::InitialSyncComplete { collection } => collection,
        }
    }
}

/// Callback the replicator hands its events to
pub type EventSink = Arc<dyn Fn(&ReplicationEvent) + Send + Sync>;

#[derive(Debug, Default, Clone, Copy)]
struct CycleStats {
    pulled: usize,
    pushed: usize,
}

struct Replicator<D: Document> {
    local: Arc<Collection<D>>,
    remote: Arc<dyn ReplicaTransport>,
    config: SyncConfig,
    sink: EventSink,
    /// Last remote seq we have applied
    remote_checkpoint: u64,
    /// Last local seq we have offered
    local_checkpoint: u64,
}

impl<D: Document> Replicator<D> {
    fn emit(&self, event: ReplicationEvent) {
        (self.sink)(&event);
    }

    fn pull(&mut self) -> SyncResult<usize> {
        let mut applied = 0;
        loop {
            let batch = self.remote.pull(
                D::COLLECTION,
                self.remote_checkpoint,
                self.config.batch_size,
            )?;
            let received = batch.changes.len();

            for wire in batch.changes {
                if self.local.apply_replicated(from_wire::<D>(wire)?)? {
                    applied += 1;
                }
            }
            self.remote_checkpoint = batch.last_seq;

            if received < self.config.batch_size {
                return Ok(applied);
            }
        }
    }

    fn push(&mut self) -> SyncResult<usize> {
        let mut accepted = 0;
        loop {
            let changes = self
                .local
                .changes_since(self.local_checkpoint, self.config.batch_size)?;
            let Some(last_seq) = changes.last().map(|c| c.seq) else {
                return Ok(accepted);
            };
            let sent = changes.len();

            let wire = changes
                .into_iter()
                .map(to_wire)
                .collect::<SyncResult<Vec<_>>>()?;
            accepted += self.remote.push(D::COLLECTION, &wire)?;
            self.local_checkpoint = last_seq;

            if sent < self.config.batch_size {
                return Ok(accepted);
            }
        }
    }

    fn cycle(&mut self) -> SyncResult<CycleStats> {
        let pulled = self.pull()?;
        let pushed = self.push()?;
        Ok(CycleStats { pulled, pushed })
    }

    fn run(mut self, stop: Receiver<()>) {
        let collection = D::COLLECTION;
        let mut alive = None;
        let mut initial_done = false;
        let mut failures = 0u32;

        loop {
            let wait = match self.cycle() {
                Ok(stats) => {
                    failures = 0;
                    if alive != Some(true) {
                        alive = Some(true);
                        self.emit(ReplicationEvent::Alive {
                            collection,
                            alive: true,
                        });
                    }
                    if stats.pulled + stats.pushed > 0 {
                        debug!(collection, pulled = stats.pulled, pushed = stats.pushed, "replicated");
                        self.emit(ReplicationEvent::Change {
                            collection,
                            ok: true,
                            pulled: stats.pulled,
                            pushed: stats.pushed,
                        });
                    }
                    if !initial_done {
                        initial_done = true;
                        self.emit(ReplicationEvent::InitialSyncComplete { collection });
                    }
                    self.config.poll_interval
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    warn!(collection, error = %err, retryable = err.is_retryable(), "replication cycle failed");
                    if alive != Some(false) {
                        alive = Some(false);
                        self.emit(ReplicationEvent::Alive {
                            collection,
                            alive: false,
                        });
                    }
                    self.config.retry.delay_for_attempt(failures)
                }
            };

            match stop.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!(collection, "replication stopped");
    }
}

/// Handle to a running replicator thread
pub struct ReplicationTask {
    collection: &'static str,
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl ReplicationTask {
    /// Start replicating `local` against `remote` on a new thread
    pub fn spawn<D: Document>(
        local: Arc<Collection<D>>,
        remote: Arc<dyn ReplicaTransport>,
        config: SyncConfig,
        sink: EventSink,
    ) -> std::io::Result<Self> {
        let (stop, stop_rx) = mpsc::channel();
        let replicator = Replicator {
            local,
            remote,
            config,
            sink,
            remote_checkpoint: 0,
            local_checkpoint: 0,
        };
        let handle = thread::Builder::new()
            .name(format!("replicate-{}", D::COLLECTION))
            .spawn(move || replicator.run(stop_rx))?;

        Ok(Self {
            collection: D::COLLECTION,
            stop,
            handle,
        })
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    /// Stop the thread and wait for its current cycle to finish
    pub fn stop(self) {
        // A send error means the thread already exited
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            warn!(collection = self.collection, "replicator thread panicked");
        }
    }
}

//! A persistent document collection
//!
//! Each collection lives in one JSON file. Documents are kept in id order so
//! scans are deterministic. Every mutation is stamped with a sequence number
//! and deletions leave tombstones, which together form the change feed the
//! replicator reads.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::file_io::{read_json, remove_file_if_exists, write_json_atomic};
use super::query::Query;
use super::revision::Revision;
use crate::error::{TallyError, TallyResult};

/// A type that can be stored in a [`Collection`]
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection name, also used for the file name and on the wire
    const COLLECTION: &'static str;

    /// Entity name used in "not found" errors
    const ENTITY: &'static str;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn revision(&self) -> Option<&str>;

    fn set_revision(&mut self, revision: Option<String>);

    /// String value of an indexed field, for [`Query`] evaluation
    fn field(&self, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "D: Serialize", deserialize = "D: DeserializeOwned"))]
struct StoredEntry<D> {
    id: String,
    rev: String,
    seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    doc: Option<D>,
}

impl<D> StoredEntry<D> {
    fn is_live(&self) -> bool {
        self.doc.is_some()
    }

    fn revision(&self) -> Option<Revision> {
        Revision::parse(&self.rev)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "D: Serialize", deserialize = "D: DeserializeOwned"))]
struct CollectionFile<D> {
    #[serde(default)]
    last_seq: u64,
    #[serde(default = "Vec::new")]
    entries: Vec<StoredEntry<D>>,
}

impl<D> Default for CollectionFile<D> {
    fn default() -> Self {
        Self {
            last_seq: 0,
            entries: Vec::new(),
        }
    }
}

#[derive(Clone)]
struct State<D> {
    entries: BTreeMap<String, StoredEntry<D>>,
    last_seq: u64,
    removed: bool,
}

impl<D> State<D> {
    fn next_seq(&mut self) -> u64 {
        self.last_seq += 1;
        self.last_seq
    }
}

/// One entry of the change feed. `doc == None` is a deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<D> {
    pub id: String,
    pub revision: String,
    pub seq: u64,
    pub doc: Option<D>,
}

/// Outcome of a bulk insert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkInsertResult {
    pub inserted: usize,
    /// Ids that already belonged to a live document and were skipped
    pub conflicts: Vec<String>,
}

/// A persistent, queryable set of documents of one type
pub struct Collection<D: Document> {
    path: PathBuf,
    state: RwLock<State<D>>,
}

impl<D: Document> Collection<D> {
    /// Create an empty collection backed by `path` (nothing is read yet)
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: RwLock::new(State {
                entries: BTreeMap::new(),
                last_seq: 0,
                removed: false,
            }),
        }
    }

    /// Create a collection and load its file
    pub fn open(path: PathBuf) -> TallyResult<Self> {
        let collection = Self::new(path);
        collection.load()?;
        Ok(collection)
    }

    pub fn name(&self) -> &'static str {
        D::COLLECTION
    }

    /// Reload the collection from disk
    pub fn load(&self) -> TallyResult<()> {
        let file: CollectionFile<D> = read_json(&self.path)?;
        let mut state = self.lock_write()?;

        state.entries.clear();
        let mut last_seq = file.last_seq;
        for entry in file.entries {
            last_seq = last_seq.max(entry.seq);
            state.entries.insert(entry.id.clone(), entry);
        }
        state.last_seq = state.last_seq.max(last_seq);
        state.removed = false;
        Ok(())
    }

    fn lock_read(&self) -> TallyResult<RwLockReadGuard<'_, State<D>>> {
        self.state
            .read()
            .map_err(|e| TallyError::Storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn lock_write(&self) -> TallyResult<RwLockWriteGuard<'_, State<D>>> {
        self.state
            .write()
            .map_err(|e| TallyError::Storage(format!("Failed to acquire write lock: {}", e)))
    }

    fn removed_error(&self) -> TallyError {
        TallyError::Storage(format!("Collection '{}' has been removed", D::COLLECTION))
    }

    fn live_read(&self) -> TallyResult<RwLockReadGuard<'_, State<D>>> {
        let state = self.lock_read()?;
        if state.removed {
            return Err(self.removed_error());
        }
        Ok(state)
    }

    fn live_write(&self) -> TallyResult<RwLockWriteGuard<'_, State<D>>> {
        let state = self.lock_write()?;
        if state.removed {
            return Err(self.removed_error());
        }
        Ok(state)
    }

    fn persist(&self, state: &State<D>) -> TallyResult<()> {
        let file = CollectionFile {
            last_seq: state.last_seq,
            entries: state.entries.values().cloned().collect(),
        };
        write_json_atomic(&self.path, &file)
    }

    /// Apply `mutate` to a copy of `state` and keep the copy only once it is
    /// on disk. A failed write leaves `state` as it was.
    fn commit<R>(
        &self,
        state: &mut State<D>,
        mutate: impl FnOnce(&mut State<D>) -> R,
    ) -> TallyResult<R> {
        let mut next = state.clone();
        let output = mutate(&mut next);
        self.persist(&next)?;
        *state = next;
        Ok(output)
    }

    /// All live documents matching `query`, in id order
    pub fn find(&self, query: &Query) -> TallyResult<Vec<D>> {
        let state = self.live_read()?;
        Ok(state
            .entries
            .values()
            .filter_map(|entry| entry.doc.as_ref())
            .filter(|doc| query.matches(|field| doc.field(field)))
            .cloned()
            .collect())
    }

    /// The first live document matching `query`, in id order
    pub fn find_one(&self, query: &Query) -> TallyResult<Option<D>> {
        let state = self.live_read()?;
        Ok(state
            .entries
            .values()
            .filter_map(|entry| entry.doc.as_ref())
            .find(|doc| query.matches(|field| doc.field(field)))
            .cloned())
    }

    /// Look up a live document by id
    pub fn get(&self, id: &str) -> TallyResult<Option<D>> {
        let state = self.live_read()?;
        Ok(state.entries.get(id).and_then(|entry| entry.doc.clone()))
    }

    /// Number of live documents
    pub fn count(&self) -> TallyResult<usize> {
        let state = self.live_read()?;
        Ok(state.entries.values().filter(|e| e.is_live()).count())
    }

    /// Stamp `doc` as a new local write into `state` (no persistence)
    fn write_entry(state: &mut State<D>, mut doc: D) -> D {
        let previous = state
            .entries
            .get(doc.id())
            .and_then(|entry| entry.revision());
        let rev = Revision::successor(previous.as_ref()).to_string();
        doc.set_revision(Some(rev.clone()));
        let seq = state.next_seq();
        state.entries.insert(
            doc.id().to_string(),
            StoredEntry {
                id: doc.id().to_string(),
                rev,
                seq,
                doc: Some(doc.clone()),
            },
        );
        doc
    }

    /// Insert a new document. Fails if the id is empty or already live.
    pub fn insert(&self, doc: D) -> TallyResult<D> {
        if doc.id().is_empty() {
            return Err(TallyError::Storage(format!(
                "Cannot insert into '{}' without an id",
                D::COLLECTION
            )));
        }

        let mut state = self.live_write()?;
        if state.entries.get(doc.id()).is_some_and(|e| e.is_live()) {
            return Err(TallyError::Storage(format!(
                "{} '{}' already exists",
                D::ENTITY,
                doc.id()
            )));
        }

        self.commit(&mut state, |state| Self::write_entry(state, doc))
    }

    /// Insert many documents with a single write to disk.
    ///
    /// Documents whose id is already live are skipped and reported.
    pub fn bulk_insert(&self, docs: Vec<D>) -> TallyResult<BulkInsertResult> {
        if docs.is_empty() {
            return Ok(BulkInsertResult::default());
        }

        let mut state = self.live_write()?;
        let (fresh, conflicts): (Vec<D>, Vec<D>) = docs.into_iter().partition(|doc| {
            !doc.id().is_empty() && !state.entries.get(doc.id()).is_some_and(|e| e.is_live())
        });
        let mut result = BulkInsertResult {
            inserted: 0,
            conflicts: conflicts.iter().map(|doc| doc.id().to_string()).collect(),
        };

        if !fresh.is_empty() {
            let (inserted, repeated) = self.commit(&mut state, |state| {
                let mut inserted = 0;
                let mut repeated = Vec::new();
                for doc in fresh {
                    // Two incoming documents may share an id; the first wins
                    if state.entries.get(doc.id()).is_some_and(|e| e.is_live()) {
                        repeated.push(doc.id().to_string());
                        continue;
                    }
                    Self::write_entry(state, doc);
                    inserted += 1;
                }
                (inserted, repeated)
            })?;
            result.inserted = inserted;
            result.conflicts.extend(repeated);
        }
        Ok(result)
    }

    /// Patch a live document in place
    pub fn update<F>(&self, id: &str, patch: F) -> TallyResult<D>
    where
        F: FnOnce(&mut D),
    {
        let mut state = self.live_write()?;
        let mut doc = state
            .entries
            .get(id)
            .and_then(|entry| entry.doc.clone())
            .ok_or_else(|| TallyError::NotFound {
                entity_type: D::ENTITY,
                identifier: id.to_string(),
            })?;

        patch(&mut doc);
        doc.set_id(id.to_string());

        self.commit(&mut state, |state| Self::write_entry(state, doc))
    }

    /// Delete a live document, leaving a tombstone for replication
    pub fn remove(&self, id: &str) -> TallyResult<()> {
        let mut state = self.live_write()?;
        let previous = match state.entries.get(id) {
            Some(entry) if entry.is_live() => entry.revision(),
            _ => {
                return Err(TallyError::NotFound {
                    entity_type: D::ENTITY,
                    identifier: id.to_string(),
                })
            }
        };

        let rev = Revision::successor(previous.as_ref()).to_string();
        self.commit(&mut state, |state| {
            let seq = state.next_seq();
            state.entries.insert(
                id.to_string(),
                StoredEntry {
                    id: id.to_string(),
                    rev,
                    seq,
                    doc: None,
                },
            );
        })
    }

    /// Drop every document and the backing file.
    ///
    /// The collection refuses all operations until [`Collection::recreate`].
    pub fn remove_collection(&self) -> TallyResult<()> {
        let mut state = self.lock_write()?;
        state.entries.clear();
        state.removed = true;
        remove_file_if_exists(&self.path)?;
        debug!(collection = D::COLLECTION, "collection removed");
        Ok(())
    }

    /// Bring a removed collection back, empty
    pub fn recreate(&self) -> TallyResult<()> {
        let mut state = self.lock_write()?;
        self.commit(&mut state, |state| {
            state.entries.clear();
            state.removed = false;
        })
    }

    pub fn is_removed(&self) -> bool {
        self.state.read().map(|s| s.removed).unwrap_or(true)
    }

    /// Highest sequence number handed out so far
    pub fn last_seq(&self) -> TallyResult<u64> {
        Ok(self.lock_read()?.last_seq)
    }

    /// Up to `limit` changes with a sequence number above `since`, oldest first
    pub fn changes_since(&self, since: u64, limit: usize) -> TallyResult<Vec<Change<D>>> {
        let state = self.live_read()?;
        let mut changes: Vec<Change<D>> = state
            .entries
            .values()
            .filter(|entry| entry.seq > since)
            .map(|entry| Change {
                id: entry.id.clone(),
                revision: entry.rev.clone(),
                seq: entry.seq,
                doc: entry.doc.clone(),
            })
            .collect();
        changes.sort_by_key(|change| change.seq);
        changes.truncate(limit);
        Ok(changes)
    }

    /// Apply a change that came from another replica.
    ///
    /// Skips validation entirely. The change wins only if its revision
    /// supersedes the local one; returns whether it was applied.
    pub fn apply_replicated(&self, change: Change<D>) -> TallyResult<bool> {
        let incoming = Revision::parse(&change.revision).ok_or_else(|| {
            TallyError::Storage(format!(
                "Invalid revision '{}' for {} '{}'",
                change.revision,
                D::ENTITY,
                change.id
            ))
        })?;

        let mut state = self.live_write()?;
        let current = state.entries.get(&change.id).and_then(|e| e.revision());
        if !incoming.supersedes(current.as_ref()) {
            return Ok(false);
        }

        let doc = change.doc.map(|mut doc| {
            doc.set_id(change.id.clone());
            doc.set_revision(Some(change.revision.clone()));
            doc
        });
        self.commit(&mut state, |state| {
            let seq = state.next_seq();
            state.entries.insert(
                change.id.clone(),
                StoredEntry {
                    id: change.id,
                    rev: change.revision,
                    seq,
                    doc,
                },
            );
        })?;
        Ok(true)
    }
}

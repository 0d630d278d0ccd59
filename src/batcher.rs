//! Coalesces rapid status changes into one outstanding batch request.
//!
//! One entry per item: later changes for the same id replace the target
//! status but keep the tree snapshot captured when the entry was first
//! recorded. Ids and target statuses are persisted; snapshots are not —
//! they are rebuilt from the cached tree on reload.

use log::{debug, warn};
use std::sync::{Arc, Mutex};

use crate::storage::{StateStore, KEY_PENDING_STATUSES};
use taskboard_api::client::StatusUpdate;
use taskboard_api::{BoardClient, Item, ItemId, Result, Status};

struct Entry {
    id: ItemId,
    status: Status,
    snapshot: Vec<Item>,
}

/// Pending status updates, flushed on reconnect, teardown or explicit
/// call.
#[derive(Clone)]
pub struct StatusBatcher {
    store: StateStore,
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl StatusBatcher {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Records a target status for `id`. An existing entry keeps its
    /// original snapshot and only the status is replaced; otherwise a new
    /// entry is created with `snapshot_if_new`.
    pub fn record(&self, id: ItemId, status: Status, snapshot_if_new: Vec<Item>) {
        {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.iter_mut().find(|entry| entry.id == id) {
                entry.status = status;
            } else {
                entries.push(Entry {
                    id,
                    status,
                    snapshot: snapshot_if_new,
                });
            }
        }
        self.persist();
    }

    /// Rebuilds entries persisted by a previous session. Every restored
    /// entry gets the supplied tree as its rollback snapshot.
    pub fn restore(&self, tree: &[Item]) {
        let persisted: Vec<StatusUpdate> = self.store.load(KEY_PENDING_STATUSES).unwrap_or_default();
        if persisted.is_empty() {
            return;
        }
        debug!("restoring {} persisted status updates", persisted.len());
        let mut entries = self.entries.lock().unwrap();
        *entries = persisted
            .into_iter()
            .map(|update| Entry {
                id: update.id,
                status: update.status,
                snapshot: tree.to_vec(),
            })
            .collect();
    }

    /// Current batch contents, oldest entry first.
    pub fn pending(&self) -> Vec<StatusUpdate> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|entry| StatusUpdate {
                id: entry.id,
                status: entry.status,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Snapshot captured when the oldest pending entry was first
    /// recorded, i.e. the tree as it was before any unflushed status
    /// change. Used only for the sign-out rollback.
    pub fn rollback_snapshot(&self) -> Option<Vec<Item>> {
        self.entries
            .lock()
            .unwrap()
            .first()
            .map(|entry| entry.snapshot.clone())
    }

    /// Sends all pending entries as one batch. Success clears the batch;
    /// on failure every entry stays pending for a later attempt. The
    /// caller decides whether a failure warrants rollback (authentication
    /// failures do, ordinary ones do not).
    pub async fn flush(&self, client: &BoardClient) -> Result<()> {
        let updates = self.pending();
        if updates.is_empty() {
            return Ok(());
        }
        debug!("flushing {} batched status updates", updates.len());
        client.set_statuses(&updates).await?;
        self.clear();
        Ok(())
    }

    /// Fires the batch without waiting for the response. Entries sent
    /// in the batch are cleared once the server accepts it; on failure
    /// they stay pending so the next session retries.
    pub fn flush_detached(&self, client: &BoardClient) {
        let updates = self.pending();
        if updates.is_empty() {
            return;
        }
        let client = client.clone();
        let batcher = self.clone();
        tokio::spawn(async move {
            match client.set_statuses(&updates).await {
                Ok(()) => batcher.clear_sent(&updates),
                Err(err) => warn!("detached status flush failed: {err}"),
            }
        });
    }

    /// Removes exactly the entries that went out in a detached batch. An
    /// entry re-recorded with a different status since the send is newer
    /// work and stays.
    fn clear_sent(&self, sent: &[StatusUpdate]) {
        {
            let mut entries = self.entries.lock().unwrap();
            entries.retain(|entry| {
                !sent
                    .iter()
                    .any(|update| update.id == entry.id && update.status == entry.status)
            });
        }
        self.persist();
    }

    /// Drops every pending entry, in memory and on disk.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
        self.persist();
    }

    fn persist(&self) {
        let updates = self.pending();
        if let Err(err) = self.store.save(KEY_PENDING_STATUSES, &updates) {
            warn!("failed to persist pending status updates: {err}");
        }
    }
}

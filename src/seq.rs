//! Per-item request sequence numbers.
//!
//! In-flight requests are never cancelled, so a superseded request's
//! response can arrive after its successor's. Each mutation takes a
//! sequence number at issue time; a response is only applied when its
//! number is newer than the last one applied for that item.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use taskboard_api::ItemId;

#[derive(Default)]
struct SeqState {
    issued: u64,
    admitted: u64,
}

/// Monotonic per-item sequence counter with a stale-response filter.
#[derive(Clone, Default)]
pub struct SequenceGate {
    inner: Arc<Mutex<HashMap<ItemId, SeqState>>>,
}

impl SequenceGate {
    /// Reserves the next sequence number for a request touching `id`.
    pub fn begin(&self, id: ItemId) -> u64 {
        let mut map = self.inner.lock().unwrap();
        let state = map.entry(id).or_default();
        state.issued += 1;
        state.issued
    }

    /// Admits the response carrying `seq` unless a newer response for the
    /// same item has already been applied.
    pub fn admit(&self, id: ItemId, seq: u64) -> bool {
        let mut map = self.inner.lock().unwrap();
        let state = map.entry(id).or_default();
        if seq > state.admitted {
            state.admitted = seq;
            true
        } else {
            false
        }
    }

    /// Forgets an item, e.g. after its optimistic entry is discarded.
    pub fn forget(&self, id: ItemId) {
        self.inner.lock().unwrap().remove(&id);
    }
}

//! Durable queue of mutations attempted while offline.
//!
//! Append-only between drains; replay is strictly FIFO. When a replay
//! fails partway, the failed operation and everything after it go back
//! verbatim via [`OpQueue::requeue`] so the next reconnect resumes from
//! the failure point.

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::io;

use crate::storage::{StateStore, KEY_PENDING_OPS};
use taskboard_api::{ItemId, Status};

/// One recorded mutation. `Create` carries everything needed to replay
/// the creation plus the client temp id so the optimistic placeholder
/// can be swapped for the confirmed item afterwards.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PendingOp {
    #[serde(rename_all = "camelCase")]
    Create {
        temp_id: i64,
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        start_date: Option<NaiveDate>,
        #[serde(default)]
        end_date: Option<NaiveDate>,
        #[serde(default)]
        parent_id: Option<ItemId>,
    },
    #[serde(rename_all = "camelCase")]
    SetStatus { id: ItemId, status: Status },
}

/// Durably persisted pending-operation list.
#[derive(Clone, Debug)]
pub struct OpQueue {
    store: StateStore,
}

impl OpQueue {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    fn load(&self) -> Vec<PendingOp> {
        self.store.load(KEY_PENDING_OPS).unwrap_or_default()
    }

    /// Appends one operation and persists the list.
    pub fn enqueue(&self, op: PendingOp) -> Result<(), io::Error> {
        let mut ops = self.load();
        ops.push(op);
        debug!("queueing offline operation, {} now pending", ops.len());
        self.store.save(KEY_PENDING_OPS, &ops)
    }

    /// Returns every pending operation in enqueue order and atomically
    /// persists an empty list. The caller owns re-queuing anything it
    /// fails to apply.
    pub fn drain_all(&self) -> Result<Vec<PendingOp>, io::Error> {
        let ops = self.load();
        self.store.save(KEY_PENDING_OPS, &Vec::<PendingOp>::new())?;
        Ok(ops)
    }

    /// Overwrites persisted state with `ops`, preserving their order.
    pub fn requeue(&self, ops: Vec<PendingOp>) -> Result<(), io::Error> {
        debug!("requeueing {} operations after replay failure", ops.len());
        self.store.save(KEY_PENDING_OPS, &ops)
    }

    /// Non-destructive view of the queued operations, oldest first.
    pub fn pending(&self) -> Vec<PendingOp> {
        self.load()
    }

    /// Non-destructive check for queued work.
    pub fn has_pending(&self) -> bool {
        !self.load().is_empty()
    }
}

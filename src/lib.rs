//! Offline-tolerant synchronization layer for the Taskboard kanban client.
//!
//! All durable state lives server-side. This crate keeps an in-memory
//! item tree responsive by mutating it optimistically, records mutations
//! that could not reach the server, and replays them on reconnect. The
//! tree itself is only touched through the pure operations in [`tree`],
//! which is what keeps concurrent in-flight requests from corrupting
//! structure without any locking beyond a snapshot mutex.

pub mod batcher;
pub mod board;
pub mod board_store;
pub mod live;
pub mod queue;
pub mod seq;
pub mod session;
pub mod storage;
pub mod tree;

pub use batcher::StatusBatcher;
pub use board::{classify, ActionOutcome, BoardController, FailureKind, LoadOutcome};
pub use board_store::BoardStore;
pub use live::LiveConsumer;
pub use queue::{OpQueue, PendingOp};
pub use seq::SequenceGate;
pub use session::SessionManager;
pub use storage::{BoardSnapshot, StateStore};

pub use taskboard_api as api;

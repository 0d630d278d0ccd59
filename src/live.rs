//! Long-lived push-update subscription.
//!
//! Connection lifecycle: `Disconnected -> Connecting -> Connected`, back
//! to `Disconnected` on any error, then a fixed retry delay before the
//! next attempt — no exponential growth. The loop runs until the handle
//! is stopped (sign-out or teardown).

use futures_util::StreamExt;
use log::{debug, warn};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::board_store::BoardStore;
use crate::tree::{remove_by_id, upsert_by_id};
use taskboard_api::{ApiConfig, Item, PushKind, PushMessage};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Handle to the background consumer task.
pub struct LiveConsumer {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl LiveConsumer {
    /// Spawns the consumer against the config's subscription URL. Inbound
    /// changes for `user_id` are merged into `board`; everything else is
    /// dropped.
    pub fn spawn(config: ApiConfig, user_id: i64, board: BoardStore) -> Self {
        Self::spawn_with_retry_delay(config, user_id, board, DEFAULT_RETRY_DELAY)
    }

    pub fn spawn_with_retry_delay(
        config: ApiConfig,
        user_id: i64,
        board: BoardStore,
        retry_delay: Duration,
    ) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(run_consumer(config, user_id, board, retry_delay, rx));
        Self { shutdown, handle }
    }

    /// Tears the connection down and waits for the task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

async fn run_consumer(
    config: ApiConfig,
    user_id: i64,
    board: BoardStore,
    retry_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let url = config.ws_url();
    loop {
        if *shutdown.borrow() {
            return;
        }
        transition(ConnectionState::Disconnected, ConnectionState::Connecting);
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                transition(ConnectionState::Connecting, ConnectionState::Connected);
                let (_write, mut read) = stream.split();
                loop {
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                return;
                            }
                        }
                        frame = read.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                handle_frame(text.as_str(), user_id, &board);
                            }
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                warn!("push connection error: {err}");
                                break;
                            }
                            None => {
                                debug!("push connection closed by server");
                                break;
                            }
                        }
                    }
                }
                transition(ConnectionState::Connected, ConnectionState::Disconnected);
            }
            Err(err) => {
                warn!("push connection failed: {err}");
                transition(ConnectionState::Connecting, ConnectionState::Disconnected);
            }
        }

        tokio::select! {
            _ = sleep(retry_delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

fn transition(from: ConnectionState, to: ConnectionState) {
    debug!("live consumer: {from:?} -> {to:?}");
}

fn handle_frame(raw: &str, user_id: i64, board: &BoardStore) {
    if let Some(message) = parse_push_message(raw) {
        board.update(|tree| apply_push(tree, &message, user_id));
    }
}

/// Parses one inbound frame. Malformed payloads are logged and dropped,
/// never surfaced to the user.
pub fn parse_push_message(raw: &str) -> Option<PushMessage> {
    match serde_json::from_str::<PushMessage>(raw) {
        Ok(message) => Some(message),
        Err(err) => {
            debug!("discarding malformed push payload: {err}");
            None
        }
    }
}

/// Merges a push message into the tree. Messages addressed to another
/// user leave the tree untouched.
pub fn apply_push(tree: &[Item], message: &PushMessage, user_id: i64) -> Vec<Item> {
    if message.user_id != user_id {
        return tree.to_vec();
    }
    match message.kind {
        PushKind::Create | PushKind::Update | PushKind::StatusChange => {
            let mut next = tree.to_vec();
            for item in &message.items {
                if crate::tree::find_item(&next, item.id).is_some() {
                    next = upsert_by_id(&next, item);
                } else if item.parent_id.is_none() {
                    // freshly created roots are appended; children belong
                    // under a parent we already hold
                    next.push(item.clone());
                } else if let Some(parent_id) = item.parent_id {
                    next = crate::tree::insert_child(&next, parent_id, item.clone());
                }
            }
            next
        }
        PushKind::Delete => {
            let mut next = tree.to_vec();
            for id in &message.removed_ids {
                next = remove_by_id(&next, *id);
            }
            next
        }
    }
}

//! Board controller: owns the authoritative in-memory tree and routes
//! every user action through optimistic mutation, the network, and the
//! matching recovery path.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use crate::batcher::StatusBatcher;
use crate::board_store::BoardStore;
use crate::live::LiveConsumer;
use crate::queue::{OpQueue, PendingOp};
use crate::seq::SequenceGate;
use crate::session::SessionManager;
use crate::storage::StateStore;
use crate::tree;
use taskboard_api::client::{FieldPatch, ImageUpload, ItemDraft};
use taskboard_api::{ApiError, BoardClient, Item, ItemId, Status};

/// Recovery class of a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Server unreachable. Queue the mutation and sync later.
    Offline,
    /// Server reachable and said no. Roll back and tell the user.
    Rejected(String),
    /// Session invalid. Sign out, no retry.
    Unauthenticated,
}

pub fn classify(err: &ApiError) -> FailureKind {
    if err.is_unauthenticated() {
        FailureKind::Unauthenticated
    } else if err.is_offline() {
        FailureKind::Offline
    } else {
        FailureKind::Rejected(err.user_message())
    }
}

/// What became of one user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Server confirmed; local state matches it.
    Applied,
    /// Optimistically applied and batched; the request goes out on the
    /// next flush trigger.
    Batched,
    /// Optimistically applied and durably queued for replay.
    QueuedOffline,
    /// Rejected; the optimistic change was rolled back.
    Reverted(String),
    /// Failed without touching local state.
    Failed(String),
    /// Session terminated.
    SignedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fresh server data.
    Fresh,
    /// Offline; showing the cached tree.
    CachedOffline,
}

pub struct BoardController {
    client: BoardClient,
    session: SessionManager,
    board: BoardStore,
    storage: StateStore,
    queue: OpQueue,
    batcher: StatusBatcher,
    gate: SequenceGate,
    offline: AtomicBool,
    next_temp_id: AtomicI64,
    live: Mutex<Option<LiveConsumer>>,
}

impl BoardController {
    pub fn new(client: BoardClient, session: SessionManager, storage: StateStore) -> Self {
        Self {
            client,
            session,
            board: BoardStore::default(),
            queue: OpQueue::new(storage.clone()),
            batcher: StatusBatcher::new(storage.clone()),
            storage,
            gate: SequenceGate::default(),
            offline: AtomicBool::new(false),
            next_temp_id: AtomicI64::new(1),
            live: Mutex::new(None),
        }
    }

    pub fn board(&self) -> &BoardStore {
        &self.board
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Initial load: fetch everything, overlay still-pending offline
    /// mutations, and rebuild persisted batch entries. When the server is
    /// unreachable the cached tree stands in and the view goes offline.
    pub async fn load_board(&self) -> Result<LoadOutcome, String> {
        match self.client.fetch_items().await {
            Ok(items) => {
                let tree = self.overlay_pending(items);
                self.batcher.restore(&tree);
                self.board.replace(tree);
                self.offline.store(false, Ordering::SeqCst);
                self.cache_tree();
                Ok(LoadOutcome::Fresh)
            }
            Err(err) => match classify(&err) {
                FailureKind::Offline => {
                    self.offline.store(true, Ordering::SeqCst);
                    let snapshot = self
                        .storage
                        .load_snapshot()
                        .ok_or_else(|| err.user_message())?;
                    info!("offline: showing cached board from {}", snapshot.saved_at);
                    let tree = self.overlay_pending(snapshot.items);
                    self.batcher.restore(&tree);
                    self.board.replace(tree);
                    Ok(LoadOutcome::CachedOffline)
                }
                FailureKind::Unauthenticated => {
                    self.sign_out().await;
                    Err(err.user_message())
                }
                FailureKind::Rejected(message) => Err(message),
            },
        }
    }

    /// Creates an item: optimistic placeholder first, then replaced by
    /// the confirmed entry, queued when offline, discarded on rejection.
    pub async fn create_item(&self, draft: ItemDraft) -> ActionOutcome {
        let temp_id = self.next_temp_id.fetch_add(1, Ordering::SeqCst);
        let pending_id = ItemId::Pending(temp_id);
        let placeholder = placeholder_from_draft(temp_id, &draft);
        self.place(placeholder, draft.parent_id);

        if self.is_offline() {
            return self.queue_create(temp_id, &draft);
        }

        let seq = self.gate.begin(pending_id);
        match self.client.create_item(&draft).await {
            Ok(confirmed) => {
                if self.gate.admit(pending_id, seq) {
                    self.swap_placeholder(pending_id, confirmed);
                    self.cache_tree();
                }
                ActionOutcome::Applied
            }
            Err(err) => match classify(&err) {
                FailureKind::Offline => {
                    self.offline.store(true, Ordering::SeqCst);
                    self.queue_create(temp_id, &draft)
                }
                FailureKind::Unauthenticated => {
                    self.sign_out().await;
                    ActionOutcome::SignedOut
                }
                FailureKind::Rejected(message) => {
                    self.gate.forget(pending_id);
                    self.board.update(|tree| tree::remove_by_id(tree, pending_id));
                    ActionOutcome::Reverted(message)
                }
            },
        }
    }

    /// Changes an item's status: optimistic apply (with the DONE
    /// cascade), then batched when online or queued when offline.
    pub fn set_status(&self, id: ItemId, status: Status) -> ActionOutcome {
        let snapshot = self.board.snapshot();
        self.board.update(|tree| tree::apply_status(tree, id, status));

        if self.is_offline() {
            if let Err(err) = self.queue.enqueue(PendingOp::SetStatus { id, status }) {
                warn!("failed to queue offline status change: {err}");
                return ActionOutcome::Failed(err.to_string());
            }
            self.cache_tree();
            ActionOutcome::QueuedOffline
        } else {
            self.batcher.record(id, status, snapshot);
            ActionOutcome::Batched
        }
    }

    /// Sends the batched status updates. Entries stay pending on
    /// ordinary failure; an authentication failure rolls the tree back
    /// to the pre-batch snapshot and terminates the session.
    pub async fn flush_statuses(&self) -> ActionOutcome {
        match self.batcher.flush(&self.client).await {
            Ok(()) => {
                self.cache_tree();
                ActionOutcome::Applied
            }
            Err(err) => match classify(&err) {
                FailureKind::Offline => {
                    self.offline.store(true, Ordering::SeqCst);
                    ActionOutcome::QueuedOffline
                }
                FailureKind::Unauthenticated => {
                    if let Some(snapshot) = self.batcher.rollback_snapshot() {
                        self.board.replace(snapshot);
                    }
                    self.sign_out().await;
                    ActionOutcome::SignedOut
                }
                FailureKind::Rejected(message) => ActionOutcome::Failed(message),
            },
        }
    }

    /// Deletes an item (children go with it). Deletions are not
    /// replayable operations, so every failure restores the snapshot
    /// taken just before the optimistic removal.
    pub async fn delete_item(&self, id: ItemId) -> ActionOutcome {
        let snapshot = self.board.snapshot();
        self.board.update(|tree| tree::remove_by_id(tree, id));

        match self.client.delete_item(id).await {
            Ok(()) => {
                self.cache_tree();
                ActionOutcome::Applied
            }
            Err(err) => match classify(&err) {
                FailureKind::Unauthenticated => {
                    self.sign_out().await;
                    ActionOutcome::SignedOut
                }
                FailureKind::Offline => {
                    self.offline.store(true, Ordering::SeqCst);
                    self.board.replace(snapshot);
                    ActionOutcome::Reverted(err.user_message())
                }
                FailureKind::Rejected(message) => {
                    self.board.replace(snapshot);
                    ActionOutcome::Reverted(message)
                }
            },
        }
    }

    /// Edits descriptive fields or the planned timeline bounds:
    /// optimistic merge, restore-on-failure, confirmation sequence-gated
    /// against out-of-order responses.
    pub async fn update_fields(&self, id: ItemId, patch: FieldPatch) -> ActionOutcome {
        let snapshot = self.board.snapshot();
        self.board.update(|tree| tree::apply_fields(tree, id, &patch));

        let seq = self.gate.begin(id);
        match self.client.update_item(id, &patch).await {
            Ok(confirmed) => {
                if self.gate.admit(id, seq) {
                    self.board.update(|tree| tree::upsert_by_id(tree, &confirmed));
                    self.cache_tree();
                }
                ActionOutcome::Applied
            }
            Err(err) => match classify(&err) {
                FailureKind::Unauthenticated => {
                    self.sign_out().await;
                    ActionOutcome::SignedOut
                }
                FailureKind::Offline => {
                    self.offline.store(true, Ordering::SeqCst);
                    self.board.replace(snapshot);
                    ActionOutcome::Reverted(err.user_message())
                }
                FailureKind::Rejected(message) => {
                    self.board.replace(snapshot);
                    ActionOutcome::Reverted(message)
                }
            },
        }
    }

    /// Replaces or clears an item's image. No optimistic change to make
    /// locally; the confirmed item carries the new url.
    pub async fn update_image(&self, id: ItemId, upload: Option<ImageUpload>) -> ActionOutcome {
        let seq = self.gate.begin(id);
        match self.client.update_item_image(id, upload.as_ref()).await {
            Ok(confirmed) => {
                if self.gate.admit(id, seq) {
                    self.board.update(|tree| tree::upsert_by_id(tree, &confirmed));
                    self.cache_tree();
                }
                ActionOutcome::Applied
            }
            Err(err) => match classify(&err) {
                FailureKind::Unauthenticated => {
                    self.sign_out().await;
                    ActionOutcome::SignedOut
                }
                FailureKind::Offline => {
                    self.offline.store(true, Ordering::SeqCst);
                    ActionOutcome::Failed(err.user_message())
                }
                FailureKind::Rejected(message) => ActionOutcome::Failed(message),
            },
        }
    }

    /// Back online: replay the queued operations strictly in enqueue
    /// order, then flush the status batch. Ids confirmed by replayed
    /// creates are substituted into later operations that still carry
    /// the temp id. The first replay failure puts that operation and
    /// everything after it back, with any substitutions kept.
    pub async fn reconnect(&self) -> ActionOutcome {
        self.offline.store(false, Ordering::SeqCst);
        let ops = match self.queue.drain_all() {
            Ok(ops) => ops,
            Err(err) => {
                warn!("failed to drain pending operations: {err}");
                return ActionOutcome::Failed(err.to_string());
            }
        };
        debug!("replaying {} pending operations", ops.len());

        let mut confirmed_ids: HashMap<i64, ItemId> = HashMap::new();
        for (index, op) in ops.iter().enumerate() {
            let op = resolve_queued_id(op, &confirmed_ids);
            if let Err(err) = self.replay_op(&op, &mut confirmed_ids).await {
                let remaining: Vec<PendingOp> = std::iter::once(op)
                    .chain(
                        ops[index + 1..]
                            .iter()
                            .map(|later| resolve_queued_id(later, &confirmed_ids)),
                    )
                    .collect();
                if let Err(requeue_err) = self.queue.requeue(remaining) {
                    warn!("failed to requeue pending operations: {requeue_err}");
                }
                return match classify(&err) {
                    FailureKind::Offline => {
                        self.offline.store(true, Ordering::SeqCst);
                        ActionOutcome::QueuedOffline
                    }
                    FailureKind::Unauthenticated => {
                        self.sign_out().await;
                        ActionOutcome::SignedOut
                    }
                    FailureKind::Rejected(message) => ActionOutcome::Failed(message),
                };
            }
        }

        self.flush_statuses().await
    }

    /// Best-effort page/tab teardown: fire the status batch without
    /// waiting and cache the tree.
    pub async fn teardown(&self) {
        self.batcher.flush_detached(&self.client);
        self.cache_tree();
        self.stop_live().await;
    }

    /// Terminates the session locally: token discarded, pending status
    /// batch cleared, push subscription closed. Queued offline creates
    /// survive for the next signed-in session.
    pub async fn sign_out(&self) {
        info!("signing out: clearing session and pending status updates");
        if let Err(err) = self.session.clear() {
            warn!("failed to clear stored session: {err}");
        }
        self.batcher.clear();
        self.stop_live().await;
    }

    /// Starts the push-update subscription for the signed-in user.
    pub fn start_live(&self) {
        let Some(user_id) = self.session.user_id() else {
            warn!("cannot start live updates without a session");
            return;
        };
        let mut guard = self.live.lock().unwrap();
        if guard.is_some() {
            debug!("live consumer already running");
            return;
        }
        *guard = Some(LiveConsumer::spawn(
            self.client.config().clone(),
            user_id,
            self.board.clone(),
        ));
    }

    pub async fn stop_live(&self) {
        let consumer = self.live.lock().unwrap().take();
        if let Some(consumer) = consumer {
            consumer.stop().await;
        }
    }

    fn queue_create(&self, temp_id: i64, draft: &ItemDraft) -> ActionOutcome {
        let op = PendingOp::Create {
            temp_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            start_date: draft.start_date,
            end_date: draft.end_date,
            parent_id: draft.parent_id,
        };
        if let Err(err) = self.queue.enqueue(op) {
            warn!("failed to queue offline create: {err}");
            // nothing will ever replay it, so the placeholder comes out
            self.board
                .update(|tree| tree::remove_by_id(tree, ItemId::Pending(temp_id)));
            return ActionOutcome::Failed(err.to_string());
        }
        self.cache_tree();
        ActionOutcome::QueuedOffline
    }

    /// Places a new node: under its parent when it has one, as a new
    /// root otherwise.
    fn place(&self, item: Item, parent_id: Option<ItemId>) {
        self.board.update(|tree| match parent_id {
            Some(parent_id) => tree::insert_child(tree, parent_id, item.clone()),
            None => {
                let mut next = tree.to_vec();
                next.push(item.clone());
                next
            }
        });
    }

    /// Replaces an optimistic placeholder wholesale with its confirmed
    /// counterpart.
    fn swap_placeholder(&self, pending_id: ItemId, confirmed: Item) {
        let parent_id = confirmed.parent_id;
        self.board.update(|tree| {
            let without = tree::remove_by_id(tree, pending_id);
            match parent_id {
                Some(parent_id) => tree::insert_child(&without, parent_id, confirmed.clone()),
                None => {
                    let mut next = without;
                    next.push(confirmed.clone());
                    next
                }
            }
        });
        self.gate.forget(pending_id);
    }

    async fn replay_op(
        &self,
        op: &PendingOp,
        confirmed_ids: &mut HashMap<i64, ItemId>,
    ) -> Result<(), ApiError> {
        match op {
            PendingOp::Create {
                temp_id,
                title,
                description,
                start_date,
                end_date,
                parent_id,
            } => {
                let draft = ItemDraft {
                    title: title.clone(),
                    description: description.clone(),
                    start_date: *start_date,
                    end_date: *end_date,
                    parent_id: *parent_id,
                    image: None,
                };
                let confirmed = self.client.create_item(&draft).await?;
                confirmed_ids.insert(*temp_id, confirmed.id);
                self.swap_placeholder(ItemId::Pending(*temp_id), confirmed);
                Ok(())
            }
            PendingOp::SetStatus { id, status } => {
                let confirmed = self.client.set_status(*id, *status).await?;
                self.board.update(|tree| tree::upsert_by_id(tree, &confirmed));
                Ok(())
            }
        }
    }

    /// Re-applies queued offline mutations on top of a freshly loaded
    /// tree so pending work stays visible across reloads.
    fn overlay_pending(&self, items: Vec<Item>) -> Vec<Item> {
        let mut tree = items;
        for op in self.queue.pending() {
            match op {
                PendingOp::Create {
                    temp_id,
                    title,
                    description,
                    start_date,
                    end_date,
                    parent_id,
                } => {
                    let pending_id = ItemId::Pending(temp_id);
                    if tree::find_item(&tree, pending_id).is_some() {
                        continue;
                    }
                    // keep the local counter ahead of restored temp ids
                    self.next_temp_id.fetch_max(temp_id + 1, Ordering::SeqCst);
                    let mut placeholder = Item::placeholder(temp_id, title);
                    placeholder.description = description;
                    placeholder.start_date = start_date;
                    placeholder.end_date = end_date;
                    placeholder.parent_id = parent_id;
                    tree = match parent_id {
                        Some(parent_id) => tree::insert_child(&tree, parent_id, placeholder),
                        None => {
                            tree.push(placeholder);
                            tree
                        }
                    };
                }
                PendingOp::SetStatus { id, status } => {
                    tree = tree::apply_status(&tree, id, status);
                }
            }
        }
        tree
    }

    fn cache_tree(&self) {
        if let Err(err) = self.storage.save_snapshot(&self.board.snapshot()) {
            warn!("failed to cache board snapshot: {err}");
        }
    }
}

/// Substitutes ids confirmed by already-replayed creates into an
/// operation that still references them through a temp id.
fn resolve_queued_id(op: &PendingOp, confirmed_ids: &HashMap<i64, ItemId>) -> PendingOp {
    let resolved = |id: ItemId| match id {
        ItemId::Pending(temp) => confirmed_ids.get(&temp).copied().unwrap_or(id),
        ItemId::Confirmed(_) => id,
    };
    match op.clone() {
        PendingOp::SetStatus { id, status } => PendingOp::SetStatus {
            id: resolved(id),
            status,
        },
        PendingOp::Create {
            temp_id,
            title,
            description,
            start_date,
            end_date,
            parent_id,
        } => PendingOp::Create {
            temp_id,
            title,
            description,
            start_date,
            end_date,
            parent_id: parent_id.map(resolved),
        },
    }
}

fn placeholder_from_draft(temp_id: i64, draft: &ItemDraft) -> Item {
    let mut item = Item::placeholder(temp_id, draft.title.clone());
    item.description = draft.description.clone();
    item.start_date = draft.start_date;
    item.end_date = draft.end_date;
    item.parent_id = draft.parent_id;
    item
}

#[cfg(test)]
mod tests {
    use super::{ActionOutcome, BoardController, LoadOutcome};
    use crate::session::SessionManager;
    use crate::storage::{temp_store, StateStore};
    use std::time::Duration;
    use taskboard_api::client::{FieldPatch, ItemDraft};
    use taskboard_api::{ApiConfig, AuthSession, BoardClient, Item, ItemId, Status, UserProfile};

    fn signed_in_session() -> SessionManager {
        let session = SessionManager::in_memory();
        session
            .save(&AuthSession {
                token: "tok".to_string(),
                user: UserProfile {
                    id: 7,
                    username: "sam".to_string(),
                    email: None,
                    avatar_url: None,
                },
            })
            .unwrap();
        session
    }

    fn controller_for(base_url: &str, storage: StateStore) -> BoardController {
        let _ = env_logger::builder().is_test(true).try_init();
        let config = ApiConfig::new(base_url, "tok")
            .with_connect_timeout(Duration::from_millis(300))
            .with_timeout(Duration::from_millis(800));
        let client = BoardClient::new(config).unwrap();
        BoardController::new(client, signed_in_session(), storage)
    }

    // Nothing listens here; requests fail at connect time.
    const DEAD_URL: &str = "http://127.0.0.1:9";

    #[tokio::test]
    async fn create_replaces_placeholder_with_confirmed_item() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/todos")
            .with_status(200)
            .with_body(r#"{"success":true,"data":{"id":10,"title":"Buy milk","status":"TODO"}}"#)
            .create_async()
            .await;

        let controller = controller_for(&server.url(), temp_store("board-create"));
        let outcome = controller.create_item(ItemDraft::new("Buy milk")).await;

        assert_eq!(outcome, ActionOutcome::Applied);
        let tree = controller.board().snapshot();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, ItemId::Confirmed(10));
        assert!(tree.iter().all(|item| item.id.is_confirmed()));
    }

    #[tokio::test]
    async fn rejected_create_discards_the_placeholder() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/todos")
            .with_status(200)
            .with_body(r#"{"success":false,"message":"title must not be empty"}"#)
            .create_async()
            .await;

        let controller = controller_for(&server.url(), temp_store("board-create-reject"));
        let outcome = controller.create_item(ItemDraft::new("")).await;

        assert_eq!(
            outcome,
            ActionOutcome::Reverted("title must not be empty".to_string())
        );
        assert!(controller.board().snapshot().is_empty());
    }

    #[tokio::test]
    async fn create_that_cannot_be_queued_rolls_back_the_placeholder() {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        // a plain file where the state directory should be makes every
        // persist fail, including the enqueue
        let bogus_dir = std::env::temp_dir().join(format!("taskboard-tests-noqueue-{nanos}"));
        std::fs::write(&bogus_dir, b"not a directory").unwrap();

        let controller = controller_for(DEAD_URL, StateStore::with_dir(bogus_dir));
        let outcome = controller.create_item(ItemDraft::new("Buy milk")).await;

        assert!(matches!(outcome, ActionOutcome::Failed(_)));
        // no queued op backs it, so the optimistic entry must not linger
        assert!(controller.board().snapshot().is_empty());
    }

    #[tokio::test]
    async fn offline_create_queues_and_reconnect_replays() {
        let storage = temp_store("board-offline-create");

        // no network: the create is queued and an optimistic entry shows
        let offline = controller_for(DEAD_URL, storage.clone());
        let outcome = offline.create_item(ItemDraft::new("Buy milk")).await;
        assert_eq!(outcome, ActionOutcome::QueuedOffline);
        assert!(offline.is_offline());

        let tree = offline.board().snapshot();
        assert_eq!(tree.len(), 1);
        assert!(tree[0].id.is_pending());
        assert_eq!(tree[0].status, Status::Todo);

        // a later session over the same storage comes back online
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/todos")
            .with_status(200)
            .with_body(r#"{"success":true,"data":[]}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/api/todos")
            .with_status(200)
            .with_body(r#"{"success":true,"data":{"id":10,"title":"Buy milk","status":"TODO"}}"#)
            .create_async()
            .await;
        server
            .mock("PATCH", "/api/todos/status/batch")
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let online = controller_for(&server.url(), storage);
        assert_eq!(online.load_board().await.unwrap(), LoadOutcome::Fresh);
        // the queued create is still visible as a pending entry
        assert!(online.board().snapshot()[0].id.is_pending());

        assert_eq!(online.reconnect().await, ActionOutcome::Applied);
        let tree = online.board().snapshot();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, ItemId::Confirmed(10));
        assert!(!online.board().snapshot()[0].id.is_pending());
    }

    #[tokio::test]
    async fn queued_status_for_an_offline_create_replays_with_the_confirmed_id() {
        let storage = temp_store("board-offline-status-chain");

        // offline: create, then change the new entry's status. Both land
        // in the queue and the status op still targets the temp id.
        let offline = controller_for(DEAD_URL, storage.clone());
        assert_eq!(
            offline.create_item(ItemDraft::new("Buy milk")).await,
            ActionOutcome::QueuedOffline
        );
        let pending_id = offline.board().snapshot()[0].id;
        assert!(pending_id.is_pending());
        assert_eq!(
            offline.set_status(pending_id, Status::Done),
            ActionOutcome::QueuedOffline
        );

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/todos")
            .with_status(200)
            .with_body(r#"{"success":true,"data":[]}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/api/todos")
            .with_status(200)
            .with_body(r#"{"success":true,"data":{"id":42,"title":"Buy milk","status":"TODO"}}"#)
            .expect(1)
            .create_async()
            .await;
        // the status replay must carry the id the create came back with,
        // never the negative temp id
        let status = server
            .mock("PATCH", "/api/todos/42/status")
            .with_status(200)
            .with_body(r#"{"success":true,"data":{"id":42,"title":"Buy milk","status":"DONE"}}"#)
            .expect(1)
            .create_async()
            .await;

        let online = controller_for(&server.url(), storage);
        online.load_board().await.unwrap();
        assert_eq!(online.reconnect().await, ActionOutcome::Applied);
        create.assert_async().await;
        status.assert_async().await;

        let tree = online.board().snapshot();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, ItemId::Confirmed(42));
        assert_eq!(tree[0].status, Status::Done);

        // nothing was left behind to re-fail on the next reconnect
        assert_eq!(online.reconnect().await, ActionOutcome::Applied);
    }

    #[tokio::test]
    async fn offline_load_falls_back_to_cached_snapshot() {
        let storage = temp_store("board-offline-load");
        let mut cached = Item::placeholder(1, "cached item");
        cached.id = ItemId::Confirmed(7);
        storage.save_snapshot(&[cached]).unwrap();

        let controller = controller_for(DEAD_URL, storage);
        let outcome = controller.load_board().await.unwrap();
        assert_eq!(outcome, LoadOutcome::CachedOffline);
        assert!(controller.is_offline());
        assert!(controller.board().find(ItemId::Confirmed(7)).is_some());

        // offline status change goes to the durable queue
        let outcome = controller.set_status(ItemId::Confirmed(7), Status::Done);
        assert_eq!(outcome, ActionOutcome::QueuedOffline);
        assert_eq!(
            controller.board().find(ItemId::Confirmed(7)).unwrap().status,
            Status::Done
        );
    }

    #[tokio::test]
    async fn status_changes_cascade_and_flush_as_one_batch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/todos")
            .with_status(200)
            .with_body(
                r#"{"success":true,"data":[
                    {"id":5,"title":"parent","status":"IN_PROGRESS","children":[
                        {"id":6,"title":"child","status":"TODO","parentId":5}
                    ]}
                ]}"#,
            )
            .create_async()
            .await;
        let batch = server
            .mock("PATCH", "/api/todos/status/batch")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "updates": [{"id": 5, "status": "DONE"}]
            })))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .expect(1)
            .create_async()
            .await;

        let controller = controller_for(&server.url(), temp_store("board-batch"));
        controller.load_board().await.unwrap();

        // two rapid changes coalesce into one update carrying the latest
        assert_eq!(
            controller.set_status(ItemId::Confirmed(5), Status::Todo),
            ActionOutcome::Batched
        );
        assert_eq!(
            controller.set_status(ItemId::Confirmed(5), Status::Done),
            ActionOutcome::Batched
        );

        // optimistic cascade: the child went DONE with its parent
        let parent = controller.board().find(ItemId::Confirmed(5)).unwrap();
        assert_eq!(parent.status, Status::Done);
        assert_eq!(
            controller.board().find(ItemId::Confirmed(6)).unwrap().status,
            Status::Done
        );

        assert_eq!(controller.flush_statuses().await, ActionOutcome::Applied);
        batch.assert_async().await;
    }

    #[tokio::test]
    async fn unauthenticated_flush_rolls_back_and_signs_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/todos")
            .with_status(200)
            .with_body(r#"{"success":true,"data":[{"id":5,"title":"parent","status":"TODO"}]}"#)
            .create_async()
            .await;
        server
            .mock("PATCH", "/api/todos/status/batch")
            .with_status(401)
            .with_body("token expired")
            .create_async()
            .await;

        let controller = controller_for(&server.url(), temp_store("board-auth"));
        controller.load_board().await.unwrap();
        controller.set_status(ItemId::Confirmed(5), Status::Done);

        assert_eq!(controller.flush_statuses().await, ActionOutcome::SignedOut);
        // tree rolled back to the snapshot captured at first record
        assert_eq!(
            controller.board().find(ItemId::Confirmed(5)).unwrap().status,
            Status::Todo
        );
    }

    #[tokio::test]
    async fn rejected_delete_restores_the_snapshot() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/todos")
            .with_status(200)
            .with_body(r#"{"success":true,"data":[{"id":7,"title":"keep me","status":"TODO"}]}"#)
            .create_async()
            .await;
        server
            .mock("DELETE", "/api/todos/7")
            .with_status(200)
            .with_body(r#"{"success":false,"message":"cannot delete"}"#)
            .create_async()
            .await;

        let controller = controller_for(&server.url(), temp_store("board-delete"));
        controller.load_board().await.unwrap();

        let outcome = controller.delete_item(ItemId::Confirmed(7)).await;
        assert_eq!(outcome, ActionOutcome::Reverted("cannot delete".to_string()));
        assert!(controller.board().find(ItemId::Confirmed(7)).is_some());
    }

    #[tokio::test]
    async fn rejected_field_edit_restores_the_snapshot() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/todos")
            .with_status(200)
            .with_body(r#"{"success":true,"data":[{"id":7,"title":"original","status":"TODO"}]}"#)
            .create_async()
            .await;
        server
            .mock("PATCH", "/api/todos/7")
            .with_status(200)
            .with_body(r#"{"success":false,"message":"no"}"#)
            .create_async()
            .await;

        let controller = controller_for(&server.url(), temp_store("board-fields"));
        controller.load_board().await.unwrap();

        let patch = FieldPatch {
            title: Some("renamed".to_string()),
            ..FieldPatch::default()
        };
        let outcome = controller.update_fields(ItemId::Confirmed(7), patch).await;
        assert_eq!(outcome, ActionOutcome::Reverted("no".to_string()));
        assert_eq!(
            controller.board().find(ItemId::Confirmed(7)).unwrap().title,
            "original"
        );
    }
}

//! Push-notification payloads delivered over the live-update subscription.

use serde::{Deserialize, Serialize};

use super::{Item, ItemId};

/// What happened server-side. `Delete` carries ids only; the other kinds
/// carry the full affected items.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PushKind {
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "status-change")]
    StatusChange,
    #[serde(rename = "delete")]
    Delete,
}

/// One change notification, scoped to the user it belongs to. Consumers
/// must discard messages whose `user_id` is not the current session's.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub kind: PushKind,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub removed_ids: Vec<ItemId>,
    pub user_id: i64,
}

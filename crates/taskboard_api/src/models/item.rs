//! Item model: the board's todo/subtodo entity, one level of nesting.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Status, TimelineEvent};

/// Item identifier, tagged by provenance. `Confirmed` ids are
/// server-assigned and authoritative; `Pending` ids are client-local
/// placeholders for optimistic entries the server has not confirmed yet.
///
/// On the wire and in persisted snapshots the id is a single signed
/// integer: non-negative for confirmed, negative for pending. The tagged
/// form keeps the two spaces apart in code; a pending entry is always
/// replaced wholesale by its confirmed counterpart, never merged.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(from = "i64", into = "i64")]
pub enum ItemId {
    Pending(i64),
    Confirmed(i64),
}

impl ItemId {
    pub fn is_pending(&self) -> bool {
        matches!(self, ItemId::Pending(_))
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, ItemId::Confirmed(_))
    }

    /// The raw server-side id, only present for confirmed ids.
    pub fn confirmed(&self) -> Option<i64> {
        match self {
            ItemId::Confirmed(id) => Some(*id),
            ItemId::Pending(_) => None,
        }
    }
}

impl From<i64> for ItemId {
    fn from(raw: i64) -> Self {
        if raw < 0 {
            ItemId::Pending(-raw)
        } else {
            ItemId::Confirmed(raw)
        }
    }
}

impl From<ItemId> for i64 {
    fn from(id: ItemId) -> i64 {
        match id {
            ItemId::Pending(n) => -n,
            ItemId::Confirmed(n) => n,
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", i64::from(*self))
    }
}

/// A board item. Root items may carry children; children never do in any
/// exercised flow, so the tree is at most two levels deep.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub status: Status,
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    #[serde(default)]
    pub children: Vec<Item>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
}

impl Item {
    /// Builds an optimistic placeholder entry for a not-yet-confirmed
    /// creation. New items always start in the `TODO` column.
    pub fn placeholder(temp_id: i64, title: impl Into<String>) -> Self {
        Self {
            id: ItemId::Pending(temp_id),
            title: title.into(),
            description: None,
            image_url: None,
            start_date: None,
            end_date: None,
            status: Status::Todo,
            parent_id: None,
            children: Vec::new(),
            created_at: None,
            updated_at: None,
            timeline: Vec::new(),
        }
    }
}

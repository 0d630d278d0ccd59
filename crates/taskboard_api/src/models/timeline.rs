//! Activity-log events attached to an item. Append-only server-side; the
//! client only ever receives and displays these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub actor_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

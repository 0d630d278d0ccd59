//! Workflow status enumeration shared by items and status updates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three fixed board columns. The set is closed; unknown wire values
/// are a deserialization error rather than a silent default.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    #[serde(rename = "TODO")]
    Todo,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "DONE")]
    Done,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "TODO",
            Status::InProgress => "IN_PROGRESS",
            Status::Done => "DONE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Status;

    #[test]
    fn wire_values_round_trip() {
        let json = serde_json::to_string(&Status::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        let parsed: Status = serde_json::from_str("\"DONE\"").unwrap();
        assert_eq!(parsed, Status::Done);
    }

    #[test]
    fn unknown_value_is_rejected() {
        assert!(serde_json::from_str::<Status>("\"BLOCKED\"").is_err());
    }
}

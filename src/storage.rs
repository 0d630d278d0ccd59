//! File-backed keyed JSON storage for durable client-side state.
//!
//! One file per key under the platform config directory. Reads fall back
//! to `None` on missing or unparsable files so a corrupt cache can never
//! keep the client from starting.

use chrono::{DateTime, Utc};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

use taskboard_api::Item;

pub const KEY_BOARD_CACHE: &str = "board-cache";
pub const KEY_PENDING_OPS: &str = "pending-ops";
pub const KEY_PENDING_STATUSES: &str = "pending-statuses";

/// Last-known full item tree, kept as the offline fallback.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub items: Vec<Item>,
    pub saved_at: DateTime<Utc>,
}

/// Durable keyed JSON store rooted at a single directory.
#[derive(Clone, Debug)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Creates a store bound to the platform-specific app config path.
    pub fn new() -> Self {
        let dirs = directories::ProjectDirs::from("io", "taskboard", "taskboard")
            .expect("Could not determine config directory");
        Self {
            dir: dirs.config_dir().to_path_buf(),
        }
    }

    /// Creates a store rooted at an explicit directory.
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Loads and decodes the value stored under `key`. Missing files and
    /// decode failures both yield `None`; the latter is logged.
    pub fn load<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let path = self.path_for(key);
        if !path.exists() {
            return None;
        }
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("discarding unreadable state file {key}: {err}");
                None
            }
        }
    }

    /// Persists `value` under `key`, creating the directory when needed.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), io::Error>
    where
        T: Serialize,
    {
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(value)?;
        fs::write(self.path_for(key), content)?;
        Ok(())
    }

    /// Deletes the value stored under `key`, if any.
    pub fn remove(&self, key: &str) -> Result<(), io::Error> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn load_snapshot(&self) -> Option<BoardSnapshot> {
        self.load(KEY_BOARD_CACHE)
    }

    pub fn save_snapshot(&self, items: &[Item]) -> Result<(), io::Error> {
        let snapshot = BoardSnapshot {
            items: items.to_vec(),
            saved_at: Utc::now(),
        };
        self.save(KEY_BOARD_CACHE, &snapshot)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[cfg(test)]
pub(crate) fn temp_store(name: &str) -> StateStore {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    StateStore::with_dir(std::env::temp_dir().join(format!("taskboard-tests-{name}-{nanos}")))
}

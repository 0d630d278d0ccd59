//! In-memory authoritative item tree shared by the controller and the
//! live-update consumer.

use std::sync::{Arc, Mutex};

use crate::tree::find_item;
use taskboard_api::{Item, ItemId};

/// Thread-safe holder for the current item tree. Mutation goes through
/// [`update`](BoardStore::update) with one of the pure tree operations,
/// applied sequentially under the lock.
#[derive(Clone, Default)]
pub struct BoardStore {
    items: Arc<Mutex<Vec<Item>>>,
}

impl BoardStore {
    /// Replaces the current tree wholesale.
    pub fn replace(&self, items: Vec<Item>) {
        let mut guard = self.items.lock().unwrap();
        *guard = items;
    }

    /// Returns a cloned snapshot of the current tree.
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.lock().unwrap().clone()
    }

    /// Finds a node by id in the current tree.
    pub fn find(&self, id: ItemId) -> Option<Item> {
        let guard = self.items.lock().unwrap();
        find_item(&guard, id).cloned()
    }

    /// Swaps the tree for the result of applying `f` to it.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&[Item]) -> Vec<Item>,
    {
        let mut guard = self.items.lock().unwrap();
        let next = f(&guard);
        *guard = next;
    }
}

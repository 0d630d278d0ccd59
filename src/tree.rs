//! Pure operations over the nested item tree.
//!
//! Every function takes the tree by reference and returns a fresh tree;
//! inputs are never mutated and repeated application with the same
//! arguments is a no-op after the first. The tree is an ordered sequence
//! of root items, each owning an ordered sequence of children, and is at
//! most two levels deep in every exercised flow.

use taskboard_api::client::FieldPatch;
use taskboard_api::{Item, ItemId, Status};

/// Looks up a node (root or child) by id.
pub fn find_item(tree: &[Item], id: ItemId) -> Option<&Item> {
    for root in tree {
        if root.id == id {
            return Some(root);
        }
        if let Some(child) = root.children.iter().find(|child| child.id == id) {
            return Some(child);
        }
    }
    None
}

/// Appends `child` to the named parent's children. Returns the tree
/// unchanged when the parent does not exist.
pub fn insert_child(tree: &[Item], parent_id: ItemId, child: Item) -> Vec<Item> {
    tree.iter()
        .map(|root| {
            if root.id == parent_id {
                let mut root = root.clone();
                root.children.push(child.clone());
                root
            } else {
                root.clone()
            }
        })
        .collect()
}

/// Removes any node matching `id`, root or child. Removing a root takes
/// its children with it.
pub fn remove_by_id(tree: &[Item], id: ItemId) -> Vec<Item> {
    tree.iter()
        .filter(|root| root.id != id)
        .map(|root| {
            let mut root = root.clone();
            root.children.retain(|child| child.id != id);
            root
        })
        .collect()
}

/// Replaces the node matching `item.id` wherever it sits. No insertion
/// happens when nothing matches; new roots are placed by the caller.
pub fn upsert_by_id(tree: &[Item], item: &Item) -> Vec<Item> {
    tree.iter()
        .map(|root| {
            if root.id == item.id {
                item.clone()
            } else {
                let mut root = root.clone();
                for child in &mut root.children {
                    if child.id == item.id {
                        *child = item.clone();
                    }
                }
                root
            }
        })
        .collect()
}

/// Sets `status` on the matching node. Marking a root `DONE` also marks
/// every one of its children `DONE`; changing a child never touches its
/// parent.
pub fn apply_status(tree: &[Item], id: ItemId, status: Status) -> Vec<Item> {
    tree.iter()
        .map(|root| {
            let mut root = root.clone();
            if root.id == id {
                root.status = status;
                if status == Status::Done {
                    cascade_done_to_children(&mut root);
                }
            } else {
                for child in &mut root.children {
                    if child.id == id {
                        child.status = status;
                    }
                }
            }
            root
        })
        .collect()
}

/// The parent-to-child completion rule, kept as its own named transform
/// so it can be tested apart from the generic status setter.
pub fn cascade_done_to_children(parent: &mut Item) {
    for child in &mut parent.children {
        child.status = Status::Done;
    }
}

/// Shallow-merges the patch onto the matching node. Absent patch fields
/// leave the node's fields alone.
pub fn apply_fields(tree: &[Item], id: ItemId, patch: &FieldPatch) -> Vec<Item> {
    tree.iter()
        .map(|root| {
            let mut root = root.clone();
            if root.id == id {
                merge_fields(&mut root, patch);
            } else {
                for child in &mut root.children {
                    if child.id == id {
                        merge_fields(child, patch);
                    }
                }
            }
            root
        })
        .collect()
}

fn merge_fields(item: &mut Item, patch: &FieldPatch) {
    if let Some(title) = &patch.title {
        item.title = title.clone();
    }
    if let Some(description) = &patch.description {
        item.description = Some(description.clone());
    }
    if let Some(start) = patch.start_date {
        item.start_date = Some(start);
    }
    if let Some(end) = patch.end_date {
        item.end_date = Some(end);
    }
}

//! In-memory, path-indexed item trees.
//!
//! An [`ItemTree`] is built fresh for every sync pass from a live data source
//! and is never persisted. Paths are the primary key because they are what a
//! human editing the mirror sees; the identifier index exists so that moves
//! and renames can be recognised.
//!
//! # Invariants
//!
//! - Every non-root path has a parent path that is present.
//! - Paths are unique and each identifier maps to exactly one path.
//! - Soft-deleted items never enter a tree; callers filter them out.
//!
//! Each tree owns its indices, so journal, local and remote trees coexist
//! without sharing any lookup state.

pub(crate) mod index;
pub mod listener;
pub mod view;

use std::collections::HashMap;

use tracing::debug;

use crate::error::ErrorCode;
use crate::model::path::safe_file_name;
use crate::model::{Item, ItemPath};

use index::PathIndex;
pub use listener::{
    ActionListener, AddEvent, MoveEvent, NoopListener, RecordedAction, RecordingListener,
    RemoveEvent, UpdateEvent,
};
pub use view::{Fields, TreeView, ViewEntry};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structural errors raised when a mutation's preconditions do not hold.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("no item found at path {path}")]
    PathNotFound { path: ItemPath },

    #[error("no item found with id {id}")]
    IdNotFound { id: String },

    #[error("can't place an item at {path}: parent {parent} is not present")]
    ParentNotFound { path: ItemPath, parent: ItemPath },

    #[error("can't place an item at {path}: already occupied by {occupant}")]
    PathOccupied { path: ItemPath, occupant: String },

    #[error("can't add an item without an id at {path}")]
    EmptyId { path: ItemPath },

    #[error("item {id} is already present at {existing}")]
    DuplicateId { id: String, existing: ItemPath },

    #[error("update at {path} would change the item's {field} ({from} -> {to}); use a move instead")]
    IdentityChanged {
        path: ItemPath,
        field: &'static str,
        from: String,
        to: String,
    },

    #[error("cannot move {from} to {to}: {reason}")]
    InvalidMove {
        from: ItemPath,
        to: ItemPath,
        reason: &'static str,
    },

    #[error("the tree root cannot be {action}")]
    RootImmutable { action: &'static str },

    #[error("{action} at {path} failed in the action listener: {source}")]
    Listener {
        action: &'static str,
        path: ItemPath,
        #[source]
        source: anyhow::Error,
    },

    #[error("tree indices are inconsistent: {0}")]
    Inconsistent(String),
}

impl TreeError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::PathNotFound { .. } | Self::IdNotFound { .. } => ErrorCode::PathNotFound,
            Self::ParentNotFound { .. } => ErrorCode::ParentNotFound,
            Self::PathOccupied { .. } => ErrorCode::PathOccupied,
            Self::EmptyId { .. } | Self::DuplicateId { .. } => ErrorCode::DuplicateId,
            Self::IdentityChanged { .. } => ErrorCode::IdentityChanged,
            Self::InvalidMove { .. } | Self::RootImmutable { .. } => ErrorCode::InvalidMutation,
            Self::Listener { .. } => ErrorCode::ListenerFailed,
            Self::Inconsistent(_) => ErrorCode::InternalUnexpected,
        }
    }
}

// ---------------------------------------------------------------------------
// ItemTree
// ---------------------------------------------------------------------------

/// A hierarchy of items addressed by [`ItemPath`].
#[derive(Debug, Clone)]
pub struct ItemTree {
    root: Item,
    index: PathIndex,
    items: HashMap<String, Item>,
}

impl ItemTree {
    /// Create a tree holding only `base_item` at the root path `.`.
    #[must_use]
    pub fn new(base_item: Item) -> Self {
        Self {
            index: PathIndex::with_root(&base_item.id),
            root: base_item,
            items: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn root(&self) -> &Item {
        &self.root
    }

    /// Number of items below the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the tree holds nothing but its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn has_path(&self, path: &ItemPath) -> bool {
        self.index.contains_path(path)
    }

    #[must_use]
    pub fn has_id(&self, id: &str) -> bool {
        self.index.contains_id(id)
    }

    /// Current path of the item with identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IdNotFound`] if no item has that identifier.
    pub fn path_from_id(&self, id: &str) -> Result<&ItemPath, TreeError> {
        self.index
            .path_of(id)
            .ok_or_else(|| TreeError::IdNotFound { id: id.to_string() })
    }

    /// # Errors
    ///
    /// Returns [`TreeError::PathNotFound`] if nothing lives at `path`.
    pub fn get_at_path(&self, path: &ItemPath) -> Result<&Item, TreeError> {
        self.lookup(path)
            .ok_or_else(|| TreeError::PathNotFound { path: path.clone() })
    }

    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<&Item> {
        if id == self.root.id {
            Some(&self.root)
        } else {
            self.items.get(id)
        }
    }

    fn lookup(&self, path: &ItemPath) -> Option<&Item> {
        if path.is_root() {
            return Some(&self.root);
        }
        self.index.id_at(path).and_then(|id| self.items.get(id))
    }

    fn parent_id_for(&self, path: &ItemPath) -> Result<String, TreeError> {
        let parent = path.parent().ok_or(TreeError::RootImmutable { action: "replaced" })?;
        self.index
            .id_at(&parent)
            .map(str::to_string)
            .ok_or_else(|| TreeError::ParentNotFound {
                path: path.clone(),
                parent,
            })
    }

    /// A free path for `item` under `parent`, derived from its title.
    ///
    /// Collisions are disambiguated as `name (1)`, `name (2)`, … before the
    /// extension.
    #[must_use]
    pub fn unique_child_path(&self, parent: &ItemPath, item: &Item) -> ItemPath {
        let base = safe_file_name(&item.title);
        let extension = item
            .file_extension()
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let mut counter = 0_usize;
        loop {
            let name = if counter == 0 {
                format!("{base}{extension}")
            } else {
                format!("{base} ({counter}){extension}")
            };
            let candidate = parent.join(&name);
            if !self.has_path(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Insert `item` under `parent` at a unique title-derived path.
    ///
    /// # Errors
    ///
    /// Fails if `parent` is not present, or for any reason listed on
    /// [`ItemTree::add_item_at`].
    pub fn add_item_to<L: ActionListener + ?Sized>(
        &mut self,
        parent: &ItemPath,
        item: Item,
        listener: &mut L,
    ) -> Result<ItemPath, TreeError> {
        if !self.has_path(parent) {
            return Err(TreeError::ParentNotFound {
                path: parent.join(&safe_file_name(&item.title)),
                parent: parent.clone(),
            });
        }
        let path = self.unique_child_path(parent, &item);
        self.add_item_at(&path, item, listener)?;
        Ok(path)
    }

    /// Insert `item` at exactly `path`.
    ///
    /// The item's `parent_id` is set from the parent path. The listener's
    /// `on_add` runs before insertion and may substitute the stored item.
    ///
    /// # Errors
    ///
    /// Fails if `path` is the root or occupied, its parent is missing, the
    /// item's identifier is empty or already present, or the listener fails.
    pub fn add_item_at<L: ActionListener + ?Sized>(
        &mut self,
        path: &ItemPath,
        mut item: Item,
        listener: &mut L,
    ) -> Result<(), TreeError> {
        if path.is_root() {
            return Err(TreeError::RootImmutable { action: "replaced" });
        }
        if let Some(occupant) = self.index.id_at(path) {
            return Err(TreeError::PathOccupied {
                path: path.clone(),
                occupant: occupant.to_string(),
            });
        }
        item.parent_id = self.parent_id_for(path)?;
        self.check_new_id(path, &item.id)?;

        let replacement = listener
            .on_add(&AddEvent { path, item: &item })
            .map_err(|source| TreeError::Listener {
                action: "add",
                path: path.clone(),
                source,
            })?;
        if let Some(replacement) = replacement {
            item = replacement;
            self.check_new_id(path, &item.id)?;
        }

        debug!(path = %path, id = %item.id, kind = %item.kind(), "added item");
        self.index.insert(path.clone(), item.id.clone());
        self.items.insert(item.id.clone(), item);
        Ok(())
    }

    fn check_new_id(&self, path: &ItemPath, id: &str) -> Result<(), TreeError> {
        if id.is_empty() {
            return Err(TreeError::EmptyId { path: path.clone() });
        }
        if let Some(existing) = self.index.path_of(id) {
            return Err(TreeError::DuplicateId {
                id: id.to_string(),
                existing: existing.clone(),
            });
        }
        Ok(())
    }

    /// Relocate the subtree at `from` to `to`, keeping every descendant's
    /// path relative to the moved item.
    ///
    /// # Errors
    ///
    /// Fails if `from` is the root or missing, `to` is occupied, `to`'s
    /// parent is missing, `to` lies inside the moved subtree, or the listener
    /// fails (the move is undone first).
    pub fn move_item<L: ActionListener + ?Sized>(
        &mut self,
        from: &ItemPath,
        to: &ItemPath,
        listener: &mut L,
    ) -> Result<(), TreeError> {
        if from.is_root() {
            return Err(TreeError::RootImmutable { action: "moved" });
        }
        let id = self
            .index
            .id_at(from)
            .ok_or_else(|| TreeError::PathNotFound { path: from.clone() })?
            .to_string();
        if to.is_within(from) {
            return Err(TreeError::InvalidMove {
                from: from.clone(),
                to: to.clone(),
                reason: "target lies inside the moved subtree",
            });
        }
        if let Some(occupant) = self.index.id_at(to) {
            return Err(TreeError::PathOccupied {
                path: to.clone(),
                occupant: occupant.to_string(),
            });
        }
        let new_parent_id = self.parent_id_for(to)?;

        let moved = self.index.move_subtree(from, to);
        let Some(item) = self.items.get_mut(&id) else {
            return Err(TreeError::Inconsistent(format!(
                "{from} indexed as {id} but no item is stored"
            )));
        };
        let old_parent_id = std::mem::replace(&mut item.parent_id, new_parent_id);

        let outcome = listener.on_move(&MoveEvent {
            from,
            to,
            item: &*item,
        });
        if let Err(source) = outcome {
            item.parent_id = old_parent_id;
            self.index.move_subtree(to, from);
            return Err(TreeError::Listener {
                action: "move",
                path: from.clone(),
                source,
            });
        }

        debug!(from = %from, to = %to, id = %id, relocated = moved.len(), "moved item");
        Ok(())
    }

    /// Replace the content of the item at `path`.
    ///
    /// # Errors
    ///
    /// Fails if `path` is the root or missing, the new item has a different
    /// identifier or kind, or the listener fails (the old content is
    /// restored first).
    pub fn update<L: ActionListener + ?Sized>(
        &mut self,
        path: &ItemPath,
        mut new_item: Item,
        listener: &mut L,
    ) -> Result<(), TreeError> {
        if path.is_root() {
            return Err(TreeError::RootImmutable { action: "updated" });
        }
        let existing = self.get_at_path(path)?;
        if new_item.id != existing.id {
            return Err(TreeError::IdentityChanged {
                path: path.clone(),
                field: "id",
                from: existing.id.clone(),
                to: new_item.id,
            });
        }
        if new_item.kind() != existing.kind() {
            return Err(TreeError::IdentityChanged {
                path: path.clone(),
                field: "kind",
                from: existing.kind().to_string(),
                to: new_item.kind().to_string(),
            });
        }
        new_item.parent_id.clone_from(&existing.parent_id);

        let id = new_item.id.clone();
        let Some(previous) = self.items.insert(id.clone(), new_item) else {
            return Err(TreeError::Inconsistent(format!(
                "{path} resolved to {id} but no item is stored"
            )));
        };

        let outcome = match self.items.get(&id) {
            Some(item) => listener.on_update(&UpdateEvent { path, item }),
            None => Ok(()),
        };
        if let Err(source) = outcome {
            self.items.insert(id, previous);
            return Err(TreeError::Listener {
                action: "update",
                path: path.clone(),
                source,
            });
        }

        debug!(path = %path, id = %id, "updated item");
        Ok(())
    }

    /// Remove the subtree rooted at `path`.
    ///
    /// # Errors
    ///
    /// Fails if `path` is the root or missing, or the listener fails (the
    /// subtree is restored first).
    pub fn delete_at_path<L: ActionListener + ?Sized>(
        &mut self,
        path: &ItemPath,
        listener: &mut L,
    ) -> Result<(), TreeError> {
        if path.is_root() {
            return Err(TreeError::RootImmutable { action: "removed" });
        }
        if !self.has_path(path) {
            return Err(TreeError::PathNotFound { path: path.clone() });
        }

        let removed_entries = self.index.remove_subtree(path);
        let removed: Vec<(ItemPath, Item)> = removed_entries
            .into_iter()
            .filter_map(|(p, id)| self.items.remove(&id).map(|item| (p, item)))
            .collect();

        let outcome = match removed.first() {
            Some((_, item)) => listener.on_remove(&RemoveEvent {
                path,
                item,
                removed: removed.len(),
            }),
            None => Ok(()),
        };
        if let Err(source) = outcome {
            for (p, item) in removed {
                self.index.insert(p, item.id.clone());
                self.items.insert(item.id.clone(), item);
            }
            return Err(TreeError::Listener {
                action: "remove",
                path: path.clone(),
                source,
            });
        }

        debug!(path = %path, removed = removed.len(), "removed subtree");
        Ok(())
    }

    /// Every `(path, item)` pair, root first, then in path order.
    ///
    /// The sequence is lazy and can be restarted by calling `items` again;
    /// the order is stable for a given tree value.
    pub fn items(&self) -> impl Iterator<Item = (&ItemPath, &Item)> + '_ {
        self.index
            .iter()
            .filter_map(|(path, _)| self.lookup(path).map(|item| (path, item)))
    }

    /// Verify that the path index, identifier index and item store agree.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Inconsistent`] describing the first violation.
    pub fn check_rep(&self) -> Result<(), TreeError> {
        if self.index.len() != self.items.len() + 1 {
            return Err(TreeError::Inconsistent(format!(
                "{} indexed paths for {} stored items plus root",
                self.index.len(),
                self.items.len()
            )));
        }
        for (path, id) in self.index.iter() {
            if self.index.path_of(id) != Some(path) {
                return Err(TreeError::Inconsistent(format!(
                    "id {id} does not map back to {path}"
                )));
            }
            if path.is_root() {
                continue;
            }
            let Some(item) = self.items.get(id) else {
                return Err(TreeError::Inconsistent(format!("no item stored for {id}")));
            };
            let Some(parent) = path.parent() else {
                continue;
            };
            match self.index.id_at(&parent) {
                Some(parent_id) if parent_id == item.parent_id => {}
                Some(parent_id) => {
                    return Err(TreeError::Inconsistent(format!(
                        "{path} records parent {} but lives under {parent_id}",
                        item.parent_id
                    )));
                }
                None => {
                    return Err(TreeError::Inconsistent(format!("{path} is orphaned")));
                }
            }
        }
        Ok(())
    }
}

impl TreeView for ItemTree {
    fn has_path(&self, path: &ItemPath) -> bool {
        Self::has_path(self, path)
    }

    fn entry_at(&self, path: &ItemPath) -> Option<ViewEntry<'_>> {
        if path.is_root() {
            return None;
        }
        let (path, id) = self.index.entry(path)?;
        let item = self.items.get(id)?;
        Some(ViewEntry {
            path,
            id,
            kind: item.kind(),
            fields: Fields::Item(item),
        })
    }

    fn entries(&self) -> impl Iterator<Item = ViewEntry<'_>> {
        self.index.iter().filter_map(|(path, id)| {
            if path.is_root() {
                return None;
            }
            let item = self.items.get(id)?;
            Some(ViewEntry {
                path,
                id,
                kind: item.kind(),
                fields: Fields::Item(item),
            })
        })
    }
}

//! The journal: the last state both sides of a mirror agreed on.
//!
//! A journal is a flat set of [`JournalEntry`] rows, one per item per
//! mirror. [`JournalTree`] is the read-only view the diff engine walks; it
//! only knows fingerprints, never full items. After a clean merge the caller
//! replaces the whole entry set with [`JournalTree::snapshot`] of the merged
//! tree through a [`JournalStore`].

pub mod migrations;
pub mod schema;
pub mod store;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::model::{ItemKind, ItemPath};
use crate::tree::{Fields, ItemTree, TreeView, ViewEntry};

pub use store::{JournalStore, MemoryJournal, SqliteJournal};

/// One persisted baseline record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub item_id: String,
    pub mirror_id: String,
    /// Fingerprint of the item's diff fields at the last agreed state.
    pub hash: String,
    pub path: ItemPath,
    pub kind: ItemKind,
}

/// Errors raised while building or persisting a journal.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal entry for {item_id} belongs to mirror {found}, expected {expected}")]
    MirrorMismatch {
        item_id: String,
        expected: String,
        found: String,
    },

    #[error("journal lists path {path} more than once")]
    DuplicatePath { path: ItemPath },

    #[error("journal lists item {id} more than once")]
    DuplicateId { id: String },

    #[error("journal entry for {id} sits at the tree root")]
    RootEntry { id: String },

    #[error("journal path {path} has no parent entry")]
    Orphan { path: ItemPath },

    #[error("journal row is malformed: {0}")]
    InvalidRow(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl JournalError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Sqlite(_) => ErrorCode::JournalStoreFailed,
            _ => ErrorCode::JournalCorrupt,
        }
    }
}

/// Read-only, path-indexed view over a mirror's journal entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalTree {
    mirror_id: String,
    by_path: BTreeMap<ItemPath, JournalEntry>,
}

impl JournalTree {
    /// Build the view, failing fast on malformed data.
    ///
    /// # Errors
    ///
    /// Returns a [`JournalError`] if an entry belongs to another mirror, a
    /// path or identifier appears twice, an entry claims the root path, or a
    /// path's parent is missing.
    pub fn from_entries(
        mirror_id: &str,
        entries: impl IntoIterator<Item = JournalEntry>,
    ) -> Result<Self, JournalError> {
        let mut by_path = BTreeMap::new();
        let mut seen_ids = HashSet::new();

        for entry in entries {
            if entry.mirror_id != mirror_id {
                return Err(JournalError::MirrorMismatch {
                    item_id: entry.item_id,
                    expected: mirror_id.to_string(),
                    found: entry.mirror_id,
                });
            }
            if entry.path.is_root() {
                return Err(JournalError::RootEntry { id: entry.item_id });
            }
            if !seen_ids.insert(entry.item_id.clone()) {
                return Err(JournalError::DuplicateId { id: entry.item_id });
            }
            if by_path.contains_key(&entry.path) {
                return Err(JournalError::DuplicatePath { path: entry.path });
            }
            by_path.insert(entry.path.clone(), entry);
        }

        for path in by_path.keys() {
            let Some(parent) = path.parent() else {
                continue;
            };
            if !parent.is_root() && !by_path.contains_key(&parent) {
                return Err(JournalError::Orphan { path: path.clone() });
            }
        }

        Ok(Self {
            mirror_id: mirror_id.to_string(),
            by_path,
        })
    }

    /// Entry set describing `tree` as the new agreed state for `mirror_id`.
    #[must_use]
    pub fn snapshot(mirror_id: &str, tree: &ItemTree) -> Vec<JournalEntry> {
        tree.items()
            .filter(|(path, _)| !path.is_root())
            .map(|(path, item)| JournalEntry {
                item_id: item.id.clone(),
                mirror_id: mirror_id.to_string(),
                hash: item.fingerprint(),
                path: path.clone(),
                kind: item.kind(),
            })
            .collect()
    }

    #[must_use]
    pub fn mirror_id(&self) -> &str {
        &self.mirror_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    #[must_use]
    pub fn has_path(&self, path: &ItemPath) -> bool {
        self.by_path.contains_key(path)
    }

    #[must_use]
    pub fn hash_at_path(&self, path: &ItemPath) -> Option<&str> {
        self.by_path.get(path).map(|entry| entry.hash.as_str())
    }

    /// Entries in path order.
    pub fn items(&self) -> impl Iterator<Item = &JournalEntry> + '_ {
        self.by_path.values()
    }
}

fn view_entry(entry: &JournalEntry) -> ViewEntry<'_> {
    ViewEntry {
        path: &entry.path,
        id: &entry.item_id,
        kind: entry.kind,
        fields: Fields::Fingerprint(&entry.hash),
    }
}

impl TreeView for JournalTree {
    fn has_path(&self, path: &ItemPath) -> bool {
        Self::has_path(self, path)
    }

    fn entry_at(&self, path: &ItemPath) -> Option<ViewEntry<'_>> {
        self.by_path.get(path).map(view_entry)
    }

    fn entries(&self) -> impl Iterator<Item = ViewEntry<'_>> {
        self.by_path.values().map(view_entry)
    }
}

//! Path ⇄ identifier index owned by each tree value.
//!
//! Paths are kept in a `BTreeMap`, so every subtree is one contiguous range
//! starting at `"<path>/"`. Subtree moves and removals are range scans, not
//! full walks.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use crate::model::ItemPath;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PathIndex {
    by_path: BTreeMap<ItemPath, String>,
    by_id: HashMap<String, ItemPath>,
}

impl PathIndex {
    pub(crate) fn with_root(root_id: &str) -> Self {
        let mut index = Self::default();
        index.insert(ItemPath::root(), root_id.to_string());
        index
    }

    pub(crate) fn len(&self) -> usize {
        self.by_path.len()
    }

    pub(crate) fn contains_path(&self, path: &ItemPath) -> bool {
        self.by_path.contains_key(path)
    }

    pub(crate) fn contains_id(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub(crate) fn id_at(&self, path: &ItemPath) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    /// The stored key and identifier for `path`, borrowed from the index.
    pub(crate) fn entry(&self, path: &ItemPath) -> Option<(&ItemPath, &str)> {
        self.by_path
            .get_key_value(path)
            .map(|(path, id)| (path, id.as_str()))
    }

    pub(crate) fn path_of(&self, id: &str) -> Option<&ItemPath> {
        self.by_id.get(id)
    }

    pub(crate) fn insert(&mut self, path: ItemPath, id: String) {
        self.by_id.insert(id.clone(), path.clone());
        self.by_path.insert(path, id);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&ItemPath, &str)> + '_ {
        self.by_path.iter().map(|(path, id)| (path, id.as_str()))
    }

    /// `path` itself (when present) followed by all of its descendants.
    pub(crate) fn subtree(&self, path: &ItemPath) -> Vec<(ItemPath, String)> {
        if path.is_root() {
            return self
                .by_path
                .iter()
                .map(|(p, id)| (p.clone(), id.clone()))
                .collect();
        }

        let mut out = Vec::new();
        if let Some(id) = self.by_path.get(path) {
            out.push((path.clone(), id.clone()));
        }

        let prefix = path.descendant_prefix();
        let range = self
            .by_path
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded));
        for (child, id) in range {
            if !child.as_str().starts_with(&prefix) {
                break;
            }
            out.push((child.clone(), id.clone()));
        }
        out
    }

    /// Remove `path` and everything beneath it, returning the removed entries.
    pub(crate) fn remove_subtree(&mut self, path: &ItemPath) -> Vec<(ItemPath, String)> {
        let removed = self.subtree(path);
        for (p, id) in &removed {
            self.by_path.remove(p);
            self.by_id.remove(id);
        }
        removed
    }

    /// Re-root the subtree at `from` onto `to`, returning `(old, new, id)`
    /// for every relocated entry.
    pub(crate) fn move_subtree(
        &mut self,
        from: &ItemPath,
        to: &ItemPath,
    ) -> Vec<(ItemPath, ItemPath, String)> {
        let moved: Vec<(ItemPath, ItemPath, String)> = self
            .remove_subtree(from)
            .into_iter()
            .filter_map(|(old, id)| old.rebase(from, to).map(|new| (old, new, id)))
            .collect();

        for (_, new, id) in &moved {
            self.insert(new.clone(), id.clone());
        }
        moved
    }
}

//! Random offline edits applied to one side of a mirror.
//!
//! Each side gets its own [`SideEditor`] with an identifier prefix and a
//! scope folder. Every edit stays strictly inside the scope, so two editors
//! with disjoint scopes can never produce overlapping changes.

use notemirror_core::model::{Item, ItemKind, ItemPath};
use notemirror_core::tree::{ItemTree, NoopListener};
use serde::Serialize;
use tracing::debug;

use crate::rng::DeterministicRng;

const TITLES: &[&str] = &[
    "inbox", "ideas", "todo", "draft", "recipes", "travel", "reading", "misc",
];

/// Kind of edit the editor attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    AddFolder,
    AddNote,
    Remove,
    Move,
    Rename,
    Touch,
}

impl EditKind {
    const ALL: [Self; 6] = [
        Self::AddFolder,
        Self::AddNote,
        Self::Remove,
        Self::Move,
        Self::Rename,
        Self::Touch,
    ];
}

/// An edit that changed the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedEdit {
    pub kind: EditKind,
    pub path: ItemPath,
}

/// Generates edits for one side.
#[derive(Debug, Clone)]
pub struct SideEditor {
    prefix: String,
    scope: ItemPath,
    next_id: u64,
    clock: i64,
}

impl SideEditor {
    /// New editor creating ids `{prefix}-{n}` beneath `scope`.
    #[must_use]
    pub fn new(prefix: impl Into<String>, scope: ItemPath) -> Self {
        Self {
            prefix: prefix.into(),
            scope,
            next_id: 0,
            clock: 0,
        }
    }

    #[must_use]
    pub const fn scope(&self) -> &ItemPath {
        &self.scope
    }

    /// Apply up to `count` random edits; returns those that took effect.
    pub fn apply_random(
        &mut self,
        tree: &mut ItemTree,
        rng: &mut DeterministicRng,
        count: usize,
    ) -> Vec<AppliedEdit> {
        let mut applied = Vec::new();
        for _ in 0..count {
            let Some(pick) = rng.choose_index(EditKind::ALL.len()) else {
                break;
            };
            let kind = EditKind::ALL[pick];
            if let Some(path) = self.apply_one(tree, rng, kind) {
                debug!(side = %self.prefix, ?kind, %path, "edit applied");
                applied.push(AppliedEdit { kind, path });
            }
        }
        applied
    }

    /// Apply up to `count` random additions.
    pub fn grow(
        &mut self,
        tree: &mut ItemTree,
        rng: &mut DeterministicRng,
        count: usize,
    ) -> Vec<AppliedEdit> {
        let mut applied = Vec::new();
        for _ in 0..count {
            let kind = if rng.hit_rate_percent(30) {
                EditKind::AddFolder
            } else {
                EditKind::AddNote
            };
            if let Some(path) = self.apply_one(tree, rng, kind) {
                applied.push(AppliedEdit { kind, path });
            }
        }
        applied
    }

    fn apply_one(
        &mut self,
        tree: &mut ItemTree,
        rng: &mut DeterministicRng,
        kind: EditKind,
    ) -> Option<ItemPath> {
        match kind {
            EditKind::AddFolder | EditKind::AddNote => {
                let parent = pick(rng, &self.folders(tree)).cloned()?;
                let title = pick(rng, TITLES)?;
                self.next_id += 1;
                let id = format!("{}-{}", self.prefix, self.next_id);
                let item = if kind == EditKind::AddFolder {
                    Item::folder(id, *title)
                } else {
                    Item::note(id, *title, format!("{} body", self.prefix))
                };
                tree.add_item_to(&parent, item, &mut NoopListener).ok()
            }
            EditKind::Remove => {
                let path = pick(rng, &self.members(tree)).cloned()?;
                tree.delete_at_path(&path, &mut NoopListener).ok()?;
                Some(path)
            }
            EditKind::Move => {
                let from = pick(rng, &self.members(tree)).cloned()?;
                let parent = pick(rng, &self.folders(tree)).cloned()?;
                if parent.is_within(&from) || from.parent().as_ref() == Some(&parent) {
                    return None;
                }
                let to = tree.unique_child_path(&parent, tree.get_at_path(&from).ok()?);
                tree.move_item(&from, &to, &mut NoopListener).ok()?;
                Some(to)
            }
            EditKind::Rename => {
                let from = pick(rng, &self.members(tree)).cloned()?;
                let title = pick(rng, TITLES)?;
                let mut renamed = tree.get_at_path(&from).ok()?.clone();
                if renamed.title == *title {
                    return None;
                }
                renamed.title = (*title).to_string();
                renamed.updated_time = self.tick();
                let to = tree.unique_child_path(&from.parent()?, &renamed);
                tree.update(&from, renamed, &mut NoopListener).ok()?;
                tree.move_item(&from, &to, &mut NoopListener).ok()?;
                Some(to)
            }
            EditKind::Touch => {
                let notes: Vec<ItemPath> = self
                    .members(tree)
                    .into_iter()
                    .filter(|path| {
                        tree.get_at_path(path)
                            .is_ok_and(|item| item.kind() == ItemKind::Note)
                    })
                    .collect();
                let path = pick(rng, &notes).cloned()?;
                let mut touched = tree.get_at_path(&path).ok()?.clone();
                touched.updated_time = self.tick();
                touched.set_body(format!("{} edit {}", self.prefix, touched.updated_time));
                tree.update(&path, touched, &mut NoopListener).ok()?;
                Some(path)
            }
        }
    }

    const fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    /// Items strictly below the scope.
    fn members(&self, tree: &ItemTree) -> Vec<ItemPath> {
        tree.items()
            .map(|(path, _)| path)
            .filter(|path| *path != &self.scope && path.is_within(&self.scope))
            .cloned()
            .collect()
    }

    /// Folders that may receive new or moved items, the scope included.
    fn folders(&self, tree: &ItemTree) -> Vec<ItemPath> {
        tree.items()
            .filter(|(path, item)| {
                path.is_within(&self.scope) && item.kind() == ItemKind::Folder
            })
            .map(|(path, _)| path.clone())
            .collect()
    }
}

fn pick<'a, T>(rng: &mut DeterministicRng, values: &'a [T]) -> Option<&'a T> {
    rng.choose_index(values.len()).map(|i| &values[i])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> ItemTree {
        let mut tree = ItemTree::new(Item::root(""));
        for (path, item) in [
            ("Left", Item::folder("f-left", "Left")),
            ("Right", Item::folder("f-right", "Right")),
            ("Left/a.md", Item::note("n-a", "a", "")),
            ("Right/b.md", Item::note("n-b", "b", "")),
        ] {
            tree.add_item_at(&ItemPath::new(path), item, &mut NoopListener)
                .expect("seed");
        }
        tree
    }

    #[test]
    fn edits_stay_inside_scope() {
        let scope = ItemPath::new("Left");
        let mut editor = SideEditor::new("left", scope.clone());
        let mut rng = DeterministicRng::new(11);
        let mut tree = seeded();
        let before = tree.get_at_path(&ItemPath::new("Right/b.md")).cloned();

        let applied = editor.apply_random(&mut tree, &mut rng, 200);

        assert!(!applied.is_empty());
        assert!(applied.iter().all(|edit| edit.path.is_within(&scope)));
        assert!(tree.has_path(&scope), "scope folder is never touched");
        assert_eq!(
            tree.get_at_path(&ItemPath::new("Right/b.md")).cloned().ok(),
            before.ok()
        );
        tree.check_rep().expect("tree stays consistent");
    }

    #[test]
    fn new_ids_carry_the_prefix() {
        let mut editor = SideEditor::new("left", ItemPath::new("Left"));
        let mut rng = DeterministicRng::new(5);
        let mut tree = seeded();
        editor.apply_random(&mut tree, &mut rng, 100);

        let known = ["", "f-left", "f-right", "n-a", "n-b"];
        for (_, item) in tree.items() {
            assert!(
                known.contains(&item.id.as_str()) || item.id.starts_with("left-"),
                "unexpected id {}",
                item.id
            );
        }
    }

    #[test]
    fn same_seed_same_edits() {
        let run = || {
            let mut editor = SideEditor::new("x", ItemPath::root());
            let mut rng = DeterministicRng::new(99);
            let mut tree = seeded();
            editor.apply_random(&mut tree, &mut rng, 50)
        };
        assert_eq!(run(), run());
    }
}

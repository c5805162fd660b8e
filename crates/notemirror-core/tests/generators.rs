#![allow(dead_code)]

use notemirror_core::model::{Item, ItemKind, ItemPath};
use notemirror_core::tree::{ItemTree, NoopListener};
use proptest::prelude::*;

const TITLES: &[&str] = &["alpha", "beta", "gamma", "notes", "todo", "a/b", "", "beta"];

/// One offline edit, with targets chosen by index into the current tree.
#[derive(Debug, Clone)]
pub enum Edit {
    AddFolder { parent: usize, title: usize },
    AddNote { parent: usize, title: usize },
    Remove { target: usize },
    Move { target: usize, parent: usize },
    Rename { target: usize, title: usize },
    Touch { target: usize, body: u8 },
}

pub fn arb_edit() -> impl Strategy<Value = Edit> + Clone {
    prop_oneof![
        (any::<usize>(), 0..TITLES.len()).prop_map(|(parent, title)| Edit::AddFolder { parent, title }),
        (any::<usize>(), 0..TITLES.len()).prop_map(|(parent, title)| Edit::AddNote { parent, title }),
        any::<usize>().prop_map(|target| Edit::Remove { target }),
        (any::<usize>(), any::<usize>()).prop_map(|(target, parent)| Edit::Move { target, parent }),
        (any::<usize>(), 0..TITLES.len()).prop_map(|(target, title)| Edit::Rename { target, title }),
        (any::<usize>(), any::<u8>()).prop_map(|(target, body)| Edit::Touch { target, body }),
    ]
}

pub fn arb_edits(max: usize) -> impl Strategy<Value = Vec<Edit>> + Clone {
    prop::collection::vec(arb_edit(), 0..max)
}

/// A tree grown from additions only.
pub fn arb_tree() -> impl Strategy<Value = ItemTree> {
    prop::collection::vec(
        prop_oneof![
            (any::<usize>(), 0..TITLES.len()).prop_map(|(parent, title)| Edit::AddFolder { parent, title }),
            (any::<usize>(), 0..TITLES.len()).prop_map(|(parent, title)| Edit::AddNote { parent, title }),
        ],
        0..24,
    )
    .prop_map(|edits| {
        let mut tree = ItemTree::new(Item::root(""));
        let mut next_id = 0;
        for edit in &edits {
            apply_edit(&mut tree, edit, &mut next_id, "base");
        }
        tree
    })
}

/// Non-root paths in order.
pub fn item_paths(tree: &ItemTree) -> Vec<ItemPath> {
    tree.items()
        .map(|(path, _)| path.clone())
        .filter(|path| !path.is_root())
        .collect()
}

/// Folder paths including the root.
pub fn folder_paths(tree: &ItemTree) -> Vec<ItemPath> {
    tree.items()
        .filter(|(_, item)| item.kind() == ItemKind::Folder)
        .map(|(path, _)| path.clone())
        .collect()
}

fn pick(paths: &[ItemPath], index: usize) -> Option<ItemPath> {
    if paths.is_empty() {
        None
    } else {
        Some(paths[index % paths.len()].clone())
    }
}

/// Apply `edit` to `tree`, skipping edits that are invalid for its shape.
/// New identifiers are `{prefix}-{n}`.
pub fn apply_edit(tree: &mut ItemTree, edit: &Edit, next_id: &mut usize, prefix: &str) {
    match *edit {
        Edit::AddFolder { parent, title } | Edit::AddNote { parent, title } => {
            let Some(parent) = pick(&folder_paths(tree), parent) else {
                return;
            };
            *next_id += 1;
            let id = format!("{prefix}-{next_id}");
            let item = if matches!(edit, Edit::AddFolder { .. }) {
                Item::folder(id, TITLES[title])
            } else {
                Item::note(id, TITLES[title], "")
            };
            let _ = tree.add_item_to(&parent, item, &mut NoopListener);
        }
        Edit::Remove { target } => {
            if let Some(path) = pick(&item_paths(tree), target) {
                let _ = tree.delete_at_path(&path, &mut NoopListener);
            }
        }
        Edit::Move { target, parent } => {
            let (Some(from), Some(parent)) = (
                pick(&item_paths(tree), target),
                pick(&folder_paths(tree), parent),
            ) else {
                return;
            };
            if parent.is_within(&from) {
                return;
            }
            let Ok(item) = tree.get_at_path(&from) else {
                return;
            };
            let to = tree.unique_child_path(&parent, item);
            let _ = tree.move_item(&from, &to, &mut NoopListener);
        }
        Edit::Rename { target, title } => {
            let Some(from) = pick(&item_paths(tree), target) else {
                return;
            };
            let Ok(item) = tree.get_at_path(&from) else {
                return;
            };
            let mut renamed = item.clone();
            renamed.title = TITLES[title].to_string();
            renamed.updated_time += 1;
            let Some(parent) = from.parent() else {
                return;
            };
            let to = tree.unique_child_path(&parent, &renamed);
            if tree.update(&from, renamed, &mut NoopListener).is_ok() && to != from {
                let _ = tree.move_item(&from, &to, &mut NoopListener);
            }
        }
        Edit::Touch { target, body } => {
            let Some(path) = pick(&item_paths(tree), target) else {
                return;
            };
            let Ok(item) = tree.get_at_path(&path) else {
                return;
            };
            let mut touched = item.clone();
            touched.updated_time += 1;
            touched.set_body(format!("body {body}"));
            let _ = tree.update(&path, touched, &mut NoopListener);
        }
    }
}

/// Apply every edit in order.
pub fn apply_edits(tree: &mut ItemTree, edits: &[Edit], prefix: &str) {
    let mut next_id = 0;
    for edit in edits {
        apply_edit(tree, edit, &mut next_id, prefix);
    }
}

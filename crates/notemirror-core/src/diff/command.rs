//! The closed vocabulary of tree mutations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Item, ItemKind, ItemPath};

/// One structural change to an item tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum TreeCommand {
    /// Insert `item` at exactly `path`; `path`'s parent must exist.
    Add {
        kind: ItemKind,
        path: ItemPath,
        item: Item,
    },
    /// Replace the content of the item at `path`.
    Update {
        kind: ItemKind,
        path: ItemPath,
        item: Item,
    },
    /// Relocate (or rename) the subtree at `from` to `to`.
    Move {
        kind: ItemKind,
        from: ItemPath,
        to: ItemPath,
    },
    /// Remove the subtree at `path`.
    Remove { kind: ItemKind, path: ItemPath },
}

/// Ordered command output of a diff.
pub type CommandSequence = Vec<TreeCommand>;

impl TreeCommand {
    #[must_use]
    pub fn add(path: ItemPath, item: Item) -> Self {
        Self::Add {
            kind: item.kind(),
            path,
            item,
        }
    }

    #[must_use]
    pub fn update(path: ItemPath, item: Item) -> Self {
        Self::Update {
            kind: item.kind(),
            path,
            item,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        match self {
            Self::Add { kind, .. }
            | Self::Update { kind, .. }
            | Self::Move { kind, .. }
            | Self::Remove { kind, .. } => *kind,
        }
    }

    /// Short lowercase name of the command variant.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Update { .. } => "update",
            Self::Move { .. } => "move",
            Self::Remove { .. } => "remove",
        }
    }

    /// Parent path an Add places its item under.
    #[must_use]
    pub fn parent_path(&self) -> Option<ItemPath> {
        match self {
            Self::Add { path, .. } => path.parent(),
            _ => None,
        }
    }

    /// Every path this command reads or writes.
    #[must_use]
    pub fn touched_paths(&self) -> Vec<&ItemPath> {
        match self {
            Self::Add { path, .. } | Self::Update { path, .. } | Self::Remove { path, .. } => {
                vec![path]
            }
            Self::Move { from, to, .. } => vec![from, to],
        }
    }

    /// True if both commands describe the same change: same variant and
    /// kind, same paths, and payloads with the same identifier and diff
    /// fields.
    #[must_use]
    pub fn structurally_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Add {
                    kind: ka,
                    path: pa,
                    item: ia,
                },
                Self::Add {
                    kind: kb,
                    path: pb,
                    item: ib,
                },
            )
            | (
                Self::Update {
                    kind: ka,
                    path: pa,
                    item: ia,
                },
                Self::Update {
                    kind: kb,
                    path: pb,
                    item: ib,
                },
            ) => ka == kb && pa == pb && same_payload(ia, ib),
            (
                Self::Move {
                    kind: ka,
                    from: fa,
                    to: ta,
                },
                Self::Move {
                    kind: kb,
                    from: fb,
                    to: tb,
                },
            ) => ka == kb && fa == fb && ta == tb,
            (Self::Remove { kind: ka, path: pa }, Self::Remove { kind: kb, path: pb }) => {
                ka == kb && pa == pb
            }
            (
                Self::Add { .. } | Self::Update { .. } | Self::Move { .. } | Self::Remove { .. },
                _,
            ) => false,
        }
    }
}

fn same_payload(a: &Item, b: &Item) -> bool {
    a.id == b.id && a.diff_fields() == b.diff_fields()
}

impl fmt::Display for TreeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { kind, path, item } => write!(f, "add {kind} {path} ({})", item.id),
            Self::Update { kind, path, .. } => write!(f, "update {kind} {path}"),
            Self::Move { kind, from, to } => write!(f, "move {kind} {from} -> {to}"),
            Self::Remove { kind, path } => write!(f, "remove {kind} {path}"),
        }
    }
}

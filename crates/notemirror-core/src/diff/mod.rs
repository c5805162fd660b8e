//! Structural diffs between trees.
//!
//! [`diff`] computes the [`CommandSequence`] that turns an original tree
//! view into an updated [`ItemTree`]. Items are matched by identifier, so a
//! renamed or relocated item yields a single Move rather than a Remove and
//! an Add.
//!
//! # Executable ordering
//!
//! The sequence is replayed one command at a time, so each command must be
//! valid against the tree produced by the commands before it. The planner
//! simulates the sequence on a [`PathIndex`] seeded from the original view:
//!
//! 1. Updates for items that stayed at the same path.
//! 2. Removes of subtrees that hold no surviving item. Only the topmost
//!    removed path of a removed chain is emitted.
//! 3. Placements (Moves and Adds), shallowest target first. A placement
//!    waits until the item at its target parent is final and its target
//!    path is free. A moved item with changed fields gets an Update at its
//!    new path right after the Move. Cycles (two items trading paths) are
//!    broken by parking the occupant under a temporary sibling name.
//! 4. Removes of subtrees that held surviving items, at their current path.

pub mod apply;
pub mod command;
pub mod eliminate;

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::model::{Item, ItemKind, ItemPath};
use crate::tree::index::PathIndex;
use crate::tree::{ItemTree, TreeView};

pub use apply::{Conflict, apply_commands};
pub use command::{CommandSequence, TreeCommand};
pub use eliminate::{Elimination, eliminate_duplicates, find_eliminations};

/// Suffix for paths used to park an item while a placement cycle is broken.
const TEMP_SUFFIX: &str = ".mirror-tmp-";

/// Compute the commands that transform `original` into `updated`.
///
/// `original` may be an [`ItemTree`] or a journal view; `updated` must hold
/// full items so that Add and Update payloads can be produced.
#[must_use]
pub fn diff<V: TreeView>(original: &V, updated: &ItemTree) -> CommandSequence {
    // Items still at their original path: compare fields in place.
    let mut in_place: HashSet<&str> = HashSet::new();
    let mut same_path_updates = Vec::new();
    let mut staged: HashMap<&str, &Item> = HashMap::new();

    for (path, item) in updated.items() {
        if path.is_root() {
            continue;
        }
        match original.entry_at(path) {
            Some(entry) if entry.id == item.id => {
                in_place.insert(item.id.as_str());
                if !entry.fields.matches(item) {
                    same_path_updates.push(TreeCommand::update(path.clone(), item.clone()));
                }
            }
            _ => {
                staged.insert(item.id.as_str(), item);
            }
        }
    }

    let mut sim = PathIndex::with_root(&updated.root().id);
    let mut kinds: HashMap<String, ItemKind> = HashMap::new();
    let mut update_after_move: HashSet<String> = HashSet::new();
    let mut removed: Vec<(ItemPath, String, ItemKind)> = Vec::new();
    let mut removed_paths: HashSet<ItemPath> = HashSet::new();
    let mut survivor_ancestors: HashSet<ItemPath> = HashSet::new();

    for entry in original.entries() {
        sim.insert(entry.path.clone(), entry.id.to_string());
        kinds.insert(entry.id.to_string(), entry.kind);

        if !updated.has_id(entry.id) {
            removed_paths.insert(entry.path.clone());
            removed.push((entry.path.clone(), entry.id.to_string(), entry.kind));
            continue;
        }

        let mut ancestor = entry.path.parent();
        while let Some(path) = ancestor {
            if path.is_root() || !survivor_ancestors.insert(path.clone()) {
                break;
            }
            ancestor = path.parent();
        }

        if !in_place.contains(entry.id)
            && let Some(item) = staged.get(entry.id)
            && !entry.fields.matches(item)
        {
            update_after_move.insert(entry.id.to_string());
        }
    }

    // A removed item whose parent is also removed goes with its parent.
    let (mut deferred, mut immediate): (Vec<_>, Vec<_>) = removed
        .into_iter()
        .filter(|(path, _, _)| {
            path.parent()
                .is_none_or(|parent| !removed_paths.contains(&parent))
        })
        .partition(|(path, _, _)| survivor_ancestors.contains(path));
    immediate.sort_by(|a, b| a.0.cmp(&b.0));

    let mut planner = Planner {
        sim,
        kinds,
        targets: updated
            .items()
            .map(|(path, _)| path)
            .filter(|path| !path.is_root())
            .collect(),
        settled: HashSet::from([ItemPath::root()]),
        commands: same_path_updates,
    };

    for (path, _, kind) in immediate {
        if !planner.sim.contains_path(&path) {
            continue;
        }
        planner.sim.remove_subtree(&path);
        debug!(path = %path, "planned remove");
        planner.commands.push(TreeCommand::Remove { kind, path });
    }

    let mut placements: Vec<Placement<'_>> = updated
        .items()
        .filter(|(path, _)| !path.is_root())
        .map(|(path, item)| Placement {
            to: path,
            item,
            existing: planner.kinds.contains_key(&item.id),
            update_after_move: update_after_move.contains(&item.id),
        })
        .collect();
    placements.sort_by(|a, b| {
        a.to.depth()
            .cmp(&b.to.depth())
            .then_with(|| a.to.cmp(b.to))
    });

    let leftovers = planner.place_all(placements);

    deferred.retain(|(_, id, _)| planner.sim.contains_id(id));
    let mut deferred: Vec<(ItemPath, ItemKind)> = deferred
        .into_iter()
        .filter_map(|(_, id, kind)| planner.sim.path_of(&id).cloned().map(|path| (path, kind)))
        .collect();
    deferred.sort_by(|a, b| a.0.cmp(&b.0));
    for (path, kind) in deferred {
        if !planner.sim.contains_path(&path) {
            continue;
        }
        planner.sim.remove_subtree(&path);
        debug!(path = %path, "planned remove after placements");
        planner.commands.push(TreeCommand::Remove { kind, path });
    }

    for placement in &leftovers {
        planner.emit_unplaceable(placement);
    }

    debug!(
        commands = planner.commands.len(),
        unplaceable = leftovers.len(),
        "computed diff"
    );
    planner.commands
}

/// An updated item that must end up at `to`.
#[derive(Debug, Clone, Copy)]
struct Placement<'u> {
    to: &'u ItemPath,
    item: &'u Item,
    /// The identifier exists in the original view.
    existing: bool,
    update_after_move: bool,
}

struct Planner<'u> {
    sim: PathIndex,
    kinds: HashMap<String, ItemKind>,
    /// Every non-root path of the updated tree.
    targets: HashSet<&'u ItemPath>,
    /// Updated-tree paths already holding their final item.
    settled: HashSet<ItemPath>,
    commands: CommandSequence,
}

impl<'u> Planner<'u> {
    /// Place as many items as possible, returning those that could not be.
    fn place_all(&mut self, mut pending: Vec<Placement<'u>>) -> Vec<Placement<'u>> {
        // Every stalled round parks one occupant, after which the blocked
        // placement can proceed, so this bound is never reached in practice.
        let max_rounds = pending.len().saturating_mul(2).saturating_add(2);

        for _ in 0..max_rounds {
            if pending.is_empty() {
                break;
            }
            let before = pending.len();
            let mut still_pending = Vec::with_capacity(before);
            for placement in pending {
                if !self.try_place(&placement) {
                    still_pending.push(placement);
                }
            }
            pending = still_pending;

            if pending.len() == before && !self.break_cycle(&pending) {
                break;
            }
        }
        pending
    }

    fn try_place(&mut self, placement: &Placement<'u>) -> bool {
        let to = placement.to;
        let Some(parent) = to.parent() else {
            return true;
        };
        if !self.settled.contains(&parent) {
            return false;
        }

        let id = placement.item.id.as_str();
        let current = if placement.existing {
            self.sim.path_of(id).cloned()
        } else {
            None
        };

        if let Some(current) = current {
            if &current != to {
                if self.sim.contains_path(to) || to.is_within(&current) {
                    return false;
                }
                self.sim.move_subtree(&current, to);
                debug!(from = %current, to = %to, id, "planned move");
                self.commands.push(TreeCommand::Move {
                    kind: placement.item.kind(),
                    from: current,
                    to: to.clone(),
                });
            }
            if placement.update_after_move {
                self.commands
                    .push(TreeCommand::update(to.clone(), placement.item.clone()));
            }
        } else {
            if self.sim.contains_path(to) {
                return false;
            }
            self.sim.insert(to.clone(), id.to_string());
            self.kinds.insert(id.to_string(), placement.item.kind());
            debug!(path = %to, id, "planned add");
            self.commands
                .push(TreeCommand::add(to.clone(), placement.item.clone()));
        }

        self.settled.insert(to.clone());
        true
    }

    /// Park the item occupying a ready placement's target under a temporary
    /// sibling name. Returns `false` if no placement is blocked that way.
    fn break_cycle(&mut self, pending: &[Placement<'u>]) -> bool {
        for placement in pending {
            let to = placement.to;
            let Some(parent) = to.parent() else {
                continue;
            };
            if !self.settled.contains(&parent) {
                continue;
            }
            let Some(occupant) = self.sim.id_at(to) else {
                continue;
            };
            if occupant == placement.item.id {
                continue;
            }
            let Some(kind) = self.kinds.get(occupant).copied() else {
                continue;
            };

            let parked = self.temp_sibling(&parent, to.file_name());
            self.sim.move_subtree(to, &parked);
            debug!(from = %to, to = %parked, "parked occupant to break placement cycle");
            self.commands.push(TreeCommand::Move {
                kind,
                from: to.clone(),
                to: parked,
            });
            return true;
        }
        false
    }

    fn temp_sibling(&self, parent: &ItemPath, name: &str) -> ItemPath {
        let mut counter = 1_usize;
        loop {
            let candidate = parent.join(&format!("{name}{TEMP_SUFFIX}{counter}"));
            if !self.sim.contains_path(&candidate) && !self.targets.contains(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Emit a placement that could not be scheduled as-is; replaying it
    /// reports the blocking condition as a conflict.
    fn emit_unplaceable(&mut self, placement: &Placement<'u>) {
        let to = placement.to.clone();
        let current = if placement.existing {
            self.sim.path_of(&placement.item.id).cloned()
        } else {
            None
        };
        match current {
            Some(from) => {
                self.commands.push(TreeCommand::Move {
                    kind: placement.item.kind(),
                    from,
                    to: to.clone(),
                });
                if placement.update_after_move {
                    self.commands
                        .push(TreeCommand::update(to, placement.item.clone()));
                }
            }
            None => self
                .commands
                .push(TreeCommand::add(to, placement.item.clone())),
        }
    }
}

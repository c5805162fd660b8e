//! Cancelling changes both sides already agree on.
//!
//! Two diffs computed against the same baseline can contain the same change
//! (both mirrors renamed a note identically, or both deleted a folder).
//! Replaying such a command on the other side would fail, so it is dropped
//! from both sequences before the merge applies them. The merge also uses
//! the [`Elimination`] record to tell which overlapping pairs are harmless.

use std::collections::HashMap;

use tracing::debug;

use super::command::{CommandSequence, TreeCommand};
use crate::model::ItemPath;

/// Lookup key: variant name plus every path field.
type CommandKey<'a> = (&'static str, Vec<&'a ItemPath>);

fn key(command: &TreeCommand) -> CommandKey<'_> {
    (command.action(), command.touched_paths())
}

/// Which commands of two diffs cancel, and what they cancel against.
///
/// Indices refer to the `a` and `b` sequences passed to
/// [`find_eliminations`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Elimination {
    /// `(a, b)` pairs of commands both sides made identically.
    pub duplicates: Vec<(usize, usize)>,
    /// `(a, b)` pairs where Remove `a` lies inside the subtree removed by `b`.
    pub covered_in_a: Vec<(usize, usize)>,
    /// `(b, a)` pairs where Remove `b` lies inside the subtree removed by `a`.
    pub covered_in_b: Vec<(usize, usize)>,
}

impl Elimination {
    /// True if command `i` of `a` survives elimination.
    #[must_use]
    pub fn keeps_a(&self, i: usize) -> bool {
        !self.duplicates.iter().any(|&(a, _)| a == i)
            && !self.covered_in_a.iter().any(|&(a, _)| a == i)
    }

    /// True if command `j` of `b` survives elimination.
    #[must_use]
    pub fn keeps_b(&self, j: usize) -> bool {
        !self.duplicates.iter().any(|&(_, b)| b == j)
            && !self.covered_in_b.iter().any(|&(b, _)| b == j)
    }

    /// True if `a[i]` and `b[j]` are allowed to touch the same paths: they
    /// cancel each other, one covers the other, or both are changes each
    /// side already made.
    #[must_use]
    pub fn excuses(&self, i: usize, j: usize) -> bool {
        let duplicate_a = self.duplicates.iter().any(|&(a, _)| a == i);
        let duplicate_b = self.duplicates.iter().any(|&(_, b)| b == j);
        (duplicate_a && duplicate_b)
            || self.covered_in_a.contains(&(i, j))
            || self.covered_in_b.contains(&(j, i))
    }

    /// Drop every eliminated command from both sequences.
    #[must_use]
    pub fn apply(
        &self,
        a: CommandSequence,
        b: CommandSequence,
    ) -> (CommandSequence, CommandSequence) {
        let a = a
            .into_iter()
            .enumerate()
            .filter_map(|(i, command)| self.keeps_a(i).then_some(command))
            .collect();
        let b = b
            .into_iter()
            .enumerate()
            .filter_map(|(j, command)| self.keeps_b(j).then_some(command))
            .collect();
        (a, b)
    }
}

/// Drop commands present in both `a` and `b`.
///
/// See [`find_eliminations`] for what counts as present in both.
#[must_use]
pub fn eliminate_duplicates(
    a: CommandSequence,
    b: CommandSequence,
) -> (CommandSequence, CommandSequence) {
    find_eliminations(&a, &b).apply(a, b)
}

/// Work out which commands of `a` and `b` cancel.
///
/// A command is shared when the other side holds one with the same variant,
/// kind and paths and, for Add and Update, a payload with the same
/// identifier and diff fields. Each command cancels at most one counterpart.
///
/// A Remove whose path lies strictly inside a path the other side removes is
/// covered by that removal, unless the other side first moves one of the
/// Remove's ancestors (or the item itself) out of the removed subtree.
#[must_use]
pub fn find_eliminations(a: &[TreeCommand], b: &[TreeCommand]) -> Elimination {
    let mut elimination = Elimination::default();

    let mut index: HashMap<CommandKey<'_>, Vec<usize>> = HashMap::new();
    for (j, command) in b.iter().enumerate() {
        index.entry(key(command)).or_default().push(j);
    }

    for (i, command) in a.iter().enumerate() {
        let Some(candidates) = index.get_mut(&key(command)) else {
            continue;
        };
        if let Some(pos) = candidates
            .iter()
            .position(|&j| command.structurally_eq(&b[j]))
        {
            let j = candidates.swap_remove(pos);
            elimination.duplicates.push((i, j));
            debug!(command = %command, "eliminated duplicate command");
        }
    }

    for (i, j) in covered_removes(a, b) {
        if !elimination.duplicates.iter().any(|&(own, _)| own == i) {
            elimination.covered_in_a.push((i, j));
        }
    }
    for (j, i) in covered_removes(b, a) {
        if !elimination.duplicates.iter().any(|&(_, own)| own == j) {
            elimination.covered_in_b.push((j, i));
        }
    }
    elimination
}

/// `(own, other)` index pairs of Removes in `commands` covered by a Remove
/// in `other`.
fn covered_removes(commands: &[TreeCommand], other: &[TreeCommand]) -> Vec<(usize, usize)> {
    let mut covered = Vec::new();
    for (i, command) in commands.iter().enumerate() {
        let TreeCommand::Remove { path, .. } = command else {
            continue;
        };
        let covering = other.iter().position(|candidate| match candidate {
            TreeCommand::Remove { path: removed, .. } => {
                removed != path && path.is_within(removed) && !rescued(path, removed, other)
            }
            TreeCommand::Add { .. } | TreeCommand::Update { .. } | TreeCommand::Move { .. } => {
                false
            }
        });
        if let Some(k) = covering {
            debug!(path = %path, "dropped remove covered by the other side");
            covered.push((i, k));
        }
    }
    covered
}

/// True if `other` moves `path` or one of its ancestors below `removed` out
/// of the way before removing it.
fn rescued(path: &ItemPath, removed: &ItemPath, other: &[TreeCommand]) -> bool {
    other.iter().any(|command| match command {
        TreeCommand::Move { from, .. } => from.is_within(removed) && path.is_within(from),
        TreeCommand::Add { .. } | TreeCommand::Update { .. } | TreeCommand::Remove { .. } => {
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, ItemKind};

    fn p(raw: &str) -> ItemPath {
        ItemPath::new(raw)
    }

    fn mv(from: &str, to: &str) -> TreeCommand {
        TreeCommand::Move {
            kind: ItemKind::Note,
            from: p(from),
            to: p(to),
        }
    }

    fn rm(path: &str, kind: ItemKind) -> TreeCommand {
        TreeCommand::Remove {
            kind,
            path: p(path),
        }
    }

    #[test]
    fn identical_sequences_cancel_completely() {
        let commands = vec![
            TreeCommand::add(p("a.md"), Item::note("a", "a", "x")),
            mv("b.md", "c.md"),
            rm("d", ItemKind::Folder),
        ];
        let (a, b) = eliminate_duplicates(commands.clone(), commands);
        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    fn distinct_commands_survive_in_order() {
        let a = vec![mv("x.md", "y.md"), mv("one.md", "two.md")];
        let b = vec![mv("x.md", "z.md"), mv("one.md", "two.md")];
        let (a, b) = eliminate_duplicates(a, b);
        assert_eq!(a, vec![mv("x.md", "y.md")]);
        assert_eq!(b, vec![mv("x.md", "z.md")]);
    }

    #[test]
    fn payload_differences_prevent_elimination() {
        let a = vec![TreeCommand::update(p("n.md"), Item::note("n", "n", "left"))];
        let b = vec![TreeCommand::update(p("n.md"), Item::note("n", "n", "right"))];
        let (a2, b2) = eliminate_duplicates(a.clone(), b.clone());
        assert_eq!(a2, a);
        assert_eq!(b2, b);
    }

    #[test]
    fn each_command_cancels_once() {
        let a = vec![mv("x.md", "y.md"), mv("x.md", "y.md")];
        let b = vec![mv("x.md", "y.md")];
        let (a, b) = eliminate_duplicates(a, b);
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }

    #[test]
    fn nested_remove_is_covered_by_outer_remove() {
        let a = vec![rm("folder", ItemKind::Folder)];
        let b = vec![rm("folder/n.md", ItemKind::Note), mv("k.md", "l.md")];
        let (a, b) = eliminate_duplicates(a, b);
        assert_eq!(a, vec![rm("folder", ItemKind::Folder)]);
        assert_eq!(b, vec![mv("k.md", "l.md")]);
    }

    #[test]
    fn nested_remove_survives_when_its_ancestor_moves_out() {
        let a = vec![
            TreeCommand::Move {
                kind: ItemKind::Folder,
                from: p("c/a"),
                to: p("a"),
            },
            rm("c", ItemKind::Folder),
        ];
        let b = vec![rm("c/a/n.md", ItemKind::Note)];
        let elimination = find_eliminations(&a, &b);
        assert!(elimination.covered_in_b.is_empty());
        let (a2, b2) = eliminate_duplicates(a.clone(), b.clone());
        assert_eq!(a2, a);
        assert_eq!(b2, b);
    }

    #[test]
    fn covered_and_duplicate_pairs_are_excused() {
        let a = vec![mv("x.md", "y.md"), rm("folder", ItemKind::Folder)];
        let b = vec![rm("folder/n.md", ItemKind::Note), mv("x.md", "y.md")];
        let elimination = find_eliminations(&a, &b);
        assert_eq!(elimination.duplicates, vec![(0, 1)]);
        assert_eq!(elimination.covered_in_b, vec![(0, 1)]);
        assert!(elimination.excuses(0, 1));
        assert!(elimination.excuses(1, 0));
        assert!(!elimination.excuses(0, 0));
        assert!(elimination.keeps_a(1));
        assert!(!elimination.keeps_b(0));
    }
}

//! Three-way merge of a journal baseline with a local and a remote tree.
//!
//! # Merge semantics
//!
//! Both live trees are diffed against the journal. Changes both sides made
//! identically cancel out. What remains of the local diff is replayed onto
//! the remote tree and vice versa, so on success both trees hold the same
//! content and the merged state becomes the next journal baseline.
//!
//! The merge never resolves a genuine conflict by itself. Commands from
//! both sides that touch the same path are reported before anything is
//! applied; commands that fail during replay are collected. Either way the
//! result is [`MergeError::Conflicts`] carrying both lists, and a sync pass
//! leaves the journal untouched.

use std::fmt::Write as _;

use serde::Serialize;
use tracing::{info, warn};

use crate::diff::{Conflict, Elimination, TreeCommand, apply_commands, diff, find_eliminations};
use crate::error::ErrorCode;
use crate::journal::{JournalError, JournalStore, JournalTree};
use crate::model::ItemPath;
use crate::tree::{ActionListener, ItemTree, TreeView};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Outcome of a clean merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Remote-side commands replayed onto the local tree.
    pub local_applied: usize,
    /// Local-side commands replayed onto the remote tree.
    pub remote_applied: usize,
    /// Commands dropped because both sides already made the change.
    pub eliminated: usize,
}

/// Why a merge did not complete.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// `local` lists conflicts on the local tree (remote commands that could
    /// not be applied there); `remote` the reverse. `preflight` is true when
    /// the overlap check stopped the merge before any command was applied.
    #[error("{}", describe_conflicts(.local, .remote, *.preflight))]
    Conflicts {
        local: Vec<Conflict>,
        remote: Vec<Conflict>,
        preflight: bool,
    },
}

impl MergeError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Conflicts { .. } => ErrorCode::MergeConflict,
        }
    }
}

fn describe_conflicts(local: &[Conflict], remote: &[Conflict], preflight: bool) -> String {
    let mut out = format!(
        "merge {} with {} local and {} remote conflict(s)",
        if preflight { "refused" } else { "aborted" },
        local.len(),
        remote.len()
    );
    for (side, conflicts) in [("local", local), ("remote", remote)] {
        for conflict in conflicts {
            let _ = write!(out, "\n  [{side}] {}", conflict.message);
        }
    }
    out
}

/// Errors from a full sync pass.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("journal store failed: {0:#}")]
    Store(#[source] anyhow::Error),
}

impl SyncError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Journal(err) => err.code(),
            Self::Merge(err) => err.code(),
            Self::Store(_) => ErrorCode::JournalStoreFailed,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Merge `local` and `remote` against the `journal` baseline.
///
/// Local-side changes are applied to `remote` through `remote_listener`
/// first, then remote-side changes to `local` through `local_listener`.
///
/// # Errors
///
/// Returns [`MergeError::Conflicts`] if the two sides touch the same paths
/// (nothing is applied in that case) or if any command fails to apply.
pub fn merge_trees<V, LL, RL>(
    journal: &V,
    local: &mut ItemTree,
    remote: &mut ItemTree,
    local_listener: &mut LL,
    remote_listener: &mut RL,
) -> Result<MergeReport, MergeError>
where
    V: TreeView,
    LL: ActionListener + ?Sized,
    RL: ActionListener + ?Sized,
{
    let local_diff = diff(journal, local);
    let remote_diff = diff(journal, remote);
    let raw_len = local_diff.len() + remote_diff.len();

    let elimination = find_eliminations(&local_diff, &remote_diff);

    let (on_remote, on_local) = overlapping(&local_diff, &remote_diff, &elimination);
    if !on_local.is_empty() || !on_remote.is_empty() {
        warn!(
            local = on_local.len(),
            remote = on_remote.len(),
            "merge refused: both sides changed the same paths"
        );
        return Err(MergeError::Conflicts {
            local: on_local,
            remote: on_remote,
            preflight: true,
        });
    }

    let (local_diff, remote_diff) = elimination.apply(local_diff, remote_diff);
    let eliminated = raw_len - local_diff.len() - remote_diff.len();

    let remote_conflicts = apply_commands(&local_diff, remote, remote_listener);
    let local_conflicts = apply_commands(&remote_diff, local, local_listener);

    if !local_conflicts.is_empty() || !remote_conflicts.is_empty() {
        warn!(
            local = local_conflicts.len(),
            remote = remote_conflicts.len(),
            "merge aborted with conflicts"
        );
        return Err(MergeError::Conflicts {
            local: local_conflicts,
            remote: remote_conflicts,
            preflight: false,
        });
    }

    let report = MergeReport {
        local_applied: remote_diff.len(),
        remote_applied: local_diff.len(),
        eliminated,
    };
    info!(
        local_applied = report.local_applied,
        remote_applied = report.remote_applied,
        eliminated = report.eliminated,
        "merged trees"
    );
    Ok(report)
}

/// Load the journal for `mirror_id`, merge, and on success replace the
/// journal with the merged local tree.
///
/// # Errors
///
/// Returns [`SyncError`] if the journal cannot be loaded or is malformed,
/// if the merge conflicts, or if the new journal cannot be stored. The
/// journal is only written after a clean merge.
pub fn run_sync_pass<S, LL, RL>(
    store: &mut S,
    mirror_id: &str,
    local: &mut ItemTree,
    remote: &mut ItemTree,
    local_listener: &mut LL,
    remote_listener: &mut RL,
) -> Result<MergeReport, SyncError>
where
    S: JournalStore + ?Sized,
    LL: ActionListener + ?Sized,
    RL: ActionListener + ?Sized,
{
    let entries = store.load_all(mirror_id).map_err(SyncError::Store)?;
    let journal = JournalTree::from_entries(mirror_id, entries)?;

    let report = merge_trees(&journal, local, remote, local_listener, remote_listener)?;

    let snapshot = JournalTree::snapshot(mirror_id, local);
    store
        .replace_all(mirror_id, &snapshot)
        .map_err(SyncError::Store)?;
    info!(mirror_id, entries = snapshot.len(), "sync pass complete");
    Ok(report)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Paths a command makes unavailable to the other side: everything below a
/// removed path or a move source.
fn vacated(command: &TreeCommand) -> Option<&ItemPath> {
    match command {
        TreeCommand::Remove { path, .. } => Some(path),
        TreeCommand::Move { from, .. } => Some(from),
        TreeCommand::Add { .. } | TreeCommand::Update { .. } => None,
    }
}

fn collides(a: &TreeCommand, b: &TreeCommand) -> bool {
    let a_paths = a.touched_paths();
    let b_paths = b.touched_paths();
    if a_paths.iter().any(|path| b_paths.contains(path)) {
        return true;
    }
    let inside = |paths: &[&ItemPath], vacated: Option<&ItemPath>| {
        vacated.is_some_and(|root| paths.iter().any(|path| path.is_within(root)))
    };
    inside(&a_paths, vacated(b)) || inside(&b_paths, vacated(a))
}

/// Commands of each side that collide with any command of the other side.
/// The first list holds local commands (they would have been applied to the
/// remote tree), the second remote commands.
///
/// Runs over the diffs before elimination so a cancelled command still
/// guards the paths it touched. Pairs the elimination excuses are skipped.
fn overlapping(
    local_diff: &[TreeCommand],
    remote_diff: &[TreeCommand],
    elimination: &Elimination,
) -> (Vec<Conflict>, Vec<Conflict>) {
    let describe = |command: &TreeCommand, other: &TreeCommand| Conflict {
        command: command.clone(),
        message: format!("{command}: the other side also changed this path ({other})"),
        code: ErrorCode::MergeConflict.code().to_string(),
    };

    let mut on_remote = Vec::new();
    for (i, command) in local_diff.iter().enumerate() {
        if let Some(other) = remote_diff
            .iter()
            .enumerate()
            .find(|&(j, other)| !elimination.excuses(i, j) && collides(command, other))
            .map(|(_, other)| other)
        {
            on_remote.push(describe(command, other));
        }
    }
    let mut on_local = Vec::new();
    for (j, command) in remote_diff.iter().enumerate() {
        if let Some(other) = local_diff
            .iter()
            .enumerate()
            .find(|&(i, other)| !elimination.excuses(i, j) && collides(command, other))
            .map(|(_, other)| other)
        {
            on_local.push(describe(command, other));
        }
    }
    (on_remote, on_local)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Invariant checks run after every simulated edit round and sync pass.

use std::fmt;

use notemirror_core::diff::{TreeCommand, apply_commands, diff, eliminate_duplicates};
use notemirror_core::journal::{JournalEntry, JournalTree};
use notemirror_core::tree::{ItemTree, NoopListener, TreeView};

// ── Core result types ─────────────────────────────────────────────────────────

/// Oracle result for one or more invariant checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn fail(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: false,
            violations,
        }
    }

    /// Merge another result into this one (failures accumulate).
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }

    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        if violations.is_empty() {
            Self::pass()
        } else {
            Self::fail(violations)
        }
    }
}

/// Which side of the mirror a check looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

// ── Invariant violation diagnostics ──────────────────────────────────────────

/// Diagnostic information for a single failed invariant check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Replaying a side's diff onto the baseline raised conflicts.
    ReplayConflict { side: Side, messages: Vec<String> },

    /// Replaying a side's diff onto the baseline did not reproduce the side.
    ReplayDiverged {
        side: Side,
        remaining: Vec<TreeCommand>,
    },

    /// A diff did not cancel completely against itself.
    SelfCancellation { side: Side, leftover: usize },

    /// The two sides differ after a merge reported success.
    SidesDiverged { remaining: Vec<TreeCommand> },

    /// The stored journal does not describe the merged tree.
    JournalStale { remaining: Vec<TreeCommand> },

    /// The stored journal changed even though the merge failed.
    JournalWrittenOnFailure { before: usize, after: usize },

    /// A merge of edits confined to disjoint folders failed.
    UnexpectedConflict { message: String },

    /// A tree's internal indexes disagree.
    Inconsistent { side: Side, detail: String },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplayConflict { side, messages } => {
                write!(f, "ReplayConflict: {side} replay raised {messages:?}")
            }
            Self::ReplayDiverged { side, remaining } => write!(
                f,
                "ReplayDiverged: {side} replay is {} command(s) short: {}",
                remaining.len(),
                describe(remaining)
            ),
            Self::SelfCancellation { side, leftover } => write!(
                f,
                "SelfCancellation: {side} diff left {leftover} command(s) against itself"
            ),
            Self::SidesDiverged { remaining } => write!(
                f,
                "SidesDiverged: sides differ after merge: {}",
                describe(remaining)
            ),
            Self::JournalStale { remaining } => write!(
                f,
                "JournalStale: journal differs from merged tree: {}",
                describe(remaining)
            ),
            Self::JournalWrittenOnFailure { before, after } => write!(
                f,
                "JournalWrittenOnFailure: {before} entries before, {after} after a failed merge"
            ),
            Self::UnexpectedConflict { message } => {
                write!(f, "UnexpectedConflict: {message}")
            }
            Self::Inconsistent { side, detail } => {
                write!(f, "Inconsistent: {side} tree: {detail}")
            }
        }
    }
}

fn describe(commands: &[TreeCommand]) -> String {
    commands
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ── Oracle ───────────────────────────────────────────────────────────────────

/// Stateless invariant checkers for mirror sync.
pub struct MirrorOracle;

impl MirrorOracle {
    /// A side's diff from `baseline` replays cleanly and reproduces it, and
    /// cancels completely against itself.
    #[must_use]
    pub fn check_replay(side: Side, baseline: &ItemTree, edited: &ItemTree) -> OracleResult {
        let commands = diff(baseline, edited);
        let mut violations = Vec::new();

        let mut replay = baseline.clone();
        let conflicts = apply_commands(&commands, &mut replay, &mut NoopListener);
        if !conflicts.is_empty() {
            violations.push(InvariantViolation::ReplayConflict {
                side,
                messages: conflicts.into_iter().map(|c| c.message).collect(),
            });
        }
        let remaining = diff(&replay, edited);
        if !remaining.is_empty() {
            violations.push(InvariantViolation::ReplayDiverged { side, remaining });
        }

        let (a, b) = eliminate_duplicates(commands.clone(), commands);
        if !a.is_empty() || !b.is_empty() {
            violations.push(InvariantViolation::SelfCancellation {
                side,
                leftover: a.len() + b.len(),
            });
        }

        OracleResult::from_violations(violations)
    }

    /// Both sides hold the same items at the same paths.
    #[must_use]
    pub fn check_convergence(local: &ItemTree, remote: &ItemTree) -> OracleResult {
        let remaining = diff(local, remote);
        if remaining.is_empty() {
            OracleResult::pass()
        } else {
            OracleResult::fail(vec![InvariantViolation::SidesDiverged { remaining }])
        }
    }

    /// The stored entries describe `merged` exactly.
    #[must_use]
    pub fn check_journal(
        mirror_id: &str,
        entries: Vec<JournalEntry>,
        merged: &ItemTree,
    ) -> OracleResult {
        let journal = match JournalTree::from_entries(mirror_id, entries) {
            Ok(journal) => journal,
            Err(err) => {
                return OracleResult::fail(vec![InvariantViolation::Inconsistent {
                    side: Side::Local,
                    detail: format!("stored journal rejected: {err}"),
                }]);
            }
        };
        let remaining = diff(&journal, merged);
        if remaining.is_empty() {
            OracleResult::pass()
        } else {
            OracleResult::fail(vec![InvariantViolation::JournalStale { remaining }])
        }
    }

    /// The tree's path index, id index and item store agree, and its view
    /// lists every item once.
    #[must_use]
    pub fn check_consistency(side: Side, tree: &ItemTree) -> OracleResult {
        if let Err(err) = tree.check_rep() {
            return OracleResult::fail(vec![InvariantViolation::Inconsistent {
                side,
                detail: err.to_string(),
            }]);
        }
        let listed = tree.entries().count();
        if listed == tree.len() {
            OracleResult::pass()
        } else {
            OracleResult::fail(vec![InvariantViolation::Inconsistent {
                side,
                detail: format!("view lists {listed} of {} items", tree.len()),
            }])
        }
    }
}

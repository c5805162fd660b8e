//! Replaying a command sequence against a tree.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::command::TreeCommand;
use crate::error::ErrorCode;
use crate::tree::{ActionListener, ItemTree, TreeError};

/// A command that could not be applied, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub command: TreeCommand,
    pub message: String,
    /// Machine-readable code of the underlying tree error.
    pub code: String,
}

impl Conflict {
    fn from_error(command: &TreeCommand, error: &TreeError) -> Self {
        let code: ErrorCode = error.code();
        Self {
            command: command.clone(),
            message: format!("{command}: {error}"),
            code: code.code().to_string(),
        }
    }
}

/// Apply `commands` to `tree` in order, routing side effects to `listener`.
///
/// Application never stops early: a command that fails becomes a
/// [`Conflict`] and the next command is tried. An empty result means every
/// command applied cleanly.
pub fn apply_commands<L: ActionListener + ?Sized>(
    commands: &[TreeCommand],
    tree: &mut ItemTree,
    listener: &mut L,
) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for command in commands {
        let outcome = match command {
            TreeCommand::Add { path, item, .. } => tree.add_item_at(path, item.clone(), listener),
            TreeCommand::Update { path, item, .. } => tree.update(path, item.clone(), listener),
            TreeCommand::Move { from, to, .. } => tree.move_item(from, to, listener),
            TreeCommand::Remove { path, .. } => tree.delete_at_path(path, listener),
        };

        match outcome {
            Ok(()) => debug!(command = %command, "applied command"),
            Err(error) => {
                warn!(command = %command, code = %error.code(), error = %error, "command conflicted");
                conflicts.push(Conflict::from_error(command, &error));
            }
        }
    }

    conflicts
}

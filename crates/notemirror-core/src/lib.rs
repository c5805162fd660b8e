//! notemirror-core library.
//!
//! Keeps a note collection and an independently edited mirror of it in
//! step. Both sides are loaded into [`tree::ItemTree`]s, diffed against the
//! last agreed [`journal`] state, and merged; changes are pushed to either
//! side through [`tree::ActionListener`] callbacks.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per module with an [`error::ErrorCode`];
//!   `anyhow::Result` at capability seams (listeners, sources, stores).
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod config;
pub mod diff;
pub mod error;
pub mod fill;
pub mod journal;
pub mod merge;
pub mod model;
pub mod tree;

pub use config::{MirrorConfig, load_config};
pub use diff::{
    CommandSequence, Conflict, Elimination, TreeCommand, apply_commands, diff, eliminate_duplicates,
    find_eliminations,
};
pub use error::ErrorCode;
pub use fill::{ItemSource, MemoryItemSource, build_tree, fill_tree};
pub use journal::{JournalEntry, JournalError, JournalStore, JournalTree, SqliteJournal};
pub use merge::{MergeError, MergeReport, SyncError, merge_trees, run_sync_pass};
pub use model::{Item, ItemContent, ItemKind, ItemPath};
pub use tree::{ActionListener, ItemTree, NoopListener, TreeError, TreeView};

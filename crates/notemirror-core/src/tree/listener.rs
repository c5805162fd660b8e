//! Side-effect capability passed into every tree mutation.
//!
//! A tree only rearranges its in-memory index. Whatever the change means for
//! a real medium (a file written, a row inserted) is performed by the
//! [`ActionListener`] the caller hands to the mutation. Dry runs and tree
//! construction use [`NoopListener`].

use crate::model::{Item, ItemPath};

/// An item is about to be inserted at `path`.
#[derive(Debug, Clone, Copy)]
pub struct AddEvent<'a> {
    pub path: &'a ItemPath,
    pub item: &'a Item,
}

/// The content of the item at `path` was replaced.
#[derive(Debug, Clone, Copy)]
pub struct UpdateEvent<'a> {
    pub path: &'a ItemPath,
    pub item: &'a Item,
}

/// The subtree rooted at `from` now lives at `to`. `item` carries its new
/// parent identifier.
#[derive(Debug, Clone, Copy)]
pub struct MoveEvent<'a> {
    pub from: &'a ItemPath,
    pub to: &'a ItemPath,
    pub item: &'a Item,
}

/// The subtree rooted at `path` was removed. `removed` counts the item and
/// all of its descendants.
#[derive(Debug, Clone, Copy)]
pub struct RemoveEvent<'a> {
    pub path: &'a ItemPath,
    pub item: &'a Item,
    pub removed: usize,
}

/// Callbacks that mirror tree mutations into a backing store.
///
/// `on_add` runs before the item is inserted and may return a replacement
/// (for instance one carrying a store-assigned identifier). The other
/// callbacks run after the structural change; if they fail the tree undoes
/// the change before reporting the error.
pub trait ActionListener {
    /// # Errors
    ///
    /// Any error aborts the insertion.
    fn on_add(&mut self, event: &AddEvent<'_>) -> anyhow::Result<Option<Item>>;

    /// # Errors
    ///
    /// Any error reverts the update.
    fn on_update(&mut self, event: &UpdateEvent<'_>) -> anyhow::Result<()>;

    /// # Errors
    ///
    /// Any error reverts the move.
    fn on_move(&mut self, event: &MoveEvent<'_>) -> anyhow::Result<()>;

    /// # Errors
    ///
    /// Any error restores the removed subtree.
    fn on_remove(&mut self, event: &RemoveEvent<'_>) -> anyhow::Result<()>;
}

/// Listener that performs no side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl ActionListener for NoopListener {
    fn on_add(&mut self, _event: &AddEvent<'_>) -> anyhow::Result<Option<Item>> {
        Ok(None)
    }

    fn on_update(&mut self, _event: &UpdateEvent<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_move(&mut self, _event: &MoveEvent<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_remove(&mut self, _event: &RemoveEvent<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// One side effect observed by a [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedAction {
    Add { path: ItemPath, id: String },
    Update { path: ItemPath, id: String },
    Move { from: ItemPath, to: ItemPath, id: String },
    Remove { path: ItemPath, id: String, removed: usize },
}

/// Listener that records every callback in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    pub actions: Vec<RecordedAction>,
}

impl ActionListener for RecordingListener {
    fn on_add(&mut self, event: &AddEvent<'_>) -> anyhow::Result<Option<Item>> {
        self.actions.push(RecordedAction::Add {
            path: event.path.clone(),
            id: event.item.id.clone(),
        });
        Ok(None)
    }

    fn on_update(&mut self, event: &UpdateEvent<'_>) -> anyhow::Result<()> {
        self.actions.push(RecordedAction::Update {
            path: event.path.clone(),
            id: event.item.id.clone(),
        });
        Ok(())
    }

    fn on_move(&mut self, event: &MoveEvent<'_>) -> anyhow::Result<()> {
        self.actions.push(RecordedAction::Move {
            from: event.from.clone(),
            to: event.to.clone(),
            id: event.item.id.clone(),
        });
        Ok(())
    }

    fn on_remove(&mut self, event: &RemoveEvent<'_>) -> anyhow::Result<()> {
        self.actions.push(RecordedAction::Remove {
            path: event.path.clone(),
            id: event.item.id.clone(),
            removed: event.removed,
        });
        Ok(())
    }
}

impl<L: ActionListener + ?Sized> ActionListener for &mut L {
    fn on_add(&mut self, event: &AddEvent<'_>) -> anyhow::Result<Option<Item>> {
        (**self).on_add(event)
    }

    fn on_update(&mut self, event: &UpdateEvent<'_>) -> anyhow::Result<()> {
        (**self).on_update(event)
    }

    fn on_move(&mut self, event: &MoveEvent<'_>) -> anyhow::Result<()> {
        (**self).on_move(event)
    }

    fn on_remove(&mut self, event: &RemoveEvent<'_>) -> anyhow::Result<()> {
        (**self).on_remove(event)
    }
}

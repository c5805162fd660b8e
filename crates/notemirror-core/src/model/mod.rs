//! Item model shared by trees, journals and commands.

pub mod item;
pub mod path;

pub use item::{DiffFields, Item, ItemContent, ItemKind, RESOURCES_DIR_ID};
pub use path::ItemPath;

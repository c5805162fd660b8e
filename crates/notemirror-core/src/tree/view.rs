//! Read-only tree capability consumed by the diff engine.

use crate::model::{Item, ItemKind, ItemPath};

/// What a view knows about an entry's diffable content.
#[derive(Debug, Clone, Copy)]
pub enum Fields<'a> {
    /// A full item is available; compare field by field.
    Item(&'a Item),
    /// Only the stored fingerprint is available (journal views).
    Fingerprint(&'a str),
}

impl Fields<'_> {
    /// True if `item` carries the same diff fields as this entry.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Self::Item(existing) => existing.diff_fields() == item.diff_fields(),
            Self::Fingerprint(hash) => *hash == item.fingerprint(),
        }
    }
}

/// One non-root entry of a tree view.
#[derive(Debug, Clone, Copy)]
pub struct ViewEntry<'a> {
    pub path: &'a ItemPath,
    pub id: &'a str,
    pub kind: ItemKind,
    pub fields: Fields<'a>,
}

/// The query surface shared by item trees and journal trees.
///
/// Views never expose their root: the root is the fixed anchor both sides of
/// a diff share and is never itself diffed.
pub trait TreeView {
    fn has_path(&self, path: &ItemPath) -> bool;

    fn entry_at(&self, path: &ItemPath) -> Option<ViewEntry<'_>>;

    /// All non-root entries in a deterministic order.
    fn entries(&self) -> impl Iterator<Item = ViewEntry<'_>>;
}

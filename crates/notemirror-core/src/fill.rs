//! Populating an item tree from the note collection.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::MirrorConfig;
use crate::model::{Item, ItemKind, ItemPath};
use crate::tree::{ItemTree, NoopListener};

/// Hierarchical read access to the note collection.
///
/// Implementations may return soft-deleted items; [`fill_tree`] skips them.
pub trait ItemSource {
    /// Folders whose parent is `parent_id` (empty for top level).
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    fn child_folders(&self, parent_id: &str) -> Result<Vec<Item>>;

    /// Notes whose parent is `parent_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    fn child_notes(&self, parent_id: &str) -> Result<Vec<Item>>;

    /// Resources referenced from `note`'s body.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    fn linked_resources(&self, note: &Item) -> Result<Vec<Item>>;
}

/// An [`ItemSource`] over items held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryItemSource {
    items: Vec<Item>,
    links: HashMap<String, Vec<String>>,
}

impl MemoryItemSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item. Folders and notes are found through their `parent_id`.
    pub fn insert(&mut self, item: Item) -> &mut Self {
        self.items.push(item);
        self
    }

    /// Record that `note_id`'s body references `resource_id`.
    pub fn link(&mut self, note_id: &str, resource_id: &str) -> &mut Self {
        self.links
            .entry(note_id.to_string())
            .or_default()
            .push(resource_id.to_string());
        self
    }

    fn children(&self, parent_id: &str, kind: ItemKind) -> Vec<Item> {
        self.items
            .iter()
            .filter(|item| item.kind() == kind && item.parent_id == parent_id)
            .cloned()
            .collect()
    }
}

impl ItemSource for MemoryItemSource {
    fn child_folders(&self, parent_id: &str) -> Result<Vec<Item>> {
        Ok(self.children(parent_id, ItemKind::Folder))
    }

    fn child_notes(&self, parent_id: &str) -> Result<Vec<Item>> {
        Ok(self.children(parent_id, ItemKind::Note))
    }

    fn linked_resources(&self, note: &Item) -> Result<Vec<Item>> {
        let Some(ids) = self.links.get(&note.id) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.items
                    .iter()
                    .find(|item| &item.id == id && item.kind() == ItemKind::Resource)
                    .cloned()
            })
            .collect())
    }
}

/// Build a fresh tree rooted at the configured base folder.
///
/// # Errors
///
/// See [`fill_tree`].
pub fn build_tree<S: ItemSource + ?Sized>(source: &S, config: &MirrorConfig) -> Result<ItemTree> {
    let mut tree = ItemTree::new(Item::root(config.base_folder_id.as_str()));
    fill_tree(&mut tree, source, config)?;
    Ok(tree)
}

/// Add the virtual resources container and every live folder, note and
/// linked resource below `tree`'s root.
///
/// Each note's resources are added (once, oldest first) just before the
/// note itself.
///
/// # Errors
///
/// Fails if the source cannot be read or an item cannot be placed.
pub fn fill_tree<S: ItemSource + ?Sized>(
    tree: &mut ItemTree,
    source: &S,
    config: &MirrorConfig,
) -> Result<()> {
    let resources = ItemPath::root().join(&config.resources_dir);
    tree.add_item_at(
        &resources,
        Item::resources_dir(config.resources_dir.as_str()),
        &mut NoopListener,
    )
    .context("add resources container")?;

    let root_id = tree.root().id.clone();
    let mut filler = Filler {
        tree,
        source,
        resources,
    };
    filler.fill_folder(&ItemPath::root(), &root_id)?;

    debug!(items = filler.tree.len(), "filled tree");
    Ok(())
}

struct Filler<'a, S: ?Sized> {
    tree: &'a mut ItemTree,
    source: &'a S,
    resources: ItemPath,
}

impl<S: ItemSource + ?Sized> Filler<'_, S> {
    fn fill_folder(&mut self, path: &ItemPath, folder_id: &str) -> Result<()> {
        let mut folders = self
            .source
            .child_folders(folder_id)
            .with_context(|| format!("list folders under {path}"))?;
        sort_by_title(&mut folders);
        for folder in folders.into_iter().filter(|f| !f.is_deleted()) {
            let id = folder.id.clone();
            let child = self
                .tree
                .add_item_to(path, folder, &mut NoopListener)
                .with_context(|| format!("add folder {id}"))?;
            self.fill_folder(&child, &id)?;
        }

        let mut notes = self
            .source
            .child_notes(folder_id)
            .with_context(|| format!("list notes under {path}"))?;
        sort_by_title(&mut notes);
        for note in notes.into_iter().filter(|n| !n.is_deleted()) {
            self.add_resources_for(&note)?;
            let id = note.id.clone();
            self.tree
                .add_item_to(path, note, &mut NoopListener)
                .with_context(|| format!("add note {id}"))?;
        }
        Ok(())
    }

    fn add_resources_for(&mut self, note: &Item) -> Result<()> {
        let mut resources = self
            .source
            .linked_resources(note)
            .with_context(|| format!("resolve resources of note {}", note.id))?;
        resources.sort_by_key(|r| (r.created_time, r.updated_time));

        for resource in resources {
            if resource.is_deleted() || self.tree.has_id(&resource.id) {
                continue;
            }
            let id = resource.id.clone();
            self.tree
                .add_item_to(&self.resources, resource, &mut NoopListener)
                .with_context(|| format!("add resource {id}"))?;
        }
        Ok(())
    }
}

fn sort_by_title(items: &mut [Item]) {
    items.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RESOURCES_DIR_ID;

    fn p(raw: &str) -> ItemPath {
        ItemPath::new(raw)
    }

    fn sample_source() -> MemoryItemSource {
        let mut deleted_folder = Item::folder("f-gone", "Gone");
        deleted_folder.deleted_time = 10;
        let mut deleted_note = Item::note("n-gone", "Gone", "");
        deleted_note.deleted_time = 10;

        let mut source = MemoryItemSource::new();
        source
            .insert(Item::folder("f-work", "Work"))
            .insert(Item::folder("f-sub", "Sub").with_parent("f-work"))
            .insert(deleted_folder)
            .insert(Item::note("n-1", "Plan", "see diagram").with_parent("f-work"))
            .insert(Item::note("n-2", "Todo", "same diagram").with_parent("f-sub"))
            .insert(deleted_note.with_parent("f-work"))
            .insert(Item::resource("r-new", "diagram", "image/png", Some("png")).with_created_time(20))
            .insert(Item::resource("r-old", "photo", "image/jpeg", Some("jpg")).with_created_time(5))
            .link("n-1", "r-new")
            .link("n-1", "r-old")
            .link("n-2", "r-new");
        source
    }

    #[test]
    fn fills_folders_notes_and_resources() {
        let tree = build_tree(&sample_source(), &MirrorConfig::new("m")).expect("fill");
        tree.check_rep().expect("consistent");

        assert_eq!(tree.path_from_id("f-work").expect("path"), &p("Work"));
        assert_eq!(tree.path_from_id("f-sub").expect("path"), &p("Work/Sub"));
        assert_eq!(tree.path_from_id("n-1").expect("path"), &p("Work/Plan.md"));
        assert_eq!(tree.path_from_id("n-2").expect("path"), &p("Work/Sub/Todo.md"));
        assert_eq!(
            tree.path_from_id("r-new").expect("path"),
            &p("resources/diagram.png")
        );
        assert_eq!(
            tree.get_by_id("r-old").expect("resource").parent_id,
            RESOURCES_DIR_ID
        );
        assert!(tree.get_by_id(RESOURCES_DIR_ID).expect("container").is_virtual);
    }

    #[test]
    fn skips_deleted_items() {
        let tree = build_tree(&sample_source(), &MirrorConfig::new("m")).expect("fill");
        assert!(!tree.has_id("f-gone"));
        assert!(!tree.has_id("n-gone"));
        // resources container, 2 folders, 2 notes, 2 resources
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn older_resource_claims_the_shared_name() {
        let mut source = MemoryItemSource::new();
        source
            .insert(Item::note("n", "Scan", ""))
            .insert(Item::resource("r-late", "img", "image/png", Some("png")).with_created_time(9))
            .insert(Item::resource("r-early", "img", "image/png", Some("png")).with_created_time(1))
            .link("n", "r-late")
            .link("n", "r-early");

        let tree = build_tree(&source, &MirrorConfig::new("m")).expect("fill");
        assert_eq!(
            tree.path_from_id("r-early").expect("path"),
            &p("resources/img.png")
        );
        assert_eq!(
            tree.path_from_id("r-late").expect("path"),
            &p("resources/img (1).png")
        );
    }

    #[test]
    fn custom_resources_dir_and_base_folder() {
        let mut config = MirrorConfig::new("m");
        config.resources_dir = "_res".into();
        config.base_folder_id = "f-work".into();
        let tree = build_tree(&sample_source(), &config).expect("fill");

        assert_eq!(tree.path_from_id("n-1").expect("path"), &p("Plan.md"));
        assert_eq!(tree.path_from_id("f-sub").expect("path"), &p("Sub"));
        assert!(tree.has_path(&p("_res/photo.jpg")));
    }

    #[test]
    fn source_errors_propagate() {
        struct Broken;
        impl ItemSource for Broken {
            fn child_folders(&self, _parent_id: &str) -> Result<Vec<Item>> {
                anyhow::bail!("database locked")
            }
            fn child_notes(&self, _parent_id: &str) -> Result<Vec<Item>> {
                Ok(Vec::new())
            }
            fn linked_resources(&self, _note: &Item) -> Result<Vec<Item>> {
                Ok(Vec::new())
            }
        }

        let err = build_tree(&Broken, &MirrorConfig::new("m")).expect_err("broken source");
        assert!(format!("{err:#}").contains("database locked"));
    }
}

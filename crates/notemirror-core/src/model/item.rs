use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Well-known identifier of the virtual container that holds resources in a
/// mirrored tree. Resources have no native parent folder, so every mirror
/// places them under this synthetic folder.
pub const RESOURCES_DIR_ID: &str = "__notemirror_resources__";

/// Default file name of the virtual resources container.
pub const DEFAULT_RESOURCES_DIR_NAME: &str = "resources";

/// The three kinds of mirrored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Folder,
    Note,
    Resource,
}

impl ItemKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Note => "note",
            Self::Resource => "resource",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an [`ItemKind`] from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKindError {
    pub got: String,
}

impl fmt::Display for ParseKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid item kind: '{}'", self.got)
    }
}

impl std::error::Error for ParseKindError {}

impl FromStr for ItemKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "folder" => Ok(Self::Folder),
            "note" => Ok(Self::Note),
            "resource" => Ok(Self::Resource),
            _ => Err(ParseKindError { got: s.to_string() }),
        }
    }
}

/// Kind-specific content of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemContent {
    Folder {
        #[serde(default)]
        icon: Option<String>,
    },
    Note {
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        is_todo: bool,
        #[serde(default)]
        todo_due: i64,
        #[serde(default)]
        todo_completed: i64,
    },
    Resource {
        mime: String,
        #[serde(default)]
        file_extension: Option<String>,
    },
}

/// A folder, note or resource participating in a mirrored tree.
///
/// `updated_time` is the content-version marker. `deleted_time` is the
/// soft-deletion marker; zero means the item is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub parent_id: String,
    pub title: String,
    #[serde(default)]
    pub created_time: i64,
    #[serde(default)]
    pub updated_time: i64,
    #[serde(default)]
    pub deleted_time: i64,
    /// Structural container that only exists in the mirrored tree.
    #[serde(default)]
    pub is_virtual: bool,
    pub content: ItemContent,
}

impl Item {
    #[must_use]
    pub fn folder(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::with_content(id, title, ItemContent::Folder { icon: None })
    }

    #[must_use]
    pub fn note(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_content(
            id,
            title,
            ItemContent::Note {
                body: Some(body.into()),
                is_todo: false,
                todo_due: 0,
                todo_completed: 0,
            },
        )
    }

    #[must_use]
    pub fn resource(
        id: impl Into<String>,
        title: impl Into<String>,
        mime: impl Into<String>,
        file_extension: Option<&str>,
    ) -> Self {
        Self::with_content(
            id,
            title,
            ItemContent::Resource {
                mime: mime.into(),
                file_extension: file_extension.map(str::to_string),
            },
        )
    }

    /// The base item of a tree. `id` is the base folder identifier, which is
    /// empty when the tree mirrors the whole collection.
    #[must_use]
    pub fn root(id: impl Into<String>) -> Self {
        Self::folder(id, "")
    }

    /// The virtual container resources are mirrored into.
    #[must_use]
    pub fn resources_dir(name: impl Into<String>) -> Self {
        let mut item = Self::folder(RESOURCES_DIR_ID, name);
        item.is_virtual = true;
        item
    }

    fn with_content(id: impl Into<String>, title: impl Into<String>, content: ItemContent) -> Self {
        Self {
            id: id.into(),
            parent_id: String::new(),
            title: title.into(),
            created_time: 0,
            updated_time: 0,
            deleted_time: 0,
            is_virtual: false,
            content,
        }
    }

    #[must_use]
    pub fn with_updated_time(mut self, updated_time: i64) -> Self {
        self.updated_time = updated_time;
        self
    }

    #[must_use]
    pub fn with_created_time(mut self, created_time: i64) -> Self {
        self.created_time = created_time;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        match self.content {
            ItemContent::Folder { .. } => ItemKind::Folder,
            ItemContent::Note { .. } => ItemKind::Note,
            ItemContent::Resource { .. } => ItemKind::Resource,
        }
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_time != 0
    }

    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match &self.content {
            ItemContent::Note { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    /// Replace a note's body. No-op for other kinds.
    pub fn set_body(&mut self, new_body: impl Into<String>) {
        if let ItemContent::Note { body, .. } = &mut self.content {
            *body = Some(new_body.into());
        }
    }

    #[must_use]
    pub fn icon(&self) -> Option<&str> {
        match &self.content {
            ItemContent::Folder { icon } => icon.as_deref(),
            _ => None,
        }
    }

    /// Extension used for this item's file name in a mirror, without the dot.
    #[must_use]
    pub fn file_extension(&self) -> Option<&str> {
        match &self.content {
            ItemContent::Folder { .. } => None,
            ItemContent::Note { .. } => Some("md"),
            ItemContent::Resource { file_extension, .. } => {
                file_extension.as_deref().filter(|ext| !ext.is_empty())
            }
        }
    }

    /// The normalized subset of fields compared when diffing.
    #[must_use]
    pub fn diff_fields(&self) -> DiffFields<'_> {
        let (is_todo, todo_due, todo_completed) = match &self.content {
            ItemContent::Note {
                is_todo,
                todo_due,
                todo_completed,
                ..
            } => (*is_todo, *todo_due, *todo_completed),
            _ => (false, 0, 0),
        };

        DiffFields {
            title: &self.title,
            body: self.body().filter(|body| !body.is_empty()),
            icon: self.icon().filter(|icon| !icon.is_empty()),
            updated_time: self.updated_time,
            is_todo,
            todo_due,
            todo_completed,
        }
    }

    /// Content fingerprint stored in the journal. See [`DiffFields::fingerprint`].
    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.diff_fields().fingerprint()
    }
}

/// The fixed field subset that decides whether an item changed.
///
/// Fields outside this set (parent identifier, creation time, resource
/// metadata) are allowed to diverge between mirrors without producing an
/// update. Empty bodies and icons are normalized to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiffFields<'a> {
    pub title: &'a str,
    pub body: Option<&'a str>,
    pub icon: Option<&'a str>,
    pub updated_time: i64,
    pub is_todo: bool,
    pub todo_due: i64,
    pub todo_completed: i64,
}

impl DiffFields<'_> {
    /// BLAKE3 hash of the canonical JSON form, formatted `blake3:<hex>`.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::json!({
            "body": self.body,
            "icon": self.icon,
            "is_todo": self.is_todo,
            "title": self.title,
            "todo_completed": self.todo_completed,
            "todo_due": self.todo_due,
            "updated_time": self.updated_time,
        })
        .to_string();
        format!("blake3:{}", blake3::hash(canonical.as_bytes()))
    }
}

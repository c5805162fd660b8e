//! Normalized tree paths.
//!
//! A path is the `/`-separated chain of file names from the tree root down to
//! an item. The root itself is `.`. Paths are normalized on construction:
//! empty and `.` components are dropped and `..` climbs one level (never past
//! the root), so two spellings of the same location compare equal.

use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt};

const MAX_FILE_NAME_CHARS: usize = 100;
const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// A normalized path inside a mirrored tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ItemPath(String);

impl ItemPath {
    pub const ROOT: &'static str = ".";

    #[must_use]
    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    /// Parse and normalize a raw path.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let mut parts: Vec<&str> = Vec::new();
        for part in raw.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }

        if parts.is_empty() {
            Self::root()
        } else {
            Self(parts.join("/"))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    /// Parent path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rsplit_once('/') {
            Some((parent, _)) => Self(parent.to_string()),
            None => Self::root(),
        })
    }

    /// Append a file name (or a relative path) and normalize the result.
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        if self.is_root() {
            Self::new(name)
        } else {
            Self::new(&format!("{}/{name}", self.0))
        }
    }

    /// Last component, or an empty string for the root.
    #[must_use]
    pub fn file_name(&self) -> &str {
        if self.is_root() {
            return "";
        }
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Number of components; the root has depth zero.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.split('/').count()
        }
    }

    /// True if `self` equals `ancestor` or lies beneath it.
    #[must_use]
    pub fn is_within(&self, ancestor: &Self) -> bool {
        if ancestor.is_root() || self == ancestor {
            return true;
        }
        self.0
            .strip_prefix(ancestor.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Re-root a path that lies within `from` onto `to`.
    #[must_use]
    pub fn rebase(&self, from: &Self, to: &Self) -> Option<Self> {
        if !self.is_within(from) {
            return None;
        }
        if self == from {
            return Some(to.clone());
        }
        let relative = if from.is_root() {
            self.as_str()
        } else {
            &self.0[from.0.len() + 1..]
        };
        Some(to.join(relative))
    }

    /// Prefix shared by every strict descendant, used for ordered range scans.
    pub(crate) fn descendant_prefix(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("{}/", self.0)
        }
    }
}

impl Default for ItemPath {
    fn default() -> Self {
        Self::root()
    }
}

impl Borrow<str> for ItemPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemPath {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for ItemPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<ItemPath> for String {
    fn from(path: ItemPath) -> Self {
        path.0
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turn an item title into a file name that is safe on common filesystems.
///
/// Reserved characters and control characters become `_`, surrounding
/// whitespace and trailing dots are trimmed, and the result is capped at
/// 100 characters. An empty result becomes `Untitled`.
#[must_use]
pub fn safe_file_name(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if c.is_control() || FORBIDDEN_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    let capped: String = replaced.trim().chars().take(MAX_FILE_NAME_CHARS).collect();
    let cleaned = capped.trim().trim_end_matches('.').trim_end();

    if cleaned.is_empty() || cleaned == "." {
        "Untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

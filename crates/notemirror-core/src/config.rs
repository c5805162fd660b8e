use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;
use crate::model::item::DEFAULT_RESOURCES_DIR_NAME;

/// Directory under a mirror root that holds engine state.
pub const STATE_DIR: &str = ".notemirror";

/// Settings for one mirror, read from `<root>/.notemirror/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Identifies this mirror's journal entries. Required.
    pub mirror_id: String,
    /// Folder mirrored as the tree root; empty mirrors the whole collection.
    #[serde(default)]
    pub base_folder_id: String,
    /// File name of the virtual resources container.
    #[serde(default = "default_resources_dir")]
    pub resources_dir: String,
    /// Journal database location, relative to the mirror root.
    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,
}

impl MirrorConfig {
    /// A config with defaults for everything but the mirror identifier.
    #[must_use]
    pub fn new(mirror_id: impl Into<String>) -> Self {
        Self {
            mirror_id: mirror_id.into(),
            base_folder_id: String::new(),
            resources_dir: default_resources_dir(),
            journal_path: default_journal_path(),
        }
    }

    /// Absolute journal location for a mirror rooted at `root`.
    #[must_use]
    pub fn journal_path(&self, root: &Path) -> PathBuf {
        if self.journal_path.is_absolute() {
            self.journal_path.clone()
        } else {
            root.join(&self.journal_path)
        }
    }
}

fn default_resources_dir() -> String {
    DEFAULT_RESOURCES_DIR_NAME.to_string()
}

fn default_journal_path() -> PathBuf {
    PathBuf::from(STATE_DIR).join("journal.sqlite3")
}

/// Path of the config file for a mirror rooted at `root`.
#[must_use]
pub fn config_path(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join("config.toml")
}

/// Load and validate the config of the mirror rooted at `root`.
///
/// # Errors
///
/// Fails if the file is missing, unreadable or malformed, if `mirror_id` is
/// empty, or if `resources_dir` is not a single plain file name.
pub fn load_config(root: &Path) -> Result<MirrorConfig> {
    let path = config_path(root);
    if !path.exists() {
        bail!(
            "{} ({}): {} not found. {}",
            ErrorCode::NotInitialized.message(),
            ErrorCode::NotInitialized,
            path.display(),
            ErrorCode::NotInitialized.hint().unwrap_or_default()
        );
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse and validate config text.
///
/// # Errors
///
/// Fails on TOML syntax errors, a missing or empty `mirror_id`, or an
/// unusable `resources_dir`.
pub fn parse_config(content: &str) -> Result<MirrorConfig> {
    let config: MirrorConfig = toml::from_str(content).with_context(|| {
        format!(
            "{} ({})",
            ErrorCode::ConfigParseError.message(),
            ErrorCode::ConfigParseError
        )
    })?;

    if config.mirror_id.trim().is_empty() {
        bail!("mirror_id must not be empty");
    }
    let name = config.resources_dir.as_str();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        bail!("resources_dir must be a plain file name, got '{name}'");
    }
    Ok(config)
}

//! SQLite schema for the journal store.
//!
//! - `journal_entries` holds one row per item per mirror
//! - `(mirror_id, path)` is unique, matching the tree invariant that paths
//!   are unique within one mirror snapshot

/// Migration v1: the entry table.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS journal_entries (
    mirror_id TEXT NOT NULL CHECK (length(mirror_id) > 0),
    item_id TEXT NOT NULL CHECK (length(item_id) > 0),
    path TEXT NOT NULL CHECK (length(path) > 0 AND path <> '.'),
    kind TEXT NOT NULL CHECK (kind IN ('folder', 'note', 'resource')),
    hash TEXT NOT NULL,
    PRIMARY KEY (mirror_id, item_id),
    UNIQUE (mirror_id, path)
);
";

/// Migration v2: per-mirror bookkeeping for the last replace.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS journal_mirrors (
    mirror_id TEXT PRIMARY KEY CHECK (length(mirror_id) > 0),
    entry_count INTEGER NOT NULL DEFAULT 0 CHECK (entry_count >= 0),
    replaced_count INTEGER NOT NULL DEFAULT 0 CHECK (replaced_count >= 0)
);

CREATE INDEX IF NOT EXISTS idx_journal_entries_item
    ON journal_entries(item_id);
";

/// Indexes expected after all migrations.
pub const REQUIRED_INDEXES: &[&str] = &["idx_journal_entries_item"];

//! Durable journal storage.
//!
//! The engine only needs two operations: load every entry for a mirror, and
//! atomically replace them. [`SqliteJournal`] is the reference store;
//! [`MemoryJournal`] backs tests and simulations.
//!
//! SQLite runtime defaults:
//! - `journal_mode = WAL` so readers never block the replacing writer
//! - `busy_timeout = 5s` to ride out transient locks
//! - `synchronous = NORMAL`, which is durable under WAL

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{JournalEntry, JournalError, migrations};
use crate::model::{ItemKind, ItemPath};

/// Busy timeout used for journal connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistence capability for journal entries.
pub trait JournalStore {
    /// Every entry recorded for `mirror_id`, in any order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn load_all(&self, mirror_id: &str) -> Result<Vec<JournalEntry>>;

    /// Replace every entry for `mirror_id` with `entries` as one atomic
    /// operation. On error the previous entry set must be intact.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry belongs to another mirror or the write
    /// fails.
    fn replace_all(&mut self, mirror_id: &str, entries: &[JournalEntry]) -> Result<()>;
}

fn check_mirror(mirror_id: &str, entries: &[JournalEntry]) -> Result<(), JournalError> {
    match entries.iter().find(|entry| entry.mirror_id != mirror_id) {
        Some(entry) => Err(JournalError::MirrorMismatch {
            item_id: entry.item_id.clone(),
            expected: mirror_id.to_string(),
            found: entry.mirror_id.clone(),
        }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Journal held in a map, keyed by mirror.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    mirrors: HashMap<String, Vec<JournalEntry>>,
}

impl MemoryJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl JournalStore for MemoryJournal {
    fn load_all(&self, mirror_id: &str) -> Result<Vec<JournalEntry>> {
        Ok(self.mirrors.get(mirror_id).cloned().unwrap_or_default())
    }

    fn replace_all(&mut self, mirror_id: &str, entries: &[JournalEntry]) -> Result<()> {
        check_mirror(mirror_id, entries)?;
        self.mirrors.insert(mirror_id.to_string(), entries.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQLite store
// ---------------------------------------------------------------------------

/// Journal persisted in a SQLite database.
#[derive(Debug)]
pub struct SqliteJournal {
    conn: Connection,
}

impl SqliteJournal {
    /// Open (or create) the journal database at `path`, apply runtime
    /// pragmas and migrate the schema to the latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or opening,
    /// configuring or migrating the database fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create journal directory {}", parent.display()))?;
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("open journal database {}", path.display()))?;
        configure_connection(&conn).context("configure sqlite pragmas")?;
        migrations::migrate(&mut conn).context("apply journal migrations")?;

        Ok(Self { conn })
    }

    /// Open a private in-memory journal.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot create the database.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("open in-memory journal")?;
        migrations::migrate(&mut conn).context("apply journal migrations")?;
        Ok(Self { conn })
    }

    /// How many times `mirror_id`'s entries have been replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn replaced_count(&self, mirror_id: &str) -> Result<u64, JournalError> {
        let count: Option<i64> = self
            .conn
            .query_row(
                "SELECT replaced_count FROM journal_mirrors WHERE mirror_id = ?1",
                [mirror_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.and_then(|n| u64::try_from(n).ok()).unwrap_or(0))
    }

    fn load_rows(&self, mirror_id: &str) -> Result<Vec<JournalEntry>, JournalError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT item_id, mirror_id, hash, path, kind
             FROM journal_entries
             WHERE mirror_id = ?1
             ORDER BY path",
        )?;

        let rows = stmt.query_map([mirror_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (item_id, mirror_id, hash, path, kind) = row?;
            let kind: ItemKind = kind
                .parse()
                .map_err(|err| JournalError::InvalidRow(format!("{item_id}: {err}")))?;
            entries.push(JournalEntry {
                item_id,
                mirror_id,
                hash,
                path: ItemPath::new(&path),
                kind,
            });
        }
        Ok(entries)
    }

    fn replace_rows(
        &mut self,
        mirror_id: &str,
        entries: &[JournalEntry],
    ) -> Result<(), JournalError> {
        check_mirror(mirror_id, entries)?;

        let tx = self.conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM journal_entries WHERE mirror_id = ?1",
            [mirror_id],
        )?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO journal_entries (mirror_id, item_id, path, kind, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for entry in entries {
                insert.execute(params![
                    mirror_id,
                    entry.item_id,
                    entry.path.as_str(),
                    entry.kind.as_str(),
                    entry.hash,
                ])?;
            }
        }
        let count = i64::try_from(entries.len()).unwrap_or(i64::MAX);
        tx.execute(
            "INSERT INTO journal_mirrors (mirror_id, entry_count, replaced_count)
             VALUES (?1, ?2, 1)
             ON CONFLICT(mirror_id) DO UPDATE SET
                entry_count = excluded.entry_count,
                replaced_count = replaced_count + 1",
            params![mirror_id, count],
        )?;
        tx.commit()?;

        debug!(mirror_id, removed, inserted = entries.len(), "replaced journal");
        Ok(())
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

impl JournalStore for SqliteJournal {
    fn load_all(&self, mirror_id: &str) -> Result<Vec<JournalEntry>> {
        self.load_rows(mirror_id)
            .with_context(|| format!("load journal for mirror {mirror_id}"))
    }

    fn replace_all(&mut self, mirror_id: &str, entries: &[JournalEntry]) -> Result<()> {
        self.replace_rows(mirror_id, entries)
            .with_context(|| format!("replace journal for mirror {mirror_id}"))
    }
}

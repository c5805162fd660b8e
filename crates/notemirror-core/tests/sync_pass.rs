//! End-to-end sync passes: item source → trees → merge → SQLite journal.

use notemirror_core::config::MirrorConfig;
use notemirror_core::diff::diff;
use notemirror_core::fill::{MemoryItemSource, build_tree};
use notemirror_core::journal::{JournalStore, JournalTree, SqliteJournal};
use notemirror_core::merge::run_sync_pass;
use notemirror_core::model::{Item, ItemPath};
use notemirror_core::tree::{
    ActionListener, AddEvent, MoveEvent, NoopListener, RecordedAction, RecordingListener,
    RemoveEvent, UpdateEvent,
};
use notemirror_core::ErrorCode;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn p(raw: &str) -> ItemPath {
    ItemPath::new(raw)
}

fn collection() -> MemoryItemSource {
    let mut source = MemoryItemSource::new();
    source
        .insert(Item::folder("f-home", "Home"))
        .insert(Item::folder("f-work", "Work"))
        .insert(Item::note("n-list", "Groceries", "- milk").with_parent("f-home"))
        .insert(Item::note("n-plan", "Plan", "ship").with_parent("f-work"))
        .insert(Item::resource("r-chart", "chart", "image/png", Some("png")))
        .link("n-plan", "r-chart");
    source
}

fn open_journal() -> (tempfile::TempDir, SqliteJournal) {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = MirrorConfig::new("laptop");
    let journal = SqliteJournal::open(&config.journal_path(dir.path())).expect("open journal");
    (dir, journal)
}

/// First pass: an empty mirror adopts the whole collection.
fn initial_pass(journal: &mut SqliteJournal) {
    let config = MirrorConfig::new("laptop");
    let mut local = build_tree(&collection(), &config).expect("local tree");
    let mut remote = notemirror_core::ItemTree::new(Item::root(""));
    let mut remote_listener = RecordingListener::default();
    run_sync_pass(
        journal,
        "laptop",
        &mut local,
        &mut remote,
        &mut NoopListener,
        &mut remote_listener,
    )
    .expect("initial pass");
    assert!(diff(&local, &remote).is_empty());
}

struct FailOnMove;

impl ActionListener for FailOnMove {
    fn on_add(&mut self, _event: &AddEvent<'_>) -> anyhow::Result<Option<Item>> {
        Ok(None)
    }
    fn on_update(&mut self, _event: &UpdateEvent<'_>) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_move(&mut self, event: &MoveEvent<'_>) -> anyhow::Result<()> {
        anyhow::bail!("read-only medium: cannot move {}", event.from)
    }
    fn on_remove(&mut self, _event: &RemoveEvent<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn first_pass_populates_mirror_and_journal() {
    let (_dir, mut journal) = open_journal();
    initial_pass(&mut journal);

    let entries = journal.load_all("laptop").expect("load");
    let tree = JournalTree::from_entries("laptop", entries).expect("valid journal");
    assert!(tree.has_path(&p("Work/Plan.md")));
    assert!(tree.has_path(&p("resources/chart.png")));
    assert_eq!(tree.len(), 6);
}

#[test]
fn offline_mirror_edits_flow_back_to_the_collection() {
    let (_dir, mut journal) = open_journal();
    initial_pass(&mut journal);
    let config = MirrorConfig::new("laptop");

    let mut local = build_tree(&collection(), &config).expect("local");
    let mut remote = build_tree(&collection(), &config).expect("remote");
    // The user renamed a note and edited another on the mirror.
    remote
        .move_item(&p("Home/Groceries.md"), &p("Home/Shopping.md"), &mut NoopListener)
        .expect("rename on mirror");
    remote
        .update(
            &p("Work/Plan.md"),
            Item::note("n-plan", "Plan", "ship friday").with_updated_time(10),
            &mut NoopListener,
        )
        .expect("edit on mirror");

    let mut local_listener = RecordingListener::default();
    let report = run_sync_pass(
        &mut journal,
        "laptop",
        &mut local,
        &mut remote,
        &mut local_listener,
        &mut NoopListener,
    )
    .expect("clean pass");

    assert_eq!(report.local_applied, 2);
    assert_eq!(report.remote_applied, 0);
    assert_eq!(
        local_listener.actions,
        vec![
            RecordedAction::Update {
                path: p("Work/Plan.md"),
                id: "n-plan".into(),
            },
            RecordedAction::Move {
                from: p("Home/Groceries.md"),
                to: p("Home/Shopping.md"),
                id: "n-list".into(),
            },
        ]
    );
    assert_eq!(
        local.get_by_id("n-plan").and_then(Item::body),
        Some("ship friday")
    );

    let journal_tree =
        JournalTree::from_entries("laptop", journal.load_all("laptop").expect("load"))
            .expect("journal");
    assert!(diff(&journal_tree, &local).is_empty());
    assert!(diff(&journal_tree, &remote).is_empty());
}

#[test]
fn conflicting_pass_keeps_previous_journal() {
    let (_dir, mut journal) = open_journal();
    initial_pass(&mut journal);
    let before = journal.load_all("laptop").expect("load");
    let config = MirrorConfig::new("laptop");

    let mut local = build_tree(&collection(), &config).expect("local");
    let mut remote = build_tree(&collection(), &config).expect("remote");
    local
        .delete_at_path(&p("Work"), &mut NoopListener)
        .expect("delete in app");
    remote
        .update(
            &p("Work/Plan.md"),
            Item::note("n-plan", "Plan", "edited offline").with_updated_time(3),
            &mut NoopListener,
        )
        .expect("edit on mirror");

    let err = run_sync_pass(
        &mut journal,
        "laptop",
        &mut local,
        &mut remote,
        &mut NoopListener,
        &mut NoopListener,
    )
    .expect_err("conflict");
    assert_eq!(err.code(), ErrorCode::MergeConflict);
    assert_eq!(journal.load_all("laptop").expect("load"), before);
}

#[test]
fn listener_failure_aborts_and_keeps_journal() {
    let (_dir, mut journal) = open_journal();
    initial_pass(&mut journal);
    let before = journal.load_all("laptop").expect("load");
    let config = MirrorConfig::new("laptop");

    let mut local = build_tree(&collection(), &config).expect("local");
    let mut remote = build_tree(&collection(), &config).expect("remote");
    local
        .move_item(&p("Work/Plan.md"), &p("Home/Plan.md"), &mut NoopListener)
        .expect("move in app");

    let err = run_sync_pass(
        &mut journal,
        "laptop",
        &mut local,
        &mut remote,
        &mut NoopListener,
        &mut FailOnMove,
    )
    .expect_err("mirror refuses moves");
    assert!(err.to_string().contains("read-only medium"));
    assert!(remote.has_path(&p("Work/Plan.md")), "failed move is rolled back");
    assert_eq!(journal.load_all("laptop").expect("load"), before);
}

//! Seeded campaigns of edit rounds and sync passes.
//!
//! Each seed builds a base collection, agrees on it through a first sync
//! pass, then runs `rounds` rounds in which both sides are edited offline
//! and merged through a SQLite journal. The oracle runs after every step.

use std::ops::Range;

use anyhow::{Result, bail};
use notemirror_core::journal::{JournalStore, SqliteJournal};
use notemirror_core::merge::{SyncError, run_sync_pass};
use notemirror_core::model::{Item, ItemPath};
use notemirror_core::tree::{ItemTree, NoopListener};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::edits::SideEditor;
use crate::oracle::{InvariantViolation, MirrorOracle, OracleResult, Side};
use crate::rng::DeterministicRng;

const MIRROR_ID: &str = "sim";
const LOCAL_SCOPE: &str = "Local";
const REMOTE_SCOPE: &str = "Remote";

/// Configuration for a campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g., `0..100`.
    pub seed_range: Range<u64>,
    /// Edit-and-sync rounds per seed.
    pub rounds: u64,
    /// Edits attempted on each side per round.
    pub edits_per_side: usize,
    /// Additions used to grow the base collection.
    pub base_items: usize,
    /// When false each side only edits its own top-level folder, so every
    /// merge must succeed. When true both sides edit anywhere and conflicts
    /// are expected.
    pub overlap: bool,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            seed_range: 0..100,
            rounds: 8,
            edits_per_side: 6,
            base_items: 24,
            overlap: false,
        }
    }
}

impl CampaignConfig {
    /// Validate that the config is well-formed.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed range is empty or `rounds` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        Ok(())
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

/// Outcome of one seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRun {
    pub seed: u64,
    pub rounds_merged: u64,
    pub rounds_conflicted: u64,
    pub violations: Vec<InvariantViolation>,
}

impl SeedRun {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Aggregate report produced by a campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First seed that failed (for prioritized replay).
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    pub rounds_merged: u64,
    pub rounds_conflicted: u64,
}

impl CampaignReport {
    /// True if every seed passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run a full campaign across all seeds in the config.
///
/// # Errors
///
/// Returns an error if config validation fails or the journal store fails
/// for a reason other than a merge conflict.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        rounds_merged: 0,
        rounds_conflicted: 0,
    };

    for seed in config.seed_range.clone() {
        let run = run_single_seed(seed, config)?;
        report.seeds_run += 1;
        report.rounds_merged += run.rounds_merged;
        report.rounds_conflicted += run.rounds_conflicted;
        if run.passed() {
            report.seeds_passed += 1;
        } else {
            if report.first_failure.is_none() {
                report.first_failure = Some(seed);
            }
            report.failures.push(SeedFailure {
                seed,
                violations: run.violations.iter().map(ToString::to_string).collect(),
            });
        }
    }

    info!(
        seeds_run = report.seeds_run,
        seeds_passed = report.seeds_passed,
        rounds_merged = report.rounds_merged,
        rounds_conflicted = report.rounds_conflicted,
        "campaign complete"
    );
    Ok(report)
}

/// Run one seed and collect every invariant violation it produced.
///
/// # Errors
///
/// Returns an error if the in-memory journal cannot be opened or a sync
/// pass fails for a reason other than a merge conflict.
pub fn run_single_seed(seed: u64, config: &CampaignConfig) -> Result<SeedRun> {
    let mut rng = DeterministicRng::new(seed);
    let mut store = SqliteJournal::open_in_memory()?;
    let mut run = SeedRun {
        seed,
        rounds_merged: 0,
        rounds_conflicted: 0,
        violations: Vec::new(),
    };

    let mut agreed = base_collection(&mut rng, config.base_items)?;
    let mut oracle = initial_pass(&mut store, &agreed)?;

    let (local_scope, remote_scope) = if config.overlap {
        (ItemPath::root(), ItemPath::root())
    } else {
        (ItemPath::new(LOCAL_SCOPE), ItemPath::new(REMOTE_SCOPE))
    };
    let mut local_editor = SideEditor::new("local", local_scope);
    let mut remote_editor = SideEditor::new("remote", remote_scope);

    for round in 0..config.rounds {
        let mut local = agreed.clone();
        let mut remote = agreed.clone();
        let local_edits = local_editor.apply_random(&mut local, &mut rng, config.edits_per_side);
        let remote_edits =
            remote_editor.apply_random(&mut remote, &mut rng, config.edits_per_side);
        debug!(
            seed,
            round,
            local = local_edits.len(),
            remote = remote_edits.len(),
            "sides edited"
        );

        oracle = oracle
            .merge(MirrorOracle::check_replay(Side::Local, &agreed, &local))
            .merge(MirrorOracle::check_replay(Side::Remote, &agreed, &remote));

        let before = store.load_all(MIRROR_ID)?;
        match run_sync_pass(
            &mut store,
            MIRROR_ID,
            &mut local,
            &mut remote,
            &mut NoopListener,
            &mut NoopListener,
        ) {
            Ok(_) => {
                run.rounds_merged += 1;
                oracle = oracle
                    .merge(MirrorOracle::check_convergence(&local, &remote))
                    .merge(MirrorOracle::check_journal(
                        MIRROR_ID,
                        store.load_all(MIRROR_ID)?,
                        &local,
                    ))
                    .merge(MirrorOracle::check_consistency(Side::Local, &local))
                    .merge(MirrorOracle::check_consistency(Side::Remote, &remote));
                agreed = local;
            }
            Err(SyncError::Merge(err)) => {
                run.rounds_conflicted += 1;
                debug!(seed, round, error = %err, "round conflicted");
                if !config.overlap {
                    oracle = oracle.merge(OracleResult::fail(vec![
                        InvariantViolation::UnexpectedConflict {
                            message: err.to_string(),
                        },
                    ]));
                }
                let after = store.load_all(MIRROR_ID)?;
                if after != before {
                    oracle = oracle.merge(OracleResult::fail(vec![
                        InvariantViolation::JournalWrittenOnFailure {
                            before: before.len(),
                            after: after.len(),
                        },
                    ]));
                }
            }
            Err(other) => return Err(other.into()),
        }
    }

    run.violations = oracle.violations;
    Ok(run)
}

/// Grow a collection with both scope folders and `additions` random items.
fn base_collection(rng: &mut DeterministicRng, additions: usize) -> Result<ItemTree> {
    let mut tree = ItemTree::new(Item::root(""));
    for (id, title) in [("f-local", LOCAL_SCOPE), ("f-remote", REMOTE_SCOPE)] {
        tree.add_item_at(&ItemPath::new(title), Item::folder(id, title), &mut NoopListener)?;
    }
    let mut grower = SideEditor::new("base", ItemPath::root());
    grower.grow(&mut tree, rng, additions);
    Ok(tree)
}

/// First pass from an empty journal: the remote side adopts the whole
/// collection.
fn initial_pass(store: &mut SqliteJournal, agreed: &ItemTree) -> Result<OracleResult> {
    let mut local = agreed.clone();
    let mut remote = ItemTree::new(Item::root(""));
    run_sync_pass(
        store,
        MIRROR_ID,
        &mut local,
        &mut remote,
        &mut NoopListener,
        &mut NoopListener,
    )?;
    Ok(MirrorOracle::check_convergence(&local, &remote).merge(
        MirrorOracle::check_journal(MIRROR_ID, store.load_all(MIRROR_ID)?, &local),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_config_default_is_valid() {
        assert!(CampaignConfig::default().validate().is_ok());
    }

    #[test]
    fn campaign_config_empty_seed_range_rejected() {
        let config = CampaignConfig {
            seed_range: 5..5,
            ..CampaignConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn campaign_config_zero_rounds_rejected() {
        let config = CampaignConfig {
            rounds: 0,
            ..CampaignConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn single_seed_is_deterministic() {
        let config = CampaignConfig {
            seed_range: 0..1,
            rounds: 3,
            ..CampaignConfig::default()
        };
        let a = run_single_seed(17, &config).expect("run");
        let b = run_single_seed(17, &config).expect("run");
        assert_eq!(a, b);
    }

    #[test]
    fn disjoint_rounds_all_merge() {
        let config = CampaignConfig {
            seed_range: 0..4,
            rounds: 4,
            ..CampaignConfig::default()
        };
        let report = run_campaign(&config).expect("campaign");
        assert!(report.all_passed(), "{:?}", report.failures);
        assert_eq!(report.rounds_merged, 16);
        assert_eq!(report.rounds_conflicted, 0);
    }
}

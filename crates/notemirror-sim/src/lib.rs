//! notemirror-sim library.
//!
//! Deterministic campaigns that edit both sides of a mirror offline, run
//! sync passes through a SQLite journal, and check merge invariants after
//! every round. A failing seed replays identically.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` for campaign plumbing; invariant failures
//!   are data ([`oracle::InvariantViolation`]), not errors.
//! - **Logging**: `tracing` macros (`info!`, `debug!`).

pub mod campaign;
pub mod edits;
pub mod oracle;
pub mod rng;

pub use campaign::{CampaignConfig, CampaignReport, SeedFailure, SeedRun, run_campaign, run_single_seed};
pub use edits::{AppliedEdit, EditKind, SideEditor};
pub use oracle::{InvariantViolation, MirrorOracle, OracleResult, Side};
pub use rng::DeterministicRng;

#![forbid(unsafe_code)]

use std::env;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use notemirror_sim::{CampaignConfig, run_campaign, run_single_seed};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "notemirror-sim: seeded two-sided edit campaigns",
    long_about = None
)]
struct Cli {
    /// Number of seeds to run.
    #[arg(long, default_value_t = 100)]
    seeds: u64,

    /// First seed of the range.
    #[arg(long, default_value_t = 0)]
    first_seed: u64,

    /// Edit-and-sync rounds per seed.
    #[arg(long, default_value_t = 8)]
    rounds: u64,

    /// Edits attempted on each side per round.
    #[arg(long, default_value_t = 6)]
    edits: usize,

    /// Additions used to grow the base collection.
    #[arg(long, default_value_t = 24)]
    base_items: usize,

    /// Let both sides edit anywhere; conflicts are then expected.
    #[arg(long)]
    overlap: bool,

    /// Replay a single seed and print its violations.
    #[arg(long)]
    replay: Option<u64>,

    /// Emit the report as JSON.
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("NOTEMIRROR_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "notemirror=debug,info"
        } else {
            "notemirror=info,warn"
        })
    });

    let format = env::var("NOTEMIRROR_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let config = CampaignConfig {
        seed_range: cli.first_seed..cli.first_seed.saturating_add(cli.seeds),
        rounds: cli.rounds,
        edits_per_side: cli.edits,
        base_items: cli.base_items,
        overlap: cli.overlap,
    };

    if let Some(seed) = cli.replay {
        config.validate()?;
        let run = run_single_seed(seed, &config)?;
        println!(
            "seed {seed}: merged={} conflicted={} violations={}",
            run.rounds_merged,
            run.rounds_conflicted,
            run.violations.len()
        );
        for violation in &run.violations {
            println!("  {violation}");
        }
        return Ok(if run.passed() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let report = run_campaign(&config)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "campaign complete: seeds={} passed={} merged={} conflicted={}",
            report.seeds_run, report.seeds_passed, report.rounds_merged, report.rounds_conflicted
        );
        for failure in &report.failures {
            println!("seed {} failed:", failure.seed);
            for violation in &failure.violations {
                println!("  {violation}");
            }
        }
    }

    Ok(if report.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

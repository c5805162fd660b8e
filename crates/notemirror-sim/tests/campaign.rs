//! Campaign-level behaviour through the public API.

use notemirror_sim::{CampaignConfig, run_campaign, run_single_seed};

#[test]
fn disjoint_campaign_passes_every_seed() {
    let config = CampaignConfig {
        seed_range: 0..24,
        rounds: 6,
        edits_per_side: 8,
        base_items: 30,
        overlap: false,
    };
    let report = run_campaign(&config).expect("campaign runs");
    assert_eq!(report.seeds_run, 24);
    assert!(report.all_passed(), "{:#?}", report.failures);
    assert_eq!(report.rounds_merged, 24 * 6);
}

#[test]
fn overlapping_campaign_accounts_for_every_round() {
    let config = CampaignConfig {
        seed_range: 100..110,
        rounds: 5,
        edits_per_side: 4,
        base_items: 12,
        overlap: true,
    };
    let report = run_campaign(&config).expect("campaign runs");
    assert_eq!(report.seeds_run, 10);
    assert_eq!(report.rounds_merged + report.rounds_conflicted, 10 * 5);
    assert!(report.all_passed(), "{:#?}", report.failures);
}

#[test]
fn report_serializes_for_the_cli() {
    let config = CampaignConfig {
        seed_range: 0..2,
        rounds: 2,
        ..CampaignConfig::default()
    };
    let report = run_campaign(&config).expect("campaign runs");
    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["seeds_run"], 2);
}

#[test]
fn replaying_a_seed_matches_the_campaign() {
    let config = CampaignConfig {
        seed_range: 7..8,
        rounds: 3,
        ..CampaignConfig::default()
    };
    let report = run_campaign(&config).expect("campaign");
    let run = run_single_seed(7, &config).expect("replay");
    assert_eq!(report.rounds_merged, run.rounds_merged);
    assert_eq!(report.all_passed(), run.passed());
}

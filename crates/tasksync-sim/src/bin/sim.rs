#![forbid(unsafe_code)]

use anyhow::{Result, bail};
use clap::Parser;
use tasksync_sim::campaign::{CampaignConfig, format_violation, replay_seed, run_campaign};

/// Run deterministic fault-injection campaigns against the tasksync engine.
#[derive(Debug, Parser)]
#[command(name = "tasksync-sim", version)]
struct Args {
    /// First seed of the campaign.
    #[arg(long, default_value_t = 0)]
    seed_start: u64,

    /// Number of seeds to run.
    #[arg(long, default_value_t = 100)]
    seeds: u64,

    /// Rounds per seed.
    #[arg(long)]
    rounds: Option<u64>,

    /// Replay one seed and print its trace as JSON lines.
    #[arg(long, value_name = "SEED")]
    replay: Option<u64>,

    /// Print the campaign report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = CampaignConfig {
        seed_range: args.seed_start..args.seed_start.saturating_add(args.seeds),
        ..CampaignConfig::default()
    };
    if let Some(rounds) = args.rounds {
        config.rounds = rounds;
    }

    if let Some(seed) = args.replay {
        let trace = replay_seed(seed, &config)?;
        for event in &trace.result.trace {
            println!("{}", serde_json::to_string(event)?);
        }
        for violation in &trace.oracle.violations {
            eprintln!("violation: {}", format_violation(violation));
        }
        if !trace.oracle.passed {
            bail!("seed {seed} violated {} invariants", trace.oracle.violations.len());
        }
        return Ok(());
    }

    let report = run_campaign(&config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "campaign complete: seeds_run={} passed={} interesting={}",
            report.seeds_run, report.seeds_passed, report.interesting_states_reached
        );
        for failure in &report.failures {
            println!("seed {}:", failure.seed);
            for line in &failure.violations {
                println!("  {line}");
            }
        }
    }
    if let Some(seed) = report.first_failure {
        bail!("seed {seed} failed; replay with --replay {seed}");
    }
    Ok(())
}

//! Campaign runner: many seeds, one report.
//!
//! Each seed runs a full simulation and the consistency oracle. The first
//! failing seed is reported for replay with [`replay_seed`].

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::network::FaultConfig;
use crate::oracle::{ConsistencyOracle, InvariantViolation, OracleResult};
use crate::{SimulationConfig, SimulationResult, Simulator};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Seeds to execute, e.g. `0..100`.
    pub seed_range: Range<u64>,
    pub rounds: u64,
    pub actions_per_round: u8,
    pub initial_tasks: usize,
    pub mutation_retries: u32,
    pub retention_rounds: u64,
    pub fault_max_delay: u8,
    pub fault_drop_percent: u8,
    pub fault_timeout_percent: u8,
    pub fault_server_error_percent: u8,
    pub fault_reorder_percent: u8,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            seed_range: 0..100,
            rounds: sim.rounds,
            actions_per_round: sim.actions_per_round,
            initial_tasks: sim.initial_tasks,
            mutation_retries: sim.mutation_retries,
            retention_rounds: sim.retention_rounds,
            fault_max_delay: sim.fault.max_delay_rounds,
            fault_drop_percent: sim.fault.drop_rate_percent,
            fault_timeout_percent: sim.fault.timeout_rate_percent,
            fault_server_error_percent: sim.fault.server_error_rate_percent,
            fault_reorder_percent: sim.fault.reorder_rate_percent,
        }
    }
}

impl CampaignConfig {
    #[must_use]
    pub fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            rounds: self.rounds,
            actions_per_round: self.actions_per_round,
            initial_tasks: self.initial_tasks,
            mutation_retries: self.mutation_retries,
            retention_rounds: self.retention_rounds,
            fault: FaultConfig {
                max_delay_rounds: self.fault_max_delay,
                drop_rate_percent: self.fault_drop_percent,
                timeout_rate_percent: self.fault_timeout_percent,
                server_error_rate_percent: self.fault_server_error_percent,
                reorder_rate_percent: self.fault_reorder_percent,
            },
            ..SimulationConfig::default()
        }
    }

    /// # Errors
    ///
    /// Returns an error if any parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        let percents = [
            self.fault_drop_percent,
            self.fault_timeout_percent,
            self.fault_server_error_percent,
            self.fault_reorder_percent,
        ];
        if percents.iter().any(|p| *p > 100) {
            bail!("fault percentages must be within 0..=100");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First seed that failed, for replay.
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Seeds whose run hit an overlapping rollback or reordered responses.
    pub interesting_states_reached: usize,
}

impl CampaignReport {
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One seed, in full.
#[derive(Debug, Clone)]
pub struct DetailedTrace {
    pub result: SimulationResult,
    pub oracle: OracleResult,
}

fn execute(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    let mut simulator = Simulator::new(config.sim_config_for_seed(seed))?;
    let result = simulator.run()?;
    let oracle = ConsistencyOracle::check_all(&result);
    Ok(DetailedTrace { result, oracle })
}

/// Run every seed in the configured range.
///
/// # Errors
///
/// Returns an error if config validation fails or a simulation cannot run
/// to completion.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        interesting_states_reached: 0,
    };

    for seed in config.seed_range.clone() {
        report.seeds_run += 1;
        let trace = execute(seed, config)?;
        if trace.result.interesting() {
            report.interesting_states_reached += 1;
        }
        if trace.oracle.passed {
            report.seeds_passed += 1;
        } else {
            warn!(seed, violations = trace.oracle.violations.len(), "seed failed");
            report.first_failure.get_or_insert(seed);
            report.failures.push(SeedFailure {
                seed,
                violations: trace.oracle.violations.iter().map(format_violation).collect(),
            });
        }
    }

    Ok(report)
}

/// Run one seed: `Ok(())` on pass, the violations otherwise.
///
/// # Errors
///
/// The outer error is an internal failure (bad config, link never
/// drained); the inner one carries invariant violations.
pub fn run_single_seed(
    seed: u64,
    config: &CampaignConfig,
) -> Result<std::result::Result<(), Vec<InvariantViolation>>> {
    let trace = execute(seed, config)?;
    if trace.oracle.passed {
        Ok(Ok(()))
    } else {
        Ok(Err(trace.oracle.violations))
    }
}

/// Re-run one seed keeping the full trace for debugging.
///
/// # Errors
///
/// Returns an error when config validation or simulation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    config.validate()?;
    execute(seed, config)
}

/// One-line description of a violation.
#[must_use]
pub fn format_violation(violation: &InvariantViolation) -> String {
    match violation {
        InvariantViolation::Divergence {
            key,
            cached,
            server,
        } => format!("divergence on {key}: cache shows {cached}, server has {server}"),
        InvariantViolation::ResidualPatch {
            key,
            patches,
            unconfirmed,
        } => format!("{key} still carries {patches} patches ({unconfirmed} unconfirmed)"),
        InvariantViolation::Unsettled {
            pending_mutations,
            pending_moves,
        } => format!(
            "{pending_mutations} mutations pending after drain (board moves pending: {pending_moves})"
        ),
        InvariantViolation::DuplicateFetch { key, epoch, count } => {
            format!("{key} epoch {epoch} fetched {count} times")
        }
        InvariantViolation::BoardMismatch { key, detail } => format!("board for {key}: {detail}"),
    }
}

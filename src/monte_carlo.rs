//! Monte Carlo Batches
//!
//! Repeats one configuration over many randomly drawn networks and
//! summarises how far shocks typically spread.
//!
//! ## Metrics
//! - Mean, max and 95th percentile of final failures
//! - Mean cascade depth and stressed survivors
//! - Systemic collapse frequency (every institution failed)
//! - Containment frequency (nothing failed beyond the shock)

use tracing::debug;

use crate::cascade::CascadeResult;
use crate::config::{run_simulation, SimulationConfig};
use crate::error::{ContagionError, Result};

/// Runs `runs` simulations. Run `k` uses seed `rng_seed + k`, so a seeded
/// batch is reproducible; an unseeded batch draws every network from entropy.
pub fn run_batch(config: &SimulationConfig, runs: usize) -> Result<Vec<CascadeResult>> {
    if runs == 0 {
        return Err(ContagionError::invalid("runs must be at least 1"));
    }
    config.validate()?;

    (0..runs)
        .map(|k| {
            let run_config = SimulationConfig {
                rng_seed: config.rng_seed.map(|seed| seed.wrapping_add(k as u64)),
                ..config.clone()
            };
            let outcome = run_simulation(&run_config)?;
            debug!(run = k, failures = outcome.result.total_failures(), "batch run finished");
            Ok(outcome.result)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct AggregatedCascadeResult {
    pub runs: usize,
    pub institutions: usize,
    pub avg_failures: f64,
    pub max_failures: usize,
    pub p95_failures: f64,
    pub avg_cascade_depth: f64,
    pub avg_stressed: f64,
    pub collapse_frequency: f64,
    pub containment_frequency: f64,
}

impl AggregatedCascadeResult {
    pub fn print(&self) {
        println!("  Runs:                    {}", self.runs);
        println!("  Avg failures:            {:.2} / {}", self.avg_failures, self.institutions);
        println!("  Max failures:            {}", self.max_failures);
        println!("  P95 failures:            {:.0}", self.p95_failures);
        println!("  Avg cascade depth:       {:.2} rounds", self.avg_cascade_depth);
        println!("  Avg stressed survivors:  {:.2}", self.avg_stressed);
        println!("  Systemic collapse:       {:.1}%", self.collapse_frequency * 100.0);
        println!("  Contained at shock:      {:.1}%", self.containment_frequency * 100.0);
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

pub fn aggregate_results(results: &[CascadeResult]) -> Result<AggregatedCascadeResult> {
    let first = results
        .first()
        .ok_or_else(|| ContagionError::invalid("cannot aggregate an empty batch"))?;
    let n = results.len() as f64;

    let mut failures: Vec<f64> = results.iter().map(|r| r.total_failures() as f64).collect();
    failures.sort_by(|a, b| a.total_cmp(b));

    Ok(AggregatedCascadeResult {
        runs: results.len(),
        institutions: first.statuses.len(),
        avg_failures: failures.iter().sum::<f64>() / n,
        max_failures: results.iter().map(CascadeResult::total_failures).max().unwrap_or(0),
        p95_failures: percentile(&failures, 0.95),
        avg_cascade_depth: results.iter().map(|r| r.cascade_depth() as f64).sum::<f64>() / n,
        avg_stressed: results.iter().map(|r| r.stressed_count() as f64).sum::<f64>() / n,
        collapse_frequency: results.iter().filter(|r| r.is_systemic_collapse()).count() as f64 / n,
        containment_frequency: results.iter().filter(|r| r.is_contained()).count() as f64 / n,
    })
}

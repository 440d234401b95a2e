//! Lesson Variants
//!
//! The baseline experiment and its four variations, expressed as
//! transformations of a base configuration so every variant runs on the
//! same seed.
//!
//! - Doubled buffers: every institution starts with more capital
//! - Dense network: more exposures per institution
//! - Multi-shock: several institutions fail at once
//! - Circuit breaker: stressed institutions freeze outgoing exposures

use serde::{Deserialize, Serialize};

use crate::config::{run_simulation, SimulationConfig, SimulationOutcome};
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    Baseline,
    DoubledBuffers,
    DenseNetwork,
    MultiShock,
    CircuitBreaker,
}

impl Variant {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Baseline,
            Self::DoubledBuffers,
            Self::DenseNetwork,
            Self::MultiShock,
            Self::CircuitBreaker,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Baseline => "Baseline",
            Self::DoubledBuffers => "Doubled Buffers",
            Self::DenseNetwork => "Dense Network",
            Self::MultiShock => "Multi-Shock",
            Self::CircuitBreaker => "Circuit Breaker",
        }
    }

    pub fn apply(&self, base: &SimulationConfig, settings: &VariantSettings) -> SimulationConfig {
        let mut config = base.clone();
        match self {
            Self::Baseline => {}
            Self::DoubledBuffers => {
                let (low, high) = base.buffer_range;
                config.buffer_range = (low * settings.buffer_scale, high * settings.buffer_scale);
            }
            Self::DenseNetwork => {
                config.edge_probability = settings.dense_edge_probability;
            }
            Self::MultiShock => {
                config.initial_failed = (0..settings.multi_shock_size.min(base.n)).collect();
            }
            Self::CircuitBreaker => {
                config.enable_circuit_breaker = true;
            }
        }
        config
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantSettings {
    pub buffer_scale: f64,
    pub dense_edge_probability: f64,
    pub multi_shock_size: usize,
}

impl Default for VariantSettings {
    fn default() -> Self {
        Self {
            buffer_scale: 2.0,
            dense_edge_probability: 0.7,
            multi_shock_size: 3,
        }
    }
}

/// Runs every variant against `base`.
pub fn compare_variants(
    base: &SimulationConfig,
    settings: &VariantSettings,
) -> Result<Vec<(Variant, SimulationOutcome)>> {
    Variant::all()
        .into_iter()
        .map(|variant| {
            let outcome = run_simulation(&variant.apply(base, settings))?;
            Ok((variant, outcome))
        })
        .collect()
}

pub fn print_comparison_table(outcomes: &[(Variant, SimulationOutcome)]) {
    println!("| Variant          | Failures | Depth | Stressed | Frozen | Per round          |");
    println!("|------------------|----------|-------|----------|--------|--------------------|");

    for (variant, outcome) in outcomes {
        let r = &outcome.result;
        println!(
            "| {:16} | {:3} / {:<3}| {:5} | {:8} | {:6} | {:18} |",
            variant.name(),
            r.total_failures(),
            r.statuses.len(),
            r.cascade_depth(),
            r.stressed_count(),
            r.frozen_count(),
            format!("{:?}", r.failures_per_round()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_change_one_field_each() {
        let base = SimulationConfig::default();
        let settings = VariantSettings::default();

        assert_eq!(Variant::Baseline.apply(&base, &settings), base);

        let doubled = Variant::DoubledBuffers.apply(&base, &settings);
        assert_eq!(doubled.buffer_range, (1.0, 3.0));
        assert_eq!(doubled.edge_probability, base.edge_probability);

        let dense = Variant::DenseNetwork.apply(&base, &settings);
        assert_eq!(dense.edge_probability, 0.7);

        let multi = Variant::MultiShock.apply(&base, &settings);
        assert_eq!(multi.initial_failed, vec![0, 1, 2]);

        let breaker = Variant::CircuitBreaker.apply(&base, &settings);
        assert!(breaker.enable_circuit_breaker);
        assert_eq!(breaker.rng_seed, base.rng_seed);
    }

    #[test]
    fn test_multi_shock_clamped_to_network_size() {
        let base = SimulationConfig { n: 2, ..Default::default() };
        let multi = Variant::MultiShock.apply(&base, &VariantSettings::default());
        assert_eq!(multi.initial_failed, vec![0, 1]);
    }

    #[test]
    fn test_compare_variants_runs_all() {
        let outcomes =
            compare_variants(&SimulationConfig::default(), &VariantSettings::default()).unwrap();
        assert_eq!(outcomes.len(), Variant::all().len());

        let multi = outcomes.iter().find(|(v, _)| *v == Variant::MultiShock).unwrap();
        assert_eq!(multi.1.result.rounds[0], vec![0, 1, 2]);

        // Same seed and shock: the breaker can only remove failures.
        let baseline = &outcomes[0].1.result;
        let breaker = outcomes.iter().find(|(v, _)| *v == Variant::CircuitBreaker).unwrap();
        assert_eq!(breaker.1.network, outcomes[0].1.network);
        assert!(breaker.1.result.total_failures() <= baseline.total_failures());
    }

    #[test]
    fn test_invalid_dense_probability_is_reported() {
        let settings = VariantSettings { dense_edge_probability: 1.5, ..Default::default() };
        assert!(compare_variants(&SimulationConfig::default(), &settings).is_err());
    }
}

//! Simulation configuration and the generate-then-cascade entry point.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cascade::{run_cascade, CascadeOptions, CascadeResult, DEFAULT_FREEZE_THRESHOLD};
use crate::error::{ContagionError, Result};
use crate::network::{generate, validate_generator_params, Network};

/// Everything one run needs. Missing JSON fields take the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub n: usize,
    pub edge_probability: f64,
    pub buffer_range: (f64, f64),
    pub initial_failed: Vec<usize>,
    pub enable_circuit_breaker: bool,
    pub freeze_threshold: f64,
    /// `None` draws the network from OS entropy.
    pub rng_seed: Option<u64>,
    pub max_rounds: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n: 20,
            edge_probability: 0.3,
            buffer_range: (0.5, 1.5),
            initial_failed: vec![0],
            enable_circuit_breaker: false,
            freeze_threshold: DEFAULT_FREEZE_THRESHOLD,
            rng_seed: Some(42),
            max_rounds: None,
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn cascade_options(&self) -> CascadeOptions {
        CascadeOptions {
            enable_circuit_breaker: self.enable_circuit_breaker,
            freeze_threshold: self.freeze_threshold,
            max_rounds: self.max_rounds,
        }
    }

    /// Rejects malformed settings before anything is generated.
    pub fn validate(&self) -> Result<()> {
        validate_generator_params(self.n, self.edge_probability, self.buffer_range)?;
        if self.initial_failed.is_empty() {
            return Err(ContagionError::invalid("initial_failed must not be empty"));
        }
        if let Some(&bad) = self.initial_failed.iter().find(|&&i| i >= self.n) {
            return Err(ContagionError::invalid(format!(
                "initial failure {} is out of range [0, {})",
                bad, self.n
            )));
        }
        self.cascade_options().validate()
    }
}

/// Generated network plus the cascade it produced.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutcome {
    pub config: SimulationConfig,
    pub network: Network,
    pub result: CascadeResult,
}

pub fn run_simulation(config: &SimulationConfig) -> Result<SimulationOutcome> {
    config.validate()?;
    let network = generate(
        config.n,
        config.edge_probability,
        config.buffer_range,
        config.rng_seed,
    )?;
    let result = run_cascade(&network, &config.initial_failed, &config.cascade_options())?;
    Ok(SimulationOutcome {
        config: config.clone(),
        network,
        result,
    })
}

//! Financial Contagion Simulation Library
//!
//! This library simulates how the failure of one financial institution
//! spreads through a network of mutual exposures, round by round, until the
//! system settles.
//!
//! ## Modules
//!
//! - `network`: Random exposure network generator (Erdős–Rényi + buffers)
//! - `cascade`: Round-based failure propagation engine with optional circuit breaker
//! - `config`: Run configuration, JSON loading and the generate-then-cascade entry point
//! - `variants`: Baseline and lesson variants (buffers, density, multi-shock, breaker)
//! - `monte_carlo`: Repeated runs over many seeds with aggregate statistics
//!
//! ## Usage
//!
//! ```bash
//! # Trace one cascade and compare the variants
//! cargo run --bin contagion --release -- --variants
//!
//! # Batch statistics per variant
//! cargo run --bin monte_carlo --release
//! ```

pub mod error;
pub mod network;
pub mod cascade;
pub mod config;
pub mod variants;
pub mod monte_carlo;

pub use cascade::{run_cascade, CascadeOptions, CascadeResult, Status};
pub use config::{run_simulation, SimulationConfig, SimulationOutcome};
pub use error::{ContagionError, Result};
pub use network::{generate, Network};

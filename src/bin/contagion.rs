//! Financial Contagion Simulation Binary
//!
//! Generates one exposure network, shocks it and prints the round-by-round
//! failure trace. With `--variants` it also compares the lesson variants on
//! the same seed.
//!
//! ## Usage
//! ```bash
//! cargo run --bin contagion --release -- --institutions 20 --density 0.3 --variants
//! ```

use std::process;

use clap::Parser;
use contagion_simulation::config::{run_simulation, SimulationConfig, SimulationOutcome};
use contagion_simulation::variants::{compare_variants, print_comparison_table, VariantSettings};
use contagion_simulation::Result;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Financial contagion cascade simulator
#[derive(Parser, Debug)]
#[command(name = "contagion")]
#[command(about = "Simulate failure cascades through a random exposure network", long_about = None)]
struct Args {
    /// JSON configuration file; flags below override its fields
    #[arg(short, long)]
    config: Option<String>,

    /// Number of institutions
    #[arg(short = 'n', long)]
    institutions: Option<usize>,

    /// Probability that any two institutions are linked
    #[arg(short, long)]
    density: Option<f64>,

    /// Lower bound of the capital buffer range
    #[arg(long)]
    buffer_low: Option<f64>,

    /// Upper bound of the capital buffer range
    #[arg(long)]
    buffer_high: Option<f64>,

    /// Institutions failed by the initial shock (comma separated)
    #[arg(long, value_delimiter = ',')]
    shock: Option<Vec<usize>>,

    /// Enable the circuit breaker
    #[arg(long)]
    circuit_breaker: bool,

    /// RNG seed (0 = random from entropy)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Abort if the cascade needs more rounds than this
    #[arg(long)]
    max_rounds: Option<usize>,

    /// Also run and compare every lesson variant
    #[arg(long)]
    variants: bool,

    /// Print the full outcome as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn build_config(&self) -> Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_json_file(path)?,
            None => SimulationConfig::default(),
        };
        if let Some(n) = self.institutions {
            config.n = n;
        }
        if let Some(p) = self.density {
            config.edge_probability = p;
        }
        if let Some(low) = self.buffer_low {
            config.buffer_range.0 = low;
        }
        if let Some(high) = self.buffer_high {
            config.buffer_range.1 = high;
        }
        if let Some(shock) = &self.shock {
            config.initial_failed = shock.clone();
        }
        if self.circuit_breaker {
            config.enable_circuit_breaker = true;
        }
        if let Some(seed) = self.seed {
            config.rng_seed = if seed == 0 { None } else { Some(seed) };
        }
        if self.max_rounds.is_some() {
            config.max_rounds = self.max_rounds;
        }
        config.validate()?;
        Ok(config)
    }
}

fn print_outcome(outcome: &SimulationOutcome) {
    let config = &outcome.config;
    println!("=======================================================");
    println!("  Financial Contagion Cascade");
    println!("=======================================================");
    println!();
    println!("Parameters:");
    println!("  Institutions: {}, Edge probability: {}", config.n, config.edge_probability);
    println!(
        "  Buffers: U({}, {}), Shock: {:?}",
        config.buffer_range.0, config.buffer_range.1, config.initial_failed
    );
    println!(
        "  Circuit breaker: {}, Seed: {}",
        if config.enable_circuit_breaker { "on" } else { "off" },
        config.rng_seed.map_or_else(|| "entropy".to_string(), |s| s.to_string())
    );
    println!(
        "  Edges: {}, Isolated institutions: {}",
        outcome.network.edge_count(),
        outcome.network.isolated_count()
    );
    println!();
    println!("Failure trace:");
    println!("{}", "-".repeat(50));
    outcome.result.print_trace();
    println!();
}

fn run(args: &Args) -> Result<()> {
    let config = args.build_config()?;

    if args.variants {
        let outcomes = compare_variants(&config, &VariantSettings::default())?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
            return Ok(());
        }
        if let Some((_, baseline)) = outcomes.first() {
            print_outcome(baseline);
        }
        println!("=======================================================");
        println!("  Variant Comparison (same seed)");
        println!("=======================================================");
        println!();
        print_comparison_table(&outcomes);
        return Ok(());
    }

    let outcome = run_simulation(&config)?;
    info!(failures = outcome.result.total_failures(), "simulation finished");
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn default_log_directive(verbose: bool) -> &'static str {
    if verbose {
        "contagion_simulation=debug,warn"
    } else {
        "warn"
    }
}

fn main() {
    let args = Args::parse();

    // RUST_LOG takes precedence over --verbose.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_directive(args.verbose)));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if let Err(e) = run(&args) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_directives_parse() {
        for verbose in [false, true] {
            assert!(EnvFilter::try_new(default_log_directive(verbose)).is_ok());
        }
        assert!(default_log_directive(true).contains("debug"));
    }
}

//! Monte Carlo Contagion Binary
//!
//! Runs every lesson variant over many random networks and reports how
//! often shocks stay contained and how often they take down the system.
//!
//! ## Usage
//! ```bash
//! cargo run --bin monte_carlo --release -- --runs 1000
//! ```

use std::process;

use clap::Parser;
use contagion_simulation::config::SimulationConfig;
use contagion_simulation::monte_carlo::{aggregate_results, run_batch, AggregatedCascadeResult};
use contagion_simulation::variants::{Variant, VariantSettings};
use contagion_simulation::Result;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Monte Carlo statistics for the contagion variants
#[derive(Parser, Debug)]
#[command(name = "monte_carlo")]
#[command(about = "Batch statistics of contagion cascades per variant", long_about = None)]
struct Args {
    /// JSON configuration file for the baseline
    #[arg(short, long)]
    config: Option<String>,

    /// Networks drawn per variant
    #[arg(short, long, default_value = "1000")]
    runs: usize,

    /// Base seed; run k uses seed + k (0 = random from entropy)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: &Args) -> Result<()> {
    let mut base = match &args.config {
        Some(path) => SimulationConfig::from_json_file(path)?,
        None => SimulationConfig::default(),
    };
    base.rng_seed = if args.seed == 0 { None } else { Some(args.seed) };
    let settings = VariantSettings::default();

    println!("=======================================================");
    println!("  Monte Carlo Contagion Study");
    println!("=======================================================");
    println!();
    println!("Parameters:");
    println!("  Institutions: {}, Runs per variant: {}", base.n, args.runs);
    println!(
        "  Edge probability: {}, Buffers: U({}, {})",
        base.edge_probability, base.buffer_range.0, base.buffer_range.1
    );
    println!();

    let mut summary: Vec<(Variant, AggregatedCascadeResult)> = Vec::new();
    for variant in Variant::all() {
        println!("Variant: {}", variant.name());
        println!("{}", "-".repeat(50));

        let results = run_batch(&variant.apply(&base, &settings), args.runs)?;
        let agg = aggregate_results(&results)?;
        agg.print();
        println!();
        summary.push((variant, agg));
    }

    println!("=======================================================");
    println!("  Summary");
    println!("=======================================================");
    println!();
    println!("| Variant          | Avg Failures | P95 | Collapse | Contained |");
    println!("|------------------|--------------|-----|----------|-----------|");
    for (variant, agg) in &summary {
        println!(
            "| {:16} | {:12.2} | {:3.0} | {:7.1}% | {:8.1}% |",
            variant.name(),
            agg.avg_failures,
            agg.p95_failures,
            agg.collapse_frequency * 100.0,
            agg.containment_frequency * 100.0,
        );
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

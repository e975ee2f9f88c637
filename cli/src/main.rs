//! Tandem Simulator CLI
//!
//! Runs a tandem queueing network to its horizon and prints the time-weighted
//! occupancy distribution of every stage and of the whole network.
//!
//! # Example
//!
//! ```bash
//! # Two stages fed at rate 2, reproducible with a fixed seed
//! tandem-sim --arrival-rate 2 --service-rates 3,5 --horizon 10000 --seed 42
//!
//! # Load the network from a JSON config and emit machine-readable output
//! tandem-sim --config network.json --json
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tandem_simulator_core_rs::stats::geometric_pmf;
use tandem_simulator_core_rs::{OccupancyDistribution, RunReport, Simulation, SimulationConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Tandem queueing network simulator
///
/// Single-threaded and reproducible when the same seed is used.
#[derive(Parser, Debug)]
#[command(name = "tandem-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON file holding a full network config
    #[arg(long, conflicts_with_all = ["arrival_rate", "service_rates", "horizon"])]
    config: Option<PathBuf>,

    /// Poisson arrival rate into the first stage
    #[arg(short = 'a', long)]
    arrival_rate: Option<f64>,

    /// Comma-separated service rates, one per stage
    #[arg(short = 's', long, value_delimiter = ',')]
    service_rates: Vec<f64>,

    /// Simulated time at which the run stops
    #[arg(short = 'd', long, default_value = "10000")]
    horizon: f64,

    /// Random seed for reproducible results
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Occupancy levels printed per distribution
    #[arg(long, default_value = "10")]
    levels: usize,

    /// Output the report as JSON
    #[arg(long)]
    json: bool,

    /// Record the per-event trace
    #[arg(long)]
    trace: bool,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(args)?;
    config.record_trace |= args.trace;

    info!(
        stages = config.stage_count(),
        arrival_rate = config.arrival_rate,
        horizon = config.duration_horizon,
        seed = args.seed,
        "Starting simulation"
    );

    let mut sim = Simulation::with_seed(config, args.seed)?;
    let report = sim.run()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_summary(sim.config(), &report, args.levels);
    if let Some(log) = sim.event_log() {
        println!(
            "\nTrace: {} events recorded ({} arrivals)",
            log.len(),
            log.arrival_count()
        );
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<SimulationConfig, Box<dyn Error>> {
    if let Some(path) = &args.config {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        return Ok(SimulationConfig::from_json(&json)?);
    }

    let arrival_rate = args
        .arrival_rate
        .ok_or("--arrival-rate is required without --config")?;
    if args.service_rates.is_empty() {
        return Err("--service-rates is required without --config".into());
    }

    Ok(SimulationConfig {
        arrival_rate,
        service_rates: args.service_rates.clone(),
        duration_horizon: args.horizon,
        record_trace: false,
    })
}

fn print_summary(config: &SimulationConfig, report: &RunReport, levels: usize) {
    println!("=== Run ===");
    println!("Final clock:      {:.3}", report.final_clock);
    println!("Events processed: {}", report.events_processed);
    println!("Jobs admitted:    {}", report.total_jobs);
    println!("Jobs departed:    {}", report.departed_jobs);

    for (index, (dist, rho)) in report
        .per_stage
        .iter()
        .zip(config.utilizations())
        .enumerate()
    {
        println!(
            "\n=== Stage {} (mu = {}, rho = {:.3}) ===",
            index, config.service_rates[index], rho
        );
        // Product form only holds for a stable stage
        let expected = (rho < 1.0).then_some(rho);
        print_distribution(dist, expected, levels);
    }

    println!("\n=== Network ===");
    print_distribution(&report.aggregate, None, levels);
}

fn print_distribution(dist: &OccupancyDistribution, rho: Option<f64>, levels: usize) {
    match rho {
        Some(rho) => {
            println!("{:>6}  {:>10}  {:>10}", "n", "P(n)", "M/M/1");
            for n in 0..levels {
                println!(
                    "{:>6}  {:>10.5}  {:>10.5}",
                    n,
                    dist.probability(n),
                    geometric_pmf(rho, n)
                );
            }
            println!(
                "Max deviation over {} levels: {:.5}",
                levels,
                dist.max_deviation(|n| geometric_pmf(rho, n), levels)
            );
        }
        None => {
            println!("{:>6}  {:>10}", "n", "P(n)");
            for n in 0..levels {
                println!("{:>6}  {:>10.5}", n, dist.probability(n));
            }
        }
    }

    if let Some(mean) = dist.mean() {
        println!("Mean occupancy: {:.4}", mean);
    }
    if let Some(max) = dist.max_level() {
        println!("Max level seen: {}", max);
    }
}

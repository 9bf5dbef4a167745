//! Sentinel Simulator CLI
//!
//! Run seeded detection scenarios or the pipeline benchmark.

use clap::Parser;
use sentinel_core::EngineConfig;
use sentinel_sim::scenarios::{parse_selection, ScenarioId};
use sentinel_sim::{run_benchmark, ScenarioResult, ScenarioRunner, SimError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sentinel-sim")]
#[command(about = "Sentinel detection/fusion scenarios and benchmarks")]
struct Args {
    /// Master seed for determinism
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (crossing, sensor_outage, swarm, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Scan cycles per scenario
    #[arg(short, long, default_value = "20")]
    cycles: u32,

    /// Seconds between scan cycles
    #[arg(long, default_value = "0.1")]
    dt: f64,

    /// Engine configuration as JSON; missing keys use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Run the extraction/fusion benchmark instead of scenarios
    #[arg(long)]
    bench: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every scenario passed.
fn run(args: &Args) -> Result<bool, SimError> {
    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => {
            info!("Loading engine config from {}", path.display());
            EngineConfig::from_json_file(path)?
        }
        None => EngineConfig::default(),
    };

    if !args.json {
        info!("Sentinel Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    if args.bench {
        let report = run_benchmark(args.seed, config)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        return Ok(true);
    }

    let scenarios: Vec<ScenarioId> = parse_selection(&args.scenario)?;
    let runner = ScenarioRunner::new(args.seed)
        .with_cycles(args.cycles)
        .with_dt(args.dt)
        .with_config(config);

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for scenario in scenarios {
        let result = runner.run(scenario)?;

        if !args.json {
            if result.passed {
                info!("✓ {} (seed={}) PASSED", scenario.name(), args.seed);
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    scenario.name(),
                    args.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        all_results.push(result);
    }

    let total = all_results.len();
    let failed = all_results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "cycles": r.cycles,
                    "time_secs": r.final_time_secs,
                    "tracks": r.final_track_count,
                    "detections": r.total_detections,
                    "mean_tracks_per_cycle": r.mean_tracks_per_cycle,
                    "mean_position_error": r.mean_position_error,
                    "threats": r.stats,
                    "metrics": r.metrics,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed, total);
        }
    }

    Ok(failed == 0)
}

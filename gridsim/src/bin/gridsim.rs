//! Single simulation run
//!
//! Builds a scenario from defaults, an optional JSON config and command-line
//! overrides, runs it, and prints the operational validation.

use clap::Parser;
use gridsim::trace::write_task_csv;
use gridsim::{AlgorithmKind, GridSimScenario, ScenarioConfig, TaskClass};
use rand::Rng;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gridsim")]
#[command(about = "Evaluate grid scheduling algorithms under synthetic load")]
struct Args {
    /// JSON scenario file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of machines in the grid (factor 1)
    #[arg(long)]
    grid_size: Option<usize>,

    /// Scheduling algorithm
    #[arg(long, value_parser = parse_algorithm)]
    scheduling_algorithm: Option<AlgorithmKind>,

    /// Scheduler queue size
    #[arg(long = "scheduler-qs")]
    scheduler_qs: Option<usize>,

    /// Machine waiting room size
    #[arg(long = "machine-qs")]
    machine_qs: Option<usize>,

    /// Scheduler hold time
    #[arg(long = "scheduler-ht")]
    scheduler_ht: Option<f64>,

    /// Seed used to do task class selection
    #[arg(long)]
    task_class_seed: Option<u64>,

    /// Seed used to generate task duration
    #[arg(long)]
    task_duration_seed: Option<u64>,

    /// Seed used to generate task arrivals
    #[arg(long)]
    task_arrival_seed: Option<u64>,

    /// Seed for the random placement algorithms
    #[arg(long)]
    placement_seed: Option<u64>,

    /// Mean task inter-arrival time
    #[arg(long)]
    task_arrival_mean: Option<f64>,

    /// Task class: NAME PROBABILITY MIN_TIME MAX_TIME (repeatable)
    #[arg(long, num_args = 4, value_names = ["NAME", "PROB", "MIN", "MAX"], action = clap::ArgAction::Append)]
    task_class: Vec<String>,

    /// Simulated time horizon
    #[arg(long)]
    sim_time: Option<f64>,

    /// Write the binary run report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write one CSV row per finished task here
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Print per-machine operational validation and debug logs
    #[arg(short, long)]
    verbose: bool,
}

fn parse_algorithm(s: &str) -> Result<AlgorithmKind, String> {
    s.parse().map_err(|e: gridsim::ConfigError| e.to_string())
}

fn parse_task_classes(values: &[String]) -> Result<Vec<TaskClass>, String> {
    values
        .chunks(4)
        .map(|chunk| {
            let [name, prob, min, max] = chunk else {
                return Err("--task-class needs NAME PROB MIN MAX".to_string());
            };
            let prob: f64 = prob.parse().map_err(|_| format!("bad probability '{}'", prob))?;
            let min: f64 = min.parse().map_err(|_| format!("bad min time '{}'", min))?;
            let max: f64 = max.parse().map_err(|_| format!("bad max time '{}'", max))?;
            Ok(if min == max {
                TaskClass::fixed(name.clone(), prob, min)
            } else {
                TaskClass::uniform(name.clone(), prob, min, max)
            })
        })
        .collect()
}

/// Seeds left unset are drawn at random so the run can be reproduced from the log
fn random_seed() -> u64 {
    rand::thread_rng().gen_range(11..=9999)
}

fn build_config(args: &Args) -> Result<ScenarioConfig, String> {
    let mut config = match &args.config {
        Some(path) => ScenarioConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => {
            let mut config = ScenarioConfig::default();
            config.task_class_seed = random_seed();
            config.task_duration_seed = random_seed();
            config.task_arrival_seed = random_seed();
            config.placement_seed = random_seed();
            config
        }
    };

    if let Some(n) = args.grid_size {
        config = config.with_grid_size(n);
    }
    if let Some(kind) = args.scheduling_algorithm {
        config.schedule_algorithm = kind;
    }
    if let Some(qs) = args.scheduler_qs {
        config.scheduler_queue_size = qs;
    }
    if let Some(qs) = args.machine_qs {
        config.machine_queue_size = qs;
    }
    if let Some(ht) = args.scheduler_ht {
        config.scheduler_hold_time = ht;
    }
    if let Some(seed) = args.task_class_seed {
        config.task_class_seed = seed;
    }
    if let Some(seed) = args.task_duration_seed {
        config.task_duration_seed = seed;
    }
    if let Some(seed) = args.task_arrival_seed {
        config.task_arrival_seed = seed;
    }
    if let Some(seed) = args.placement_seed {
        config.placement_seed = seed;
    }
    if let Some(mean) = args.task_arrival_mean {
        config.task_arrival_mean = mean;
    }
    if let Some(t) = args.sim_time {
        config.sim_time = t;
    }
    if !args.task_class.is_empty() {
        config.task_distribution = parse_task_classes(&args.task_class)?;
    }
    if args.trace.is_some() {
        config.record_finished_tasks = true;
    }

    Ok(config)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut scenario = match GridSimScenario::new(config) {
        Ok(scenario) => scenario,
        Err(e) => {
            error!("invalid scenario: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = match scenario.run() {
        Ok(report) => report,
        Err(e) => {
            error!("simulation aborted: {}", e);
            return ExitCode::FAILURE;
        }
    };

    print!("{}", report.render(args.verbose));

    if let Some(path) = &args.report {
        if let Err(e) = report.write_to(path) {
            error!("cannot write report {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        info!("report written to {}", path.display());
    }

    if let Some(path) = &args.trace {
        let written = File::create(path)
            .map_err(csv::Error::from)
            .and_then(|file| write_task_csv(scenario.finished_tasks(), file));
        if let Err(e) = written {
            error!("cannot write trace {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        info!("task trace written to {}", path.display());
    }

    ExitCode::SUCCESS
}

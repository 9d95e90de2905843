//! Van + Drone Delivery Planner - Command Line Interface
//!
//! Loads a distance table, computes the van-only baseline and searches for the
//! fastest van + drone plan.

use clap::{Args, Parser, Subcommand};
use van_drone_planner::benchmark::{Benchmark, BenchmarkConfig};
use van_drone_planner::config::PlannerConfig;
use van_drone_planner::error::{ConfigError, PlannerError};
use van_drone_planner::exact::{BranchAndBoundConfig, BranchAndBoundSolver};
use van_drone_planner::heuristics::construction::{ConstructionHeuristic, GreedyVanHeuristic};
use van_drone_planner::instance::DeliveryInstance;
use van_drone_planner::problem::DeliveryProblem;
use van_drone_planner::report::PlanReport;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "van-drone-planner")]
#[command(version = "1.0")]
#[command(about = "Exact van + drone delivery planning over a distance table")]
struct Cli {
    /// Verbose logging (debug level unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the baseline and the best van + drone plan
    Solve {
        /// CSV distance table
        #[arg(short, long)]
        table: PathBuf,

        #[command(flatten)]
        params: ConfigArgs,

        /// Search time limit in seconds
        #[arg(long)]
        time_limit: Option<f64>,

        /// Split the root branches across threads
        #[arg(long)]
        parallel: bool,

        /// Disable bound pruning (explores the full tree)
        #[arg(long)]
        no_prune: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print statistics and the baseline for a distance table
    Analyze {
        /// CSV distance table
        #[arg(short, long)]
        table: PathBuf,

        #[command(flatten)]
        params: ConfigArgs,
    },

    /// Sweep drone counts and ranges; CSV results on stdout
    Sweep {
        /// CSV distance table
        #[arg(short, long)]
        table: PathBuf,

        #[command(flatten)]
        params: ConfigArgs,

        /// Drone counts to try
        #[arg(long, value_delimiter = ',', default_value = "1,2,3")]
        drones: Vec<usize>,

        /// Drone ranges to try
        #[arg(long, value_delimiter = ',', default_value = "1,2,3,5")]
        ranges: Vec<f64>,

        /// Search time limit in seconds, per run
        #[arg(long)]
        time_limit: Option<f64>,

        /// Print the summary table instead of CSV
        #[arg(long)]
        summary: bool,
    },

    /// Write a random Euclidean distance table to stdout
    Generate {
        /// Number of locations, depot included
        #[arg(short, long, default_value = "8")]
        sites: usize,

        /// Side length of the square the locations are drawn from
        #[arg(short, long, default_value = "5")]
        extent: f64,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

/// Planner parameters; flags override the config file, which overrides defaults
#[derive(Args)]
struct ConfigArgs {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    van_speed: Option<f64>,

    #[arg(long)]
    drone_speed: Option<f64>,

    /// Minutes spent at every delivery
    #[arg(long)]
    service_time: Option<f64>,

    /// Parcels per drone per batch
    #[arg(long)]
    drone_capacity: Option<usize>,

    #[arg(long)]
    num_drones: Option<usize>,

    #[arg(long)]
    drone_max_range: Option<f64>,

    /// Maximum number of locations read from the table, depot included
    #[arg(long)]
    max_sites: Option<usize>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<PlannerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => PlannerConfig::from_json_file(path)?,
            None => PlannerConfig::default(),
        };

        if let Some(v) = self.van_speed {
            config.van_speed = v;
        }
        if let Some(v) = self.drone_speed {
            config.drone_speed = v;
        }
        if let Some(v) = self.service_time {
            config.service_time = v;
        }
        if let Some(v) = self.drone_capacity {
            config.drone_capacity = v;
        }
        if let Some(v) = self.num_drones {
            config.num_drones = v;
        }
        if let Some(v) = self.drone_max_range {
            config.drone_max_range = v;
        }
        if let Some(v) = self.max_sites {
            config.max_sites = v;
        }

        config.validate()?;
        log::debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let outcome = match cli.command {
        Commands::Solve { table, params, time_limit, parallel, no_prune, json } => {
            solve_table(&table, &params, time_limit, parallel, !no_prune, json)
        }

        Commands::Analyze { table, params } => analyze_table(&table, &params),

        Commands::Sweep { table, params, drones, ranges, time_limit, summary } => {
            run_sweep(&table, &params, drones, ranges, time_limit, summary)
        }

        Commands::Generate { sites, extent, seed } => generate_table(sites, extent, seed),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn parse_time_limit(seconds: Option<f64>) -> Result<Option<Duration>, ConfigError> {
    seconds
        .map(|s| Duration::try_from_secs_f64(s).map_err(|_| ConfigError::InvalidTimeLimit(s)))
        .transpose()
}

/// Validate the configuration first, then load the table under its site cap.
fn load_problem(path: &Path, params: &ConfigArgs) -> Result<DeliveryProblem, PlannerError> {
    let config = params.resolve()?;
    let instance = DeliveryInstance::from_file(path, config.max_sites)?;
    Ok(DeliveryProblem::new(instance, config)?)
}

fn solve_table(
    path: &Path,
    params: &ConfigArgs,
    time_limit: Option<f64>,
    parallel: bool,
    prune: bool,
    json: bool,
) -> Result<(), PlannerError> {
    let time_limit = parse_time_limit(time_limit)?;
    let problem = load_problem(path, params)?;

    let baseline = GreedyVanHeuristic::new().construct(&problem);

    let solver = BranchAndBoundSolver::new(BranchAndBoundConfig {
        prune,
        time_limit,
        parallel,
    });
    let result = solver.solve(&problem);

    let report = PlanReport::new(&problem, baseline, result);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{}", report)?;
    }

    Ok(())
}

fn analyze_table(path: &Path, params: &ConfigArgs) -> Result<(), PlannerError> {
    let problem = load_problem(path, params)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", problem.instance.statistics(problem.config.drone_max_range));

    let out_of_reach: Vec<&str> = problem
        .all_sites()
        .iter()
        .filter(|&site| {
            (0..problem.instance.dimension)
                .filter(|&from| from != site)
                .all(|from| !problem.in_drone_range(from, site))
        })
        .map(|site| problem.instance.label(site))
        .collect();

    println!("\nDrone Reach:");
    println!("  Batch limit: {} parcels", problem.config.batch_limit());
    if out_of_reach.is_empty() {
        println!("  Every site can be reached by drone from some location");
    } else {
        println!("  Van only: {}", out_of_reach.join(", "));
    }

    let baseline = GreedyVanHeuristic::new().construct(&problem);
    println!("\nBaseline Estimate:");
    println!("  Van only nearest neighbour: {:.2} min", baseline.total_time);

    Ok(())
}

fn run_sweep(
    path: &Path,
    params: &ConfigArgs,
    drones: Vec<usize>,
    ranges: Vec<f64>,
    time_limit: Option<f64>,
    summary: bool,
) -> Result<(), PlannerError> {
    let time_limit = parse_time_limit(time_limit)?;
    let base = params.resolve()?;
    let instance = DeliveryInstance::from_file(path, base.max_sites)?;

    let mut benchmark = Benchmark::new(BenchmarkConfig {
        drone_counts: drones,
        drone_ranges: ranges,
        time_limit,
        ..Default::default()
    });
    benchmark.run_sweep(&instance, &base)?;

    if summary {
        println!("{}", benchmark.generate_report());
    } else {
        benchmark.export_csv(std::io::stdout().lock())?;
    }

    Ok(())
}

fn generate_table(sites: usize, extent: f64, seed: u64) -> Result<(), PlannerError> {
    let instance = DeliveryInstance::random_euclidean(sites, extent, seed)?;
    instance.write_csv(std::io::stdout().lock())?;
    Ok(())
}

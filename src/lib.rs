//! Van + Drone Delivery Planner Library
//!
//! Finds the fastest way for one van carrying a small drone fleet to serve every
//! site of a distance table, starting from the depot.
//!
//! # Features
//!
//! - CSV distance table loading with label intersection and truncation
//! - Van-only nearest-neighbour baseline
//! - Exact branch-and-bound search over van hops and drone batches
//! - Optional parallel root split and time limit
//! - Drone fleet parameter sweeps
//!
//! # Example
//!
//! ```no_run
//! use van_drone_planner::config::PlannerConfig;
//! use van_drone_planner::instance::DeliveryInstance;
//! use van_drone_planner::problem::DeliveryProblem;
//! use van_drone_planner::heuristics::construction::{ConstructionHeuristic, GreedyVanHeuristic};
//! use van_drone_planner::exact::BranchAndBoundSolver;
//!
//! let config = PlannerConfig::default();
//! let instance = DeliveryInstance::from_file("distances.csv", config.max_sites).unwrap();
//! let problem = DeliveryProblem::new(instance, config).unwrap();
//!
//! let baseline = GreedyVanHeuristic::new().construct(&problem);
//! let result = BranchAndBoundSolver::default().solve(&problem);
//!
//! println!("Baseline: {:.2} min", baseline.total_time);
//! if let Some(best) = result.best_time() {
//!     println!("Best: {:.2} min", best);
//! }
//! ```

pub mod config;
pub mod error;
pub mod site_set;
pub mod instance;
pub mod time_model;
pub mod problem;
pub mod solution;
pub mod heuristics;
pub mod exact;
pub mod report;
pub mod benchmark;

pub use config::PlannerConfig;
pub use error::{ConfigError, DataError, PlannerError};
pub use instance::DeliveryInstance;
pub use problem::DeliveryProblem;
pub use solution::{Action, Solution};

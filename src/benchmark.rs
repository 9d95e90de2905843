//! Parameter sweeps over the drone fleet.
//!
//! Runs the van-only baseline and the exact search for every combination of
//! drone count and drone range, then reports how much the drones save.

use crate::config::PlannerConfig;
use crate::error::ConfigError;
use crate::exact::{BranchAndBoundConfig, BranchAndBoundSolver};
use crate::heuristics::construction::{ConstructionHeuristic, GreedyVanHeuristic};
use crate::instance::DeliveryInstance;
use crate::problem::DeliveryProblem;

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;

/// Result of one baseline + search run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub instance: String,
    /// Number of locations, depot included
    pub dimension: usize,
    pub num_drones: usize,
    pub drone_max_range: f64,
    pub baseline_time: f64,
    /// Best plan time, empty when the search found nothing
    pub best_time: Option<f64>,
    /// Percentage saved over the baseline
    pub improvement: Option<f64>,
    pub drone_batches: usize,
    pub status: String,
    pub nodes_explored: u64,
    /// Search wall time in seconds
    pub time: f64,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub drone_counts: Vec<usize>,
    pub drone_ranges: Vec<f64>,
    /// Time limit per search
    pub time_limit: Option<Duration>,
    pub parallel: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            drone_counts: vec![1, 2, 3],
            drone_ranges: vec![1.0, 2.0, 3.0, 5.0],
            time_limit: None,
            parallel: false,
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<RunRecord>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
        }
    }

    /// Sweep every drone count and range over one instance.
    ///
    /// `base` supplies every other parameter. Fails on the first combination
    /// that does not validate; records from earlier combinations are kept.
    pub fn run_sweep(&mut self, instance: &DeliveryInstance, base: &PlannerConfig) -> Result<(), ConfigError> {
        log::info!(
            "Sweeping {} drone counts x {} ranges on {}",
            self.config.drone_counts.len(),
            self.config.drone_ranges.len(),
            instance.name
        );

        let solver = BranchAndBoundSolver::new(BranchAndBoundConfig {
            prune: true,
            time_limit: self.config.time_limit,
            parallel: self.config.parallel,
        });

        for &num_drones in &self.config.drone_counts {
            for &drone_max_range in &self.config.drone_ranges {
                let config = PlannerConfig {
                    num_drones,
                    drone_max_range,
                    ..*base
                };
                let problem = DeliveryProblem::new(instance.clone(), config)?;
                self.results.push(Self::record_run(&problem, &solver));
            }
        }

        Ok(())
    }

    fn record_run(problem: &DeliveryProblem, solver: &BranchAndBoundSolver) -> RunRecord {
        let baseline = GreedyVanHeuristic::new().construct(problem);
        let result = solver.solve(problem);

        let best_time = result.best_time();
        let improvement = best_time
            .filter(|_| baseline.total_time > 0.0)
            .map(|best| (baseline.total_time - best) / baseline.total_time * 100.0);

        log::debug!(
            "drones={} range={} baseline={:.2} best={:?}",
            problem.config.num_drones,
            problem.config.drone_max_range,
            baseline.total_time,
            best_time
        );

        RunRecord {
            instance: problem.instance.name.clone(),
            dimension: problem.instance.dimension,
            num_drones: problem.config.num_drones,
            drone_max_range: problem.config.drone_max_range,
            baseline_time: baseline.total_time,
            best_time,
            improvement,
            drone_batches: result.solution.as_ref().map_or(0, |s| s.drone_batches()),
            status: result.status.to_string(),
            nodes_explored: result.stats.nodes_explored,
            time: result.elapsed,
        }
    }

    /// Export results as CSV
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("       Van + Drone Sweep Report\n");
        report.push_str("========================================\n\n");

        report.push_str("-".repeat(80).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<16} {:>7} {:>7} {:>10} {:>10} {:>8} {:>8} {:>8}\n",
            "Instance", "Drones", "Range", "Baseline", "Best", "Saved%", "Batches", "Time"
        ));
        report.push_str("-".repeat(80).as_str());
        report.push('\n');

        for r in &self.results {
            let best = r
                .best_time
                .map(|t| format!("{:.2}", t))
                .unwrap_or_else(|| "-".to_string());
            let saved = r
                .improvement
                .map(|g| format!("{:.1}%", g))
                .unwrap_or_else(|| "-".to_string());

            report.push_str(&format!(
                "{:<16} {:>7} {:>7.2} {:>10.2} {:>10} {:>8} {:>8} {:>8.4}\n",
                r.instance, r.num_drones, r.drone_max_range, r.baseline_time, best, saved, r.drone_batches, r.time
            ));
        }

        report.push_str("-".repeat(80).as_str());
        report.push('\n');

        if let Some(best) = self
            .results
            .iter()
            .filter(|r| r.best_time.is_some())
            .min_by(|a, b| a.best_time.partial_cmp(&b.best_time).unwrap_or(std::cmp::Ordering::Equal))
        {
            report.push_str(&format!(
                "\nFastest: {:.2} min with {} drone(s) at range {:.2}\n",
                best.best_time.unwrap_or(f64::INFINITY),
                best.num_drones,
                best.drone_max_range
            ));
        }

        report
    }

    /// Get all results
    pub fn results(&self) -> &[RunRecord] {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_instance() -> DeliveryInstance {
        let positions = [0.0f64, 1.0, 2.0, 3.0];
        let matrix = positions
            .iter()
            .map(|a| positions.iter().map(|b| (a - b).abs()).collect())
            .collect();
        DeliveryInstance::from_matrix(
            "line",
            vec!["Depot".into(), "A".into(), "B".into(), "C".into()],
            matrix,
        )
        .unwrap()
    }

    fn base_config() -> PlannerConfig {
        PlannerConfig {
            van_speed: 60.0,
            drone_speed: 120.0,
            service_time: 0.0,
            drone_capacity: 3,
            ..Default::default()
        }
    }

    fn sweep() -> Benchmark {
        let mut benchmark = Benchmark::new(BenchmarkConfig {
            drone_counts: vec![1, 2],
            drone_ranges: vec![0.5, 5.0],
            ..Default::default()
        });
        benchmark.run_sweep(&line_instance(), &base_config()).unwrap();
        benchmark
    }

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.drone_counts, vec![1, 2, 3]);
        assert!(config.time_limit.is_none());
    }

    #[test]
    fn test_sweep_covers_every_combination() {
        let benchmark = sweep();
        let results = benchmark.results();
        assert_eq!(results.len(), 4);

        for r in results {
            assert_eq!(r.baseline_time, 3.0);
            assert_eq!(r.status, "optimal");
            if r.drone_max_range < 1.0 {
                // Every site is at least one unit from any van position
                assert_eq!(r.best_time, Some(3.0));
                assert_eq!(r.drone_batches, 0);
                assert_eq!(r.improvement, Some(0.0));
            } else {
                assert_eq!(r.best_time, Some(1.5));
                assert_eq!(r.drone_batches, 1);
                assert_eq!(r.improvement, Some(50.0));
            }
        }
    }

    #[test]
    fn test_sweep_rejects_invalid_range() {
        let mut benchmark = Benchmark::new(BenchmarkConfig {
            drone_counts: vec![1],
            drone_ranges: vec![2.0, 0.0],
            ..Default::default()
        });
        let err = benchmark.run_sweep(&line_instance(), &base_config()).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositive { field: "drone_max_range", .. }));
        assert_eq!(benchmark.results().len(), 1);
    }

    #[test]
    fn test_export_csv() {
        let benchmark = sweep();
        let mut buffer = Vec::new();
        benchmark.export_csv(&mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("instance,dimension,num_drones,drone_max_range"));
        assert_eq!(lines.count(), 4);
    }

    #[test]
    fn test_generate_report() {
        let report = sweep().generate_report();
        assert!(report.contains("Van + Drone Sweep Report"));
        assert!(report.contains("line"));
        assert!(report.contains("Fastest: 1.50 min with 1 drone(s) at range 5.00"));
    }
}

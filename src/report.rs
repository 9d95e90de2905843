//! Human-readable and JSON reports of a planning run.

use crate::config::PlannerConfig;
use crate::exact::ExactResult;
use crate::problem::DeliveryProblem;
use crate::solution::Solution;
use serde::Serialize;
use std::fmt;

/// Baseline and search outcome for one instance
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub instance: String,
    pub labels: Vec<String>,
    pub config: PlannerConfig,
    pub baseline: Solution,
    /// Baseline route as labels, depot first
    pub baseline_route: Vec<String>,
    pub search: ExactResult,
    /// Best plan's actions rendered with labels; empty when no plan was found
    pub plan: Vec<String>,
    /// Percentage saved by the best plan relative to the baseline
    pub improvement: Option<f64>,
}

impl PlanReport {
    pub fn new(problem: &DeliveryProblem, baseline: Solution, search: ExactResult) -> Self {
        let instance = &problem.instance;

        let baseline_route = std::iter::once(0)
            .chain(baseline.delivered_sites())
            .map(|s| instance.label(s).to_string())
            .collect();

        let plan = search
            .solution
            .as_ref()
            .map(|s| s.describe_actions(instance))
            .unwrap_or_default();

        let improvement = search
            .best_time()
            .filter(|_| baseline.total_time > 0.0)
            .map(|best| (baseline.total_time - best) / baseline.total_time * 100.0);

        PlanReport {
            instance: instance.name.clone(),
            labels: instance.labels.clone(),
            config: problem.config,
            baseline,
            baseline_route,
            search,
            plan,
            improvement,
        }
    }
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========== Results ==========")?;
        writeln!(f, "Instance: {} ({} locations)", self.instance, self.labels.len())?;
        writeln!(f, "Baseline time (van only): {:.2} min", self.baseline.total_time)?;
        writeln!(f, "  Route: {}", self.baseline_route.join(" -> "))?;

        match self.search.best_time() {
            Some(best) => {
                writeln!(f, "Best time: {:.2} min ({})", best, self.search.status)?;
                if let Some(improvement) = self.improvement {
                    writeln!(f, "Improvement over baseline: {:.1}%", improvement)?;
                }
                writeln!(f, "Plan:")?;
                for (i, action) in self.plan.iter().enumerate() {
                    writeln!(f, "  {:>2}. {}", i + 1, action)?;
                }
            }
            None => writeln!(f, "Best time: no feasible plan found ({})", self.search.status)?,
        }

        let stats = &self.search.stats;
        write!(
            f,
            "Search: {} nodes, {} pruned, {} leaves, {} improvements in {:.4}s",
            stats.nodes_explored, stats.nodes_pruned, stats.leaves, stats.improvements, self.search.elapsed
        )
    }
}

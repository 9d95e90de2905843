//! Dispatch plans and their evaluation.
//!
//! A plan is an ordered list of actions: the van driving to a site, or a batch
//! of drones launched from the van's current position. Every action charges one
//! service time, however many sites a drone batch covers.

use crate::config::PlannerConfig;
use crate::instance::DeliveryInstance;
use crate::time_model::TravelTimes;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One dispatch decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// The van drives to `site` and serves it.
    Van { site: usize },
    /// Drones launched from the van serve `sites` in parallel.
    DroneBatch { sites: Vec<usize> },
}

impl Action {
    /// Sites served by this action
    pub fn sites(&self) -> &[usize] {
        match self {
            Action::Van { site } => std::slice::from_ref(site),
            Action::DroneBatch { sites } => sites,
        }
    }

    /// Human-readable form using the instance labels, e.g. `Van→A` or `DroneBatch→[B, C]`.
    pub fn describe(&self, instance: &DeliveryInstance) -> String {
        match self {
            Action::Van { site } => format!("Van→{}", instance.label(*site)),
            Action::DroneBatch { sites } => {
                let labels: Vec<&str> = sites.iter().map(|&s| instance.label(s)).collect();
                format!("DroneBatch→[{}]", labels.join(", "))
            }
        }
    }
}

/// A complete or partial plan with its total time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// Actions in dispatch order
    pub actions: Vec<Action>,
    /// Total elapsed minutes
    pub total_time: f64,
    /// Whether every site is delivered exactly once
    pub complete: bool,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Search nodes explored (if applicable)
    pub nodes_explored: Option<u64>,
}

impl Solution {
    /// Create a new empty solution
    pub fn new() -> Self {
        Solution {
            actions: Vec::new(),
            total_time: f64::INFINITY,
            complete: false,
            algorithm: String::new(),
            computation_time: 0.0,
            nodes_explored: None,
        }
    }

    /// Create a solution from actions, evaluating its time against `times`
    pub fn from_actions(
        instance: &DeliveryInstance,
        times: &TravelTimes,
        service_time: f64,
        actions: Vec<Action>,
        algorithm: &str,
    ) -> Self {
        let total_time = Self::evaluate(&actions, times, service_time);
        let complete = Self::covers_all_sites(&actions, instance);

        Solution {
            actions,
            total_time,
            complete,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            nodes_explored: None,
        }
    }

    /// Elapsed minutes of a plan starting at the depot.
    ///
    /// Accumulates in the same order as the search so that equal plans give
    /// bit-identical times.
    pub fn evaluate(actions: &[Action], times: &TravelTimes, service_time: f64) -> f64 {
        let mut position = 0;
        let mut elapsed = 0.0;

        for action in actions {
            match action {
                Action::Van { site } => {
                    elapsed += times.van.time(position, *site) + service_time;
                    position = *site;
                }
                Action::DroneBatch { sites } => {
                    let flight = sites
                        .iter()
                        .map(|&s| times.drone.time(position, s))
                        .fold(0.0, f64::max);
                    elapsed += flight + service_time;
                }
            }
        }

        elapsed
    }

    /// Every site in `[1, dimension)` served exactly once, depot never.
    pub fn covers_all_sites(actions: &[Action], instance: &DeliveryInstance) -> bool {
        let mut served = HashSet::new();
        for &site in actions.iter().flat_map(Action::sites) {
            if site == 0 || site >= instance.dimension || !served.insert(site) {
                return false;
            }
        }
        served.len() == instance.num_sites()
    }

    /// Whether every drone batch is non-empty, within the batch limit and
    /// within range of the van position it was launched from.
    pub fn respects_drone_limits(&self, instance: &DeliveryInstance, config: &PlannerConfig) -> bool {
        let mut position = 0;
        for action in &self.actions {
            match action {
                Action::Van { site } => position = *site,
                Action::DroneBatch { sites } => {
                    if sites.is_empty() || sites.len() > config.batch_limit() {
                        return false;
                    }
                    if sites.iter().any(|&s| instance.distance(position, s) > config.drone_max_range) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Sites in the order they are served
    pub fn delivered_sites(&self) -> Vec<usize> {
        self.actions.iter().flat_map(|a| a.sites().iter().copied()).collect()
    }

    /// Number of drone batches in the plan
    pub fn drone_batches(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::DroneBatch { .. }))
            .count()
    }

    /// Action sequence rendered with the instance labels
    pub fn describe_actions(&self, instance: &DeliveryInstance) -> Vec<String> {
        self.actions.iter().map(|a| a.describe(instance)).collect()
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Total time: {:.2} min", self.total_time)?;
        writeln!(f, "  Complete: {}", self.complete)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(nodes) = self.nodes_explored {
            writeln!(f, "  Nodes explored: {}", nodes)?;
        }
        writeln!(f, "  Actions: {:?}", self.actions)
    }
}

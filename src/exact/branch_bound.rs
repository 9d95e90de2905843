//! Exact branch-and-bound search over van moves and drone batches.
//!
//! Every node of the implicit search tree is a partial plan: the van's
//! position, the set of delivered sites and the elapsed time. Each node
//! branches into one van move per undelivered site, followed by at most one
//! drone batch launched from the van's current position. A node is abandoned
//! as soon as its elapsed time reaches the best complete plan found so far;
//! this bound is valid because every action has a non-negative cost.
//!
//! The batch rule generates a single candidate per node (undelivered sites in
//! range, index order, cut at the fleet's batch limit), so the result is
//! optimal over van orderings and those batches, not over every possible drone
//! grouping.

use crate::problem::DeliveryProblem;
use crate::site_set::SiteSet;
use crate::solution::{Action, Solution};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Branch-and-bound configuration
#[derive(Debug, Clone)]
pub struct BranchAndBoundConfig {
    /// Abandon partial plans that cannot beat the incumbent
    pub prune: bool,
    /// Stop exploring once this much wall time has passed
    pub time_limit: Option<Duration>,
    /// Explore the root's branches on the rayon pool with a shared incumbent
    pub parallel: bool,
}

impl Default for BranchAndBoundConfig {
    fn default() -> Self {
        BranchAndBoundConfig {
            prune: true,
            time_limit: None,
            parallel: false,
        }
    }
}

/// Counters collected while searching
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Nodes entered, leaves and pruned nodes included
    pub nodes_explored: u64,
    /// Nodes abandoned by the bound
    pub nodes_pruned: u64,
    /// Complete plans reached
    pub leaves: u64,
    /// Times the incumbent improved
    pub improvements: u64,
    /// Whether the time limit cut the search short
    pub deadline_hit: bool,
}

impl SearchStats {
    fn merge(&mut self, other: &SearchStats) {
        self.nodes_explored += other.nodes_explored;
        self.nodes_pruned += other.nodes_pruned;
        self.leaves += other.leaves;
        self.improvements += other.improvements;
        self.deadline_hit |= other.deadline_hit;
    }
}

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStatus {
    /// Search space exhausted; the plan is the best one reachable
    Optimal,
    /// The time limit expired; the plan (if any) is the best found so far
    TimeLimit,
    /// Search space exhausted without any complete plan
    NoFeasiblePlan,
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SearchStatus::Optimal => "optimal",
            SearchStatus::TimeLimit => "time limit reached",
            SearchStatus::NoFeasiblePlan => "no feasible plan",
        };
        f.write_str(text)
    }
}

/// Result of exact solving
#[derive(Debug, Clone, Serialize)]
pub struct ExactResult {
    /// Best plan found, if any
    pub solution: Option<Solution>,
    pub stats: SearchStats,
    pub status: SearchStatus,
    /// Wall time in seconds
    pub elapsed: f64,
}

impl ExactResult {
    /// Whether the search space was fully explored
    pub fn exhaustive(&self) -> bool {
        self.status != SearchStatus::TimeLimit
    }

    /// Best total time, if a plan was found
    pub fn best_time(&self) -> Option<f64> {
        self.solution.as_ref().map(|s| s.total_time)
    }
}

/// Compact action stored on the search trail.
#[derive(Debug, Clone, Copy)]
enum Step {
    Van(usize),
    Drone(SiteSet),
}

/// Persistent plan prefix: each node points at its parent, so a branch only
/// allocates its own step and siblings share everything above them.
#[derive(Debug)]
struct PlanStep {
    step: Step,
    parent: Trail,
}

type Trail = Option<Arc<PlanStep>>;

fn trail_from_actions(actions: &[Action]) -> Trail {
    actions.iter().fold(None, |parent, action| {
        let step = match action {
            Action::Van { site } => Step::Van(*site),
            Action::DroneBatch { sites } => Step::Drone(sites.iter().copied().collect()),
        };
        Some(Arc::new(PlanStep { step, parent }))
    })
}

fn actions_from_trail(trail: &Trail) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut node = trail.as_deref();
    while let Some(step) = node {
        actions.push(match step.step {
            Step::Van(site) => Action::Van { site },
            Step::Drone(sites) => Action::DroneBatch { sites: sites.iter().collect() },
        });
        node = step.parent.as_deref();
    }
    actions.reverse();
    actions
}

/// Best complete plan found so far.
///
/// Starts at `(+inf, none)` and only changes when a complete plan with a
/// strictly smaller time is offered.
#[derive(Debug, Clone)]
pub struct Incumbent {
    best_time: f64,
    plan: Option<Vec<Action>>,
}

impl Incumbent {
    pub fn new() -> Self {
        Incumbent {
            best_time: f64::INFINITY,
            plan: None,
        }
    }

    pub fn best_time(&self) -> f64 {
        self.best_time
    }

    pub fn plan(&self) -> Option<&[Action]> {
        self.plan.as_deref()
    }

    pub fn is_found(&self) -> bool {
        self.plan.is_some()
    }

    pub fn into_plan(self) -> Option<(f64, Vec<Action>)> {
        let best_time = self.best_time;
        self.plan.map(|plan| (best_time, plan))
    }
}

impl Default for Incumbent {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the search reads its bound and records complete plans.
trait IncumbentStore {
    fn bound(&self) -> f64;
    /// Record the plan if `time` is strictly better; returns whether it was kept.
    fn offer(&mut self, time: f64, trail: &Trail) -> bool;
}

impl IncumbentStore for Incumbent {
    fn bound(&self) -> f64 {
        self.best_time
    }

    fn offer(&mut self, time: f64, trail: &Trail) -> bool {
        if time >= self.best_time {
            return false;
        }
        self.best_time = time;
        self.plan = Some(actions_from_trail(trail));
        true
    }
}

impl<T: IncumbentStore + ?Sized> IncumbentStore for &mut T {
    fn bound(&self) -> f64 {
        (**self).bound()
    }

    fn offer(&mut self, time: f64, trail: &Trail) -> bool {
        (**self).offer(time, trail)
    }
}

/// Incumbent shared by parallel workers.
///
/// The best time is mirrored in an atomic so the bound can be read without
/// locking; writes go through the mutex and re-check the bound under it, so a
/// worker only overwrites a plan it still strictly beats.
struct SharedIncumbent {
    best_bits: AtomicU64,
    inner: Mutex<Incumbent>,
}

impl SharedIncumbent {
    fn new() -> Self {
        SharedIncumbent {
            best_bits: AtomicU64::new(f64::INFINITY.to_bits()),
            inner: Mutex::new(Incumbent::new()),
        }
    }

    fn into_inner(self) -> Incumbent {
        self.inner.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl IncumbentStore for &SharedIncumbent {
    fn bound(&self) -> f64 {
        f64::from_bits(self.best_bits.load(Ordering::Acquire))
    }

    fn offer(&mut self, time: f64, trail: &Trail) -> bool {
        if time >= self.bound() {
            return false;
        }
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !inner.offer(time, trail) {
            return false;
        }
        self.best_bits.store(time.to_bits(), Ordering::Release);
        true
    }
}

/// A child of a search node.
#[derive(Debug, Clone, Copy)]
struct Branch {
    step: Step,
    van_pos: usize,
    delivered: SiteSet,
    elapsed: f64,
}

/// Van moves to every undelivered site in index order, then the node's single
/// drone batch if any site is in range.
fn branches(problem: &DeliveryProblem, van_pos: usize, delivered: SiteSet, elapsed: f64) -> Vec<Branch> {
    let mut children = Vec::with_capacity(problem.instance.dimension);

    for site in (1..problem.instance.dimension).filter(|&i| !delivered.contains(i)) {
        children.push(Branch {
            step: Step::Van(site),
            van_pos: site,
            delivered: delivered.with(site),
            elapsed: elapsed + problem.van_hop_time(van_pos, site),
        });
    }

    let batch = problem.drone_batch(van_pos, delivered);
    if !batch.is_empty() {
        children.push(Branch {
            step: Step::Drone(batch),
            van_pos,
            delivered: delivered.union(batch),
            elapsed: elapsed + problem.batch_time(van_pos, batch),
        });
    }

    children
}

struct Searcher<'a, I> {
    problem: &'a DeliveryProblem,
    all_sites: SiteSet,
    prune: bool,
    deadline: Option<Instant>,
    incumbent: I,
    stats: SearchStats,
}

impl<'a, I: IncumbentStore> Searcher<'a, I> {
    fn new(problem: &'a DeliveryProblem, incumbent: I, prune: bool, deadline: Option<Instant>) -> Self {
        Searcher {
            problem,
            all_sites: problem.all_sites(),
            prune,
            deadline,
            incumbent,
            stats: SearchStats::default(),
        }
    }

    fn explore(&mut self, van_pos: usize, delivered: SiteSet, elapsed: f64, trail: &Trail) {
        self.stats.nodes_explored += 1;

        if delivered.is_superset(self.all_sites) {
            self.stats.leaves += 1;
            if self.incumbent.offer(elapsed, trail) {
                self.stats.improvements += 1;
                log::debug!("New best: time={:.2}, plan={:?}", elapsed, actions_from_trail(trail));
            }
            return;
        }

        if self.prune && elapsed >= self.incumbent.bound() {
            self.stats.nodes_pruned += 1;
            log::trace!("Pruned: current_time={:.2} >= best_time={:.2}", elapsed, self.incumbent.bound());
            return;
        }

        if self.deadline_reached() {
            return;
        }

        for branch in branches(self.problem, van_pos, delivered, elapsed) {
            log::trace!("Explore {:?} at t={:.2}", branch.step, elapsed);
            let child = Some(Arc::new(PlanStep {
                step: branch.step,
                parent: trail.clone(),
            }));
            self.explore(branch.van_pos, branch.delivered, branch.elapsed, &child);
        }
    }

    fn deadline_reached(&mut self) -> bool {
        if !self.stats.deadline_hit {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    log::warn!("Time limit reached after {} nodes", self.stats.nodes_explored);
                    self.stats.deadline_hit = true;
                }
            }
        }
        self.stats.deadline_hit
    }
}

/// Exhaustive branch-and-bound solver for the van-and-drones problem
pub struct BranchAndBoundSolver {
    pub config: BranchAndBoundConfig,
}

impl BranchAndBoundSolver {
    pub fn new(config: BranchAndBoundConfig) -> Self {
        BranchAndBoundSolver { config }
    }

    /// Search from the depot with nothing delivered.
    pub fn solve(&self, problem: &DeliveryProblem) -> ExactResult {
        let start = Instant::now();

        if problem.instance.num_sites() == 0 {
            log::warn!("{}: no delivery sites, nothing to plan", problem.instance.name);
            return ExactResult {
                solution: None,
                stats: SearchStats::default(),
                status: SearchStatus::NoFeasiblePlan,
                elapsed: start.elapsed().as_secs_f64(),
            };
        }

        let (incumbent, stats) = if self.config.parallel {
            self.solve_parallel(problem, start)
        } else {
            let mut incumbent = Incumbent::new();
            let stats = self.search(problem, 0, SiteSet::empty(), 0.0, &[], &mut incumbent);
            (incumbent, stats)
        };

        let elapsed = start.elapsed().as_secs_f64();
        let status = match (incumbent.is_found(), stats.deadline_hit) {
            (_, true) => SearchStatus::TimeLimit,
            (true, false) => SearchStatus::Optimal,
            (false, false) => SearchStatus::NoFeasiblePlan,
        };

        let solution = incumbent.into_plan().map(|(best_time, actions)| {
            let mut solution = Solution::from_actions(
                &problem.instance,
                &problem.times,
                problem.config.service_time,
                actions,
                "BranchAndBound",
            );
            solution.total_time = best_time;
            solution.computation_time = elapsed;
            solution.nodes_explored = Some(stats.nodes_explored);
            solution
        });

        log::info!(
            "Search finished ({}): {} nodes, {} pruned, {} leaves in {:.3}s",
            status,
            stats.nodes_explored,
            stats.nodes_pruned,
            stats.leaves,
            elapsed
        );

        ExactResult { solution, stats, status, elapsed }
    }

    /// Explore every completion of a partial plan, recording strictly better
    /// complete plans in `incumbent`.
    ///
    /// `plan` is the prefix that led to this state; it is prepended to any plan
    /// recorded. The incumbent may already hold a plan, whose time then acts as
    /// the initial bound.
    pub fn search(
        &self,
        problem: &DeliveryProblem,
        van_pos: usize,
        delivered: SiteSet,
        elapsed: f64,
        plan: &[Action],
        incumbent: &mut Incumbent,
    ) -> SearchStats {
        let deadline = self.config.time_limit.map(|limit| Instant::now() + limit);
        let trail = trail_from_actions(plan);

        let mut searcher = Searcher::new(problem, incumbent, self.config.prune, deadline);
        searcher.explore(van_pos, delivered, elapsed, &trail);
        searcher.stats
    }

    /// Root children run as independent rayon tasks sharing one incumbent.
    fn solve_parallel(&self, problem: &DeliveryProblem, start: Instant) -> (Incumbent, SearchStats) {
        let deadline = self.config.time_limit.map(|limit| start + limit);
        let shared = SharedIncumbent::new();
        let root = branches(problem, 0, SiteSet::empty(), 0.0);

        log::debug!("Splitting {} root branches across {} threads", root.len(), rayon::current_num_threads());

        let worker_stats: Vec<SearchStats> = root
            .into_par_iter()
            .map(|branch| {
                let mut searcher = Searcher::new(problem, &shared, self.config.prune, deadline);
                let trail = Some(Arc::new(PlanStep {
                    step: branch.step,
                    parent: None,
                }));
                searcher.explore(branch.van_pos, branch.delivered, branch.elapsed, &trail);
                searcher.stats
            })
            .collect();

        let mut stats = SearchStats {
            nodes_explored: 1,
            ..Default::default()
        };
        for worker in &worker_stats {
            stats.merge(worker);
        }

        (shared.into_inner(), stats)
    }
}

impl Default for BranchAndBoundSolver {
    fn default() -> Self {
        Self::new(BranchAndBoundConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::heuristics::construction::{ConstructionHeuristic, GreedyVanHeuristic};
    use crate::instance::DeliveryInstance;

    fn line_instance(positions: &[f64]) -> DeliveryInstance {
        let matrix = positions
            .iter()
            .map(|a| positions.iter().map(|b| (a - b).abs()).collect())
            .collect();
        let labels = (0..positions.len())
            .map(|i| if i == 0 { "Depot".to_string() } else { format!("S{}", i) })
            .collect();
        DeliveryInstance::from_matrix("line", labels, matrix).unwrap()
    }

    fn line_config() -> PlannerConfig {
        PlannerConfig {
            van_speed: 60.0,
            drone_speed: 60.0,
            service_time: 0.0,
            drone_capacity: 3,
            num_drones: 1,
            drone_max_range: 5.0,
            max_sites: 8,
        }
    }

    fn solve(problem: &DeliveryProblem) -> ExactResult {
        BranchAndBoundSolver::default().solve(problem)
    }

    fn random_problem(seed: u64) -> DeliveryProblem {
        let instance = DeliveryInstance::random_euclidean(7, 6.0, seed).unwrap();
        DeliveryProblem::new(instance, PlannerConfig::default()).unwrap()
    }

    #[test]
    fn test_line_scenario_best_time() {
        let problem = DeliveryProblem::new(line_instance(&[0.0, 1.0, 2.0, 3.0]), line_config()).unwrap();
        let result = solve(&problem);

        assert_eq!(result.status, SearchStatus::Optimal);
        assert_eq!(result.best_time(), Some(3.0));
        let solution = result.solution.unwrap();
        assert!(solution.complete);
    }

    #[test]
    fn test_faster_drone_takes_single_batch() {
        let config = PlannerConfig { drone_speed: 120.0, ..line_config() };
        let problem = DeliveryProblem::new(line_instance(&[0.0, 1.0, 2.0, 3.0]), config).unwrap();
        let solution = solve(&problem).solution.unwrap();

        assert_eq!(solution.actions, vec![Action::DroneBatch { sites: vec![1, 2, 3] }]);
        assert_eq!(solution.total_time, 1.5);
    }

    #[test]
    fn test_search_never_worse_than_baseline() {
        for seed in 0..5 {
            let problem = random_problem(seed);
            let baseline = GreedyVanHeuristic::new().construct(&problem);
            let best = solve(&problem).best_time().unwrap();
            assert!(best <= baseline.total_time, "seed {}: {} > {}", seed, best, baseline.total_time);
        }
    }

    #[test]
    fn test_every_site_delivered_exactly_once() {
        for seed in 0..5 {
            let problem = random_problem(seed);
            let solution = solve(&problem).solution.unwrap();

            let mut sites = solution.delivered_sites();
            sites.sort_unstable();
            assert_eq!(sites, (1..problem.instance.dimension).collect::<Vec<_>>());
            assert!(solution.respects_drone_limits(&problem.instance, &problem.config));

            let replayed = Solution::evaluate(&solution.actions, &problem.times, problem.config.service_time);
            assert_eq!(replayed, solution.total_time);
        }
    }

    #[test]
    fn test_search_is_idempotent() {
        let problem = random_problem(11);
        let first = solve(&problem).solution.unwrap();
        let second = solve(&problem).solution.unwrap();
        assert_eq!(first.total_time, second.total_time);
        assert_eq!(first.actions, second.actions);
    }

    #[test]
    fn test_pruning_does_not_change_best_time() {
        for seed in [3, 8] {
            let problem = random_problem(seed);
            let pruned = solve(&problem);
            let full = BranchAndBoundSolver::new(BranchAndBoundConfig { prune: false, ..Default::default() })
                .solve(&problem);

            assert_eq!(pruned.best_time(), full.best_time());
            assert_eq!(full.stats.nodes_pruned, 0);
            assert!(pruned.stats.nodes_pruned > 0);
            assert!(pruned.stats.nodes_explored < full.stats.nodes_explored);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        for seed in [1, 4] {
            let problem = random_problem(seed);
            let sequential = solve(&problem);
            let parallel = BranchAndBoundSolver::new(BranchAndBoundConfig { parallel: true, ..Default::default() })
                .solve(&problem);

            assert_eq!(parallel.status, SearchStatus::Optimal);
            assert_eq!(parallel.best_time(), sequential.best_time());
            assert!(parallel.solution.unwrap().complete);
        }
    }

    #[test]
    fn test_out_of_range_site_is_only_served_by_van() {
        let config = PlannerConfig { drone_speed: 600.0, service_time: 0.5, ..line_config() };
        let problem = DeliveryProblem::new(line_instance(&[0.0, 1.0, 2.0, 10.0]), config).unwrap();

        // the far site is out of range from every position the van can be at;
        // once the van stands on a site that site is already delivered
        assert!(!problem.drone_batch(0, SiteSet::empty()).contains(3));
        for van_pos in 1..problem.instance.dimension - 1 {
            assert!(!problem.drone_batch(van_pos, SiteSet::empty().with(van_pos)).contains(3));
        }

        let solution = solve(&problem).solution.unwrap();
        assert_eq!(
            solution.actions,
            vec![Action::DroneBatch { sites: vec![1, 2] }, Action::Van { site: 3 }]
        );
    }

    #[test]
    fn test_larger_range_or_capacity_never_slower() {
        let instance = line_instance(&[0.0, 1.0, 2.5, 4.0, 6.0]);
        let base = PlannerConfig {
            drone_speed: 120.0,
            service_time: 0.5,
            drone_capacity: 1,
            drone_max_range: 1.0,
            ..line_config()
        };

        let mut previous = f64::INFINITY;
        for range in [1.0, 2.0, 3.0, 5.0, 8.0] {
            let config = PlannerConfig { drone_max_range: range, ..base };
            let problem = DeliveryProblem::new(instance.clone(), config).unwrap();
            let best = solve(&problem).best_time().unwrap();
            assert!(best <= previous, "range {}: {} > {}", range, best, previous);
            previous = best;
        }

        let mut previous = f64::INFINITY;
        for capacity in 1..=4 {
            let config = PlannerConfig { drone_capacity: capacity, drone_max_range: 8.0, ..base };
            let problem = DeliveryProblem::new(instance.clone(), config).unwrap();
            let best = solve(&problem).best_time().unwrap();
            assert!(best <= previous, "capacity {}: {} > {}", capacity, best, previous);
            previous = best;
        }
    }

    #[test]
    fn test_single_site_matches_baseline() {
        let config = PlannerConfig { service_time: 0.5, ..line_config() };
        let problem = DeliveryProblem::new(line_instance(&[0.0, 2.0]), config).unwrap();

        let baseline = GreedyVanHeuristic::new().construct(&problem);
        let solution = solve(&problem).solution.unwrap();

        assert_eq!(solution.total_time, baseline.total_time);
        assert_eq!(solution.total_time, 2.5);
        assert_eq!(solution.actions.len(), 1);
    }

    #[test]
    fn test_no_sites_reports_no_plan() {
        let instance = DeliveryInstance::from_matrix("depot-only", vec!["Depot".into()], vec![vec![0.0]]).unwrap();
        let problem = DeliveryProblem::new(instance, line_config()).unwrap();
        let result = solve(&problem);

        assert_eq!(result.status, SearchStatus::NoFeasiblePlan);
        assert!(result.solution.is_none());
        assert!(result.best_time().is_none());
    }

    #[test]
    fn test_zero_time_limit_stops_immediately() {
        let problem = random_problem(2);
        let solver = BranchAndBoundSolver::new(BranchAndBoundConfig {
            time_limit: Some(Duration::ZERO),
            ..Default::default()
        });
        let result = solver.solve(&problem);

        assert_eq!(result.status, SearchStatus::TimeLimit);
        assert!(!result.exhaustive());
        assert!(result.solution.is_none());
        assert_eq!(result.stats.nodes_explored, 1);
    }

    #[test]
    fn test_search_from_partial_state_keeps_prefix() {
        let problem = DeliveryProblem::new(line_instance(&[0.0, 1.0, 2.0, 3.0]), line_config()).unwrap();
        let solver = BranchAndBoundSolver::default();
        let mut incumbent = Incumbent::new();

        let prefix = vec![Action::Van { site: 3 }];
        let stats = solver.search(&problem, 3, SiteSet::empty().with(3), 3.0, &prefix, &mut incumbent);

        assert!(stats.leaves > 0);
        let (time, plan) = incumbent.into_plan().unwrap();
        assert_eq!(time, 5.0);
        assert_eq!(plan[0], Action::Van { site: 3 });
        assert!(Solution::covers_all_sites(&plan, &problem.instance));
    }

    #[test]
    fn test_existing_incumbent_bounds_search() {
        let problem = DeliveryProblem::new(line_instance(&[0.0, 1.0, 2.0, 3.0]), line_config()).unwrap();
        let solver = BranchAndBoundSolver::default();

        let mut incumbent = Incumbent::new();
        solver.search(&problem, 0, SiteSet::empty(), 0.0, &[], &mut incumbent);
        let best = incumbent.best_time();
        let plan = incumbent.plan().unwrap().to_vec();

        let stats = solver.search(&problem, 0, SiteSet::empty(), 0.0, &[], &mut incumbent);
        assert_eq!(stats.improvements, 0);
        assert_eq!(incumbent.best_time(), best);
        assert_eq!(incumbent.plan().unwrap(), plan.as_slice());
    }

    #[test]
    fn test_trail_round_trip() {
        let actions = vec![
            Action::Van { site: 2 },
            Action::DroneBatch { sites: vec![1, 4] },
            Action::Van { site: 3 },
        ];
        assert_eq!(actions_from_trail(&trail_from_actions(&actions)), actions);
        assert!(actions_from_trail(&None).is_empty());
    }
}

use crate::problem::DeliveryProblem;
use crate::site_set::SiteSet;
use crate::solution::{Action, Solution};
use ordered_float::OrderedFloat;

pub trait ConstructionHeuristic {
    fn construct(&self, problem: &DeliveryProblem) -> Solution;
    fn name(&self) -> &str;
}

/// Nearest Neighbor van-only tour
///
/// Starting at the depot, drives to the closest unvisited site by van time
/// until every site is served. Ties go to the lowest index. The result is a
/// reference point for reports only; the exact search never reads it.
pub struct GreedyVanHeuristic;

impl GreedyVanHeuristic {
    pub fn new() -> Self {
        GreedyVanHeuristic
    }

    fn find_nearest(&self, problem: &DeliveryProblem, current: usize, visited: SiteSet) -> Option<usize> {
        (1..problem.instance.dimension)
            .filter(|&i| !visited.contains(i))
            .min_by_key(|&i| OrderedFloat(problem.times.van.time(current, i)))
    }
}

impl Default for GreedyVanHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for GreedyVanHeuristic {
    fn construct(&self, problem: &DeliveryProblem) -> Solution {
        let start = std::time::Instant::now();

        let mut actions = Vec::with_capacity(problem.instance.num_sites());
        let mut visited = SiteSet::empty();
        let mut current = 0;

        while let Some(next) = self.find_nearest(problem, current, visited) {
            actions.push(Action::Van { site: next });
            visited.insert(next);
            current = next;
        }

        let mut solution = Solution::from_actions(
            &problem.instance,
            &problem.times,
            problem.config.service_time,
            actions,
            self.name(),
        );
        solution.computation_time = start.elapsed().as_secs_f64();

        let route: Vec<&str> = solution
            .delivered_sites()
            .into_iter()
            .map(|s| problem.instance.label(s))
            .collect();
        log::info!("Greedy route: {} = {:.2} min", route.join("->"), solution.total_time);

        solution
    }

    fn name(&self) -> &str {
        "GreedyVan"
    }
}

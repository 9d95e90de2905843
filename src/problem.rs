//! A loaded instance together with validated parameters and time matrices.

use crate::config::PlannerConfig;
use crate::error::ConfigError;
use crate::instance::DeliveryInstance;
use crate::site_set::SiteSet;
use crate::time_model::TravelTimes;

/// Everything the baseline and the search read. Immutable once built, so it
/// can be shared by reference across search workers.
#[derive(Debug, Clone)]
pub struct DeliveryProblem {
    pub instance: DeliveryInstance,
    pub config: PlannerConfig,
    pub times: TravelTimes,
}

impl DeliveryProblem {
    pub fn new(instance: DeliveryInstance, config: PlannerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let times = TravelTimes::new(&instance, &config)?;
        Ok(DeliveryProblem { instance, config, times })
    }

    /// Every delivery site, depot excluded.
    #[inline]
    pub fn all_sites(&self) -> SiteSet {
        SiteSet::all_sites(self.instance.dimension)
    }

    /// Whether a drone launched at `from` may serve `site`.
    ///
    /// The check is on physical distance, not flight time.
    #[inline]
    pub fn in_drone_range(&self, from: usize, site: usize) -> bool {
        self.instance.distance(from, site) <= self.config.drone_max_range
    }

    /// The single drone batch launched from `van_pos`: undelivered sites in
    /// range, in index order, cut off at the fleet's batch limit.
    pub fn drone_batch(&self, van_pos: usize, delivered: SiteSet) -> SiteSet {
        (1..self.instance.dimension)
            .filter(|&i| !delivered.contains(i) && self.in_drone_range(van_pos, i))
            .take(self.config.batch_limit())
            .collect()
    }

    /// Minutes for a batch: the farthest drone flight plus one service time.
    pub fn batch_time(&self, van_pos: usize, batch: SiteSet) -> f64 {
        let flight = batch
            .iter()
            .map(|s| self.times.drone.time(van_pos, s))
            .fold(0.0, f64::max);
        flight + self.config.service_time
    }

    /// Minutes for the van to drive to `site` and serve it.
    #[inline]
    pub fn van_hop_time(&self, van_pos: usize, site: usize) -> f64 {
        self.times.van.time(van_pos, site) + self.config.service_time
    }
}

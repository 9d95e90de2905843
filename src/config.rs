//! Planner parameters.
//!
//! Values come from three layers, lowest precedence first: the defaults below,
//! an optional JSON file, and command-line flags applied by the binary. The
//! merged result must pass [`PlannerConfig::validate`] before any table is read.

use crate::error::ConfigError;
use crate::site_set::SiteSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Vehicle, fleet and loading parameters.
///
/// Distances are in table units (km for the bundled data) and speeds in
/// table units per hour; times are in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    /// Van speed in distance units per hour
    pub van_speed: f64,
    /// Drone speed in distance units per hour
    pub drone_speed: f64,
    /// Minutes charged once per van hop or drone batch
    pub service_time: f64,
    /// Deliveries each drone can make per batch
    pub drone_capacity: usize,
    /// Drones carried by the van
    pub num_drones: usize,
    /// Maximum distance a drone may fly from the van to a site
    pub drone_max_range: f64,
    /// Maximum number of labels loaded from the table, depot included
    pub max_sites: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            van_speed: 30.0,
            drone_speed: 50.0,
            service_time: 0.5,
            drone_capacity: 3,
            num_drones: 3,
            drone_max_range: 3.0,
            max_sites: 8,
        }
    }
}

impl PlannerConfig {
    /// Smallest accepted `max_sites`: the depot plus one site.
    pub const MIN_SITES: usize = 2;

    /// Load a configuration from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject values that would make the time model or the batch rule meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("van_speed", self.van_speed),
            ("drone_speed", self.drone_speed),
            ("drone_max_range", self.drone_max_range),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }

        if !self.service_time.is_finite() || self.service_time < 0.0 {
            return Err(ConfigError::InvalidServiceTime(self.service_time));
        }

        if self.drone_capacity == 0 {
            return Err(ConfigError::ZeroCount { field: "drone_capacity" });
        }
        if self.num_drones == 0 {
            return Err(ConfigError::ZeroCount { field: "num_drones" });
        }

        if !(Self::MIN_SITES..=SiteSet::CAPACITY).contains(&self.max_sites) {
            return Err(ConfigError::MaxSitesOutOfRange {
                value: self.max_sites,
                min: Self::MIN_SITES,
                max: SiteSet::CAPACITY,
            });
        }

        Ok(())
    }

    /// Maximum number of sites one drone batch may serve.
    #[inline]
    pub fn batch_limit(&self) -> usize {
        self.drone_capacity.saturating_mul(self.num_drones)
    }
}

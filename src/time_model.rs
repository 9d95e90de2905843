//! Travel-time matrices derived from physical distances.

use crate::config::PlannerConfig;
use crate::error::ConfigError;
use crate::instance::DeliveryInstance;

/// Minutes needed to travel between any two sites at a fixed speed.
#[derive(Debug, Clone)]
pub struct TimeMatrix {
    /// Speed in distance units per hour
    pub speed: f64,
    minutes: Vec<Vec<f64>>,
}

impl TimeMatrix {
    /// `time[i][j] = distance[i][j] / speed * 60`.
    pub fn from_distances(distances: &[Vec<f64>], speed: f64, field: &'static str) -> Result<Self, ConfigError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ConfigError::NonPositive { field, value: speed });
        }

        let minutes = distances
            .iter()
            .map(|row| row.iter().map(|d| d / speed * 60.0).collect())
            .collect();

        log::debug!("Computed time matrix at {} units/h", speed);
        Ok(TimeMatrix { speed, minutes })
    }

    #[inline]
    pub fn time(&self, i: usize, j: usize) -> f64 {
        self.minutes[i][j]
    }

    pub fn len(&self) -> usize {
        self.minutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.minutes.is_empty()
    }
}

/// Van and drone time matrices built from the same instance.
#[derive(Debug, Clone)]
pub struct TravelTimes {
    pub van: TimeMatrix,
    pub drone: TimeMatrix,
}

impl TravelTimes {
    pub fn new(instance: &DeliveryInstance, config: &PlannerConfig) -> Result<Self, ConfigError> {
        Ok(TravelTimes {
            van: TimeMatrix::from_distances(&instance.distance_matrix, config.van_speed, "van_speed")?,
            drone: TimeMatrix::from_distances(&instance.distance_matrix, config.drone_speed, "drone_speed")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distances() -> Vec<Vec<f64>> {
        vec![vec![0.0, 3.0], vec![3.0, 0.0]]
    }

    #[test]
    fn test_minutes_from_speed() {
        let tm = TimeMatrix::from_distances(&distances(), 30.0, "van_speed").unwrap();
        assert_eq!(tm.time(0, 1), 6.0);
        assert_eq!(tm.time(1, 1), 0.0);
        assert_eq!(tm.len(), 2);
    }

    #[test]
    fn test_zero_or_negative_speed_fails() {
        for speed in [0.0, -10.0, f64::INFINITY] {
            let err = TimeMatrix::from_distances(&distances(), speed, "drone_speed").unwrap_err();
            assert!(matches!(err, ConfigError::NonPositive { field: "drone_speed", .. }));
        }
    }

    #[test]
    fn test_van_and_drone_differ_by_speed_ratio() {
        let instance = DeliveryInstance::from_matrix(
            "pair",
            vec!["D".into(), "A".into()],
            distances(),
        )
        .unwrap();
        let times = TravelTimes::new(&instance, &PlannerConfig::default()).unwrap();
        let ratio = times.van.time(0, 1) / times.drone.time(0, 1);
        assert!((ratio - 50.0 / 30.0).abs() < 1e-12);
    }
}

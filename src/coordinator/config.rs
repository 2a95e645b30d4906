use std::time::Duration;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use super::locks::LockLayout;
use crate::{
    axis::{AxisId, AxisLimits},
    thermal::FanConfig,
};

/// Converts a configured number of seconds, mapping invalid values to zero.
pub(crate) fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Seconds of ephemeris covered by each track table.
    pub horizon: f64,
    pub sample_interval: f64,
    /// Seconds a built table may be reused for the same body.
    pub cache_ttl: f64,
    pub cache_capacity: u64,
}

impl TrackingConfig {
    pub fn horizon(&self) -> Duration {
        seconds(self.horizon)
    }

    pub fn sample_interval(&self) -> Duration {
        seconds(self.sample_interval)
    }

    pub fn cache_ttl(&self) -> Duration {
        seconds(self.cache_ttl)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            horizon: 86_400.0,
            sample_interval: 60.0,
            cache_ttl: 3_600.0,
            cache_capacity: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub move_timeout: f64,
    pub home_timeout: f64,
    pub poll_interval: f64,
    pub lock_layout: LockLayout,
    pub tracking: TrackingConfig,
    pub controller_fan: Option<FanConfig>,
    pub ha: AxisLimits,
    pub dec: AxisLimits,
    pub focus: AxisLimits,
}

impl CoordinatorConfig {
    pub fn move_timeout(&self) -> Duration {
        seconds(self.move_timeout)
    }

    pub fn home_timeout(&self) -> Duration {
        seconds(self.home_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval)
    }

    pub fn limits(&self, axis: AxisId) -> AxisLimits {
        match axis {
            AxisId::Ha => self.ha,
            AxisId::Dec => self.dec,
            AxisId::Focus => self.focus,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.move_timeout > 0.0, "move_timeout must be positive");
        ensure!(self.home_timeout > 0.0, "home_timeout must be positive");
        ensure!(self.poll_interval > 0.0, "poll_interval must be positive");

        let tracking = &self.tracking;
        ensure!(
            tracking.sample_interval > 0.0 && tracking.sample_interval < tracking.horizon,
            "tracking.sample_interval must be positive and shorter than tracking.horizon"
        );
        ensure!(
            tracking.cache_ttl > 0.0 && tracking.cache_ttl < tracking.horizon,
            "tracking.cache_ttl must be positive and shorter than tracking.horizon"
        );

        if let Some(fan) = &self.controller_fan {
            ensure!(
                fan.idle_timeout >= 1.0,
                "controller_fan.idle_timeout must be at least 1 second"
            );
            ensure!(
                fan.poll_interval > 0.0,
                "controller_fan.poll_interval must be positive"
            );
        }

        for axis in AxisId::ALL {
            let limits = self.limits(axis);
            ensure!(
                limits.position_min < limits.position_max,
                "{}: position_min must be below position_max",
                axis
            );
            ensure!(limits.tolerance > 0.0, "{}: tolerance must be positive", axis);
        }

        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            move_timeout: 120.0,
            home_timeout: 60.0,
            poll_interval: 0.1,
            lock_layout: LockLayout::Split,
            tracking: TrackingConfig::default(),
            controller_fan: None,
            ha: AxisLimits::default(),
            dec: AxisLimits {
                position_min: -90.0,
                position_max: 90.0,
                tolerance: 0.01,
            },
            focus: AxisLimits {
                position_min: 0.0,
                position_max: 50.0,
                tolerance: 0.01,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        CoordinatorConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_inverted_limits() {
        let mut config = CoordinatorConfig::default();
        config.focus.position_min = 60.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("focus"));
    }

    #[test]
    fn test_rejects_short_fan_timeout() {
        let config = CoordinatorConfig {
            controller_fan: Some(FanConfig {
                idle_timeout: 0.5,
                poll_interval: 1.0,
            }),
            ..CoordinatorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_cache_outliving_horizon() {
        let mut config = CoordinatorConfig::default();
        config.tracking.cache_ttl = config.tracking.horizon;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_seconds_conversion() {
        assert_eq!(seconds(1.5), Duration::from_millis(1500));
        assert_eq!(seconds(-1.0), Duration::ZERO);
    }
}

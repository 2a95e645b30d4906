//! Controller fan hysteresis loop.
//!
//! The fan is switched on while any axis is moving and kept on for
//! `idle_timeout` after the last observed activity.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::coordinator::{config::seconds, Coordinator};

fn default_poll_interval() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanConfig {
    /// Seconds the fan keeps running after the last axis activity.
    pub idle_timeout: f64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
}

impl FanConfig {
    pub fn idle_timeout(&self) -> Duration {
        seconds(self.idle_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval)
    }
}

#[derive(Debug)]
pub struct FanHysteresis {
    idle_timeout: Duration,
    disable_deadline: Option<Instant>,
    enabled: Option<bool>,
}

impl FanHysteresis {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            disable_deadline: None,
            enabled: None,
        }
    }

    /// Feeds one observation; returns the new fan state when it changes.
    pub fn update(&mut self, now: Instant, active: bool) -> Option<bool> {
        if active {
            self.disable_deadline = Some(now + self.idle_timeout);
        }
        let enabled = self.disable_deadline.is_some_and(|deadline| now < deadline);
        if self.enabled == Some(enabled) {
            return None;
        }
        self.enabled = Some(enabled);
        Some(enabled)
    }

    /// Forgets the applied state so the next update writes unconditionally.
    pub fn reset(&mut self) {
        self.enabled = None;
    }
}

pub async fn run(coordinator: Arc<Coordinator>, config: FanConfig) {
    let mut hysteresis = FanHysteresis::new(config.idle_timeout());
    let mut ticker = interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Fan control running (idle timeout {:?})",
        config.idle_timeout()
    );

    loop {
        ticker.tick().await;

        if !coordinator.is_connected() {
            hysteresis.reset();
            continue;
        }

        let active = coordinator.any_axis_active().await;
        let Some(enabled) = hysteresis.update(Instant::now(), active) else {
            continue;
        };

        match coordinator.hardware().set_fan(enabled).await {
            Ok(()) => debug!("Controller fan {}", if enabled { "on" } else { "off" }),
            Err(e) => {
                warn!("Failed to switch controller fan: {:#}", e);
                hysteresis.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_hysteresis_holds_for_idle_timeout() {
        let start = Instant::now();
        let mut fan = FanHysteresis::new(Duration::from_secs(10));

        assert_eq!(fan.update(start, false), Some(false));
        assert_eq!(fan.update(start + Duration::from_secs(1), true), Some(true));
        assert_eq!(fan.update(start + Duration::from_secs(2), true), None);
        assert_eq!(fan.update(start + Duration::from_secs(5), false), None);
        assert_eq!(fan.update(start + Duration::from_secs(11), false), None);
        assert_eq!(
            fan.update(start + Duration::from_secs(12), false),
            Some(false)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_forces_next_write() {
        let now = Instant::now();
        let mut fan = FanHysteresis::new(Duration::from_secs(5));
        assert_eq!(fan.update(now, true), Some(true));
        fan.reset();
        assert_eq!(fan.update(now, true), Some(true));
    }

    #[test]
    fn test_poll_interval_defaults_to_one_second() {
        let config: FanConfig = serde_json::from_str(r#"{"idle_timeout": 30}"#).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.idle_timeout(), Duration::from_secs(30));
    }
}

//! In-process stand-ins for the mount hardware and the ephemeris provider.
//!
//! Timing follows tokio's clock, so tests running with paused time observe
//! moves, homing and the fan loop deterministically.

pub mod axis;

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{bail, Result};
use chrono::{DateTime, TimeDelta, Utc};
use tokio::{sync::Mutex, time::Instant};
use tracing::info;

use crate::{
    axis::{AxisController, AxisId},
    ephemeris::{Ephemeris, HaDec},
    motor_controller::{Clock, MotorController, Rgb},
};
use axis::{SimAxis, SimAxisConfig};

/// Wall clock that advances with tokio time from a fixed epoch.
pub struct SimClock {
    epoch: DateTime<Utc>,
    started: Instant,
}

impl SimClock {
    pub fn new(epoch: DateTime<Utc>) -> Self {
        Self {
            epoch,
            started: Instant::now(),
        }
    }
}

impl Clock for SimClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.started.elapsed()).unwrap_or(TimeDelta::zero());
        self.epoch + elapsed
    }
}

#[derive(Debug, Clone)]
pub struct SimMountConfig {
    pub name: String,
    pub epoch: DateTime<Utc>,
    pub ha: SimAxisConfig,
    pub dec: SimAxisConfig,
    pub focus: SimAxisConfig,
    pub fan: bool,
    pub lights: bool,
}

impl Default for SimMountConfig {
    fn default() -> Self {
        Self {
            name: "sim".to_string(),
            epoch: Utc::now(),
            ha: SimAxisConfig::default(),
            dec: SimAxisConfig::default(),
            focus: SimAxisConfig::default(),
            fan: true,
            lights: true,
        }
    }
}

pub struct SimulatedMount {
    name: String,
    clock: Arc<SimClock>,
    link: Arc<AtomicBool>,
    ha: Arc<SimAxis>,
    dec: Arc<SimAxis>,
    focus: Arc<SimAxis>,
    fan: bool,
    lights: bool,
    fan_history: Mutex<Vec<(Instant, bool)>>,
    light: Mutex<Option<Rgb>>,
}

impl SimulatedMount {
    pub fn new(config: SimMountConfig) -> Self {
        let clock = Arc::new(SimClock::new(config.epoch));
        let link = Arc::new(AtomicBool::new(false));
        let axis = |name: &str, axis_config: SimAxisConfig| {
            Arc::new(SimAxis::new(name, axis_config, clock.clone(), link.clone()))
        };

        Self {
            ha: axis("ha", config.ha),
            dec: axis("dec", config.dec),
            focus: axis("focus", config.focus),
            name: config.name,
            clock,
            link,
            fan: config.fan,
            lights: config.lights,
            fan_history: Mutex::new(Vec::new()),
            light: Mutex::new(None),
        }
    }

    pub fn sim_axis(&self, axis: AxisId) -> &Arc<SimAxis> {
        match axis {
            AxisId::Ha => &self.ha,
            AxisId::Dec => &self.dec,
            AxisId::Focus => &self.focus,
        }
    }

    /// Every fan write with the tokio time it happened at.
    pub async fn fan_history(&self) -> Vec<(Instant, bool)> {
        self.fan_history.lock().await.clone()
    }

    pub async fn light(&self) -> Option<Rgb> {
        *self.light.lock().await
    }

    fn check_link(&self) -> Result<()> {
        if !self.link.load(Ordering::SeqCst) {
            bail!("{}: controller link is down", self.name);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MotorController for SimulatedMount {
    fn name(&self) -> &str {
        &self.name
    }

    fn axis(&self, axis: AxisId) -> Arc<dyn AxisController> {
        self.sim_axis(axis).clone()
    }

    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    async fn connect(&self) -> Result<()> {
        if self.link.swap(true, Ordering::SeqCst) {
            bail!("{}: already connected", self.name);
        }
        info!("Simulated controller {} connected", self.name);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.link.store(false, Ordering::SeqCst);
        info!("Simulated controller {} disconnected", self.name);
        Ok(())
    }

    fn has_fan(&self) -> bool {
        self.fan
    }

    async fn set_fan(&self, enabled: bool) -> Result<()> {
        self.check_link()?;
        self.fan_history.lock().await.push((Instant::now(), enabled));
        Ok(())
    }

    fn has_lights(&self) -> bool {
        self.lights
    }

    async fn set_light(&self, color: Rgb) -> Result<()> {
        self.check_link()?;
        *self.light.lock().await = Some(color);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SimBody {
    ha: f64,
    dec: f64,
    /// Degrees of hour angle per hour.
    rate: f64,
}

/// Bodies drifting in hour angle at a constant rate from an epoch.
pub struct SimEphemeris {
    epoch: DateTime<Utc>,
    bodies: HashMap<String, SimBody>,
}

impl SimEphemeris {
    pub const SIDEREAL_RATE: f64 = 15.041;

    pub fn new(epoch: DateTime<Utc>) -> Self {
        Self {
            epoch,
            bodies: HashMap::new(),
        }
    }

    pub fn with_body(mut self, name: &str, ha: f64, dec: f64, rate: f64) -> Self {
        self.bodies.insert(name.to_string(), SimBody { ha, dec, rate });
        self
    }
}

impl Ephemeris for SimEphemeris {
    fn resolve(&self, body: &str, at: DateTime<Utc>) -> Result<HaDec> {
        let Some(sim) = self.bodies.get(body) else {
            bail!("Unknown body: {}", body);
        };
        let hours = (at - self.epoch).num_milliseconds() as f64 / 3_600_000.0;
        let ha = (sim.ha + sim.rate * hours + 180.0).rem_euclid(360.0) - 180.0;
        Ok(HaDec::new(ha, sim.dec))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::axis::{motion::MoveTarget, state_info::MotionState};

    fn mount() -> SimulatedMount {
        SimulatedMount::new(SimMountConfig {
            epoch: DateTime::<Utc>::UNIX_EPOCH,
            ..SimMountConfig::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_fail_without_link() {
        let mount = mount();
        let ha = mount.axis(AxisId::Ha);
        assert!(ha.status().await.is_err());
        assert!(mount.set_fan(true).await.is_err());

        mount.connect().await.unwrap();
        assert!(mount.connect().await.is_err());
        assert!(ha.status().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_completes_after_travel_time() {
        let mount = mount();
        mount.connect().await.unwrap();
        let dec = mount.axis(AxisId::Dec);

        dec.move_to(MoveTarget::Absolute(20.0), false).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(dec.status().await.unwrap().motion, MotionState::Moving);
        assert!((dec.position().await.unwrap() - 10.0).abs() < 1e-6);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(dec.status().await.unwrap().is_stationary());
        assert_eq!(dec.position().await.unwrap(), 20.0);
        assert_eq!(mount.sim_axis(AxisId::Dec).moves(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_freezes_position() {
        let mount = mount();
        mount.connect().await.unwrap();
        let ha = mount.axis(AxisId::Ha);

        ha.move_to(MoveTarget::Relative(-30.0), false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        ha.stop(false).await.unwrap();
        assert!((ha.position().await.unwrap() + 5.0).abs() < 1e-6);
        assert!(ha.status().await.unwrap().is_stationary());
    }

    #[tokio::test(start_paused = true)]
    async fn test_homing_waits_for_endstop() {
        let mount = mount();
        mount.connect().await.unwrap();
        let focus = mount.axis(AxisId::Focus);

        focus.home(false).await.unwrap();
        assert_eq!(focus.status().await.unwrap().motion, MotionState::Homing);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(focus.status().await.unwrap().is_homed_at_rest());
    }

    #[test]
    fn test_ephemeris_drifts_and_wraps() {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let ephemeris = SimEphemeris::new(epoch).with_body("sun", 170.0, 23.0, 15.0);

        let later = ephemeris.resolve("sun", epoch + TimeDelta::hours(1)).unwrap();
        assert!((later.ha + 175.0).abs() < 1e-9);
        assert_eq!(later.dec, 23.0);
        assert!(ephemeris.resolve("moon", epoch).is_err());
    }
}

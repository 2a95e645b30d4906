use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use tokio::{
    sync::Mutex,
    time::{sleep, Instant},
};
use tracing::debug;

use super::SimClock;
use crate::{
    axis::{
        motion::{MoveTarget, Setpoint},
        state_info::{ControllerStatus, MotionState},
        AxisController,
    },
    motor_controller::Clock,
};

#[derive(Debug, Clone)]
pub struct SimAxisConfig {
    pub has_endstop: bool,
    /// Units per second.
    pub speed: f64,
    /// Time from starting to home until the endstop triggers; `None` never triggers.
    pub endstop_after: Option<Duration>,
    pub home_position: f64,
    pub initial_position: f64,
}

impl Default for SimAxisConfig {
    fn default() -> Self {
        Self {
            has_endstop: true,
            speed: 10.0,
            endstop_after: Some(Duration::from_secs(2)),
            home_position: 0.0,
            initial_position: 0.0,
        }
    }
}

impl SimAxisConfig {
    pub fn without_endstop() -> Self {
        Self {
            has_endstop: false,
            endstop_after: None,
            ..Self::default()
        }
    }

    pub fn with_endstop_after(mut self, after: Option<Duration>) -> Self {
        self.endstop_after = after;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }
}

enum Motion {
    Stationary,
    Moving {
        from: f64,
        to: f64,
        started: Instant,
        duration: Duration,
    },
    Homing {
        started: Instant,
    },
    Tracking(Setpoint),
}

struct SimAxisState {
    position: f64,
    homed: bool,
    motion: Motion,
}

/// Constant-speed axis whose motion is evaluated lazily from tokio time.
pub struct SimAxis {
    name: String,
    config: SimAxisConfig,
    clock: Arc<SimClock>,
    link: Arc<AtomicBool>,
    faulted: AtomicBool,
    moves: AtomicUsize,
    state: Mutex<SimAxisState>,
}

impl SimAxis {
    pub(super) fn new(
        name: &str,
        config: SimAxisConfig,
        clock: Arc<SimClock>,
        link: Arc<AtomicBool>,
    ) -> Self {
        let state = SimAxisState {
            position: config.initial_position,
            homed: false,
            motion: Motion::Stationary,
        };
        Self {
            name: name.to_string(),
            config,
            clock,
            link,
            faulted: AtomicBool::new(false),
            moves: AtomicUsize::new(0),
            state: Mutex::new(state),
        }
    }

    /// Number of move commands accepted so far.
    pub fn moves(&self) -> usize {
        self.moves.load(Ordering::SeqCst)
    }

    /// Makes status reads fail until cleared.
    pub fn set_faulted(&self, faulted: bool) {
        self.faulted.store(faulted, Ordering::SeqCst);
    }

    fn check_link(&self) -> Result<()> {
        if !self.link.load(Ordering::SeqCst) {
            bail!("Axis {}: controller link is down", self.name);
        }
        Ok(())
    }

    fn advance(&self, state: &mut SimAxisState) {
        let now = Instant::now();
        match state.motion {
            Motion::Moving {
                to,
                started,
                duration,
                ..
            } if now >= started + duration => {
                state.position = to;
                state.motion = Motion::Stationary;
            }
            Motion::Homing { started } => {
                if let Some(after) = self.config.endstop_after {
                    if now >= started + after {
                        state.position = self.config.home_position;
                        state.homed = true;
                        state.motion = Motion::Stationary;
                    }
                }
            }
            _ => {}
        }
    }

    fn current_position(&self, state: &SimAxisState) -> f64 {
        match &state.motion {
            Motion::Moving {
                from,
                to,
                started,
                duration,
            } => {
                let fraction = if duration.is_zero() {
                    1.0
                } else {
                    (started.elapsed().as_secs_f64() / duration.as_secs_f64()).min(1.0)
                };
                from + (to - from) * fraction
            }
            Motion::Tracking(setpoint) => setpoint(self.clock.now()),
            _ => state.position,
        }
    }
}

#[async_trait::async_trait]
impl AxisController for SimAxis {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_endstop(&self) -> bool {
        self.config.has_endstop
    }

    async fn move_to(&self, target: MoveTarget, blocking: bool) -> Result<()> {
        self.check_link()?;
        let duration = {
            let mut state = self.state.lock().await;
            self.advance(&mut state);
            if !matches!(state.motion, Motion::Stationary) {
                bail!("Axis {} is busy", self.name);
            }

            let from = state.position;
            let to = target.resolve(from);
            let duration = Duration::from_secs_f64((to - from).abs() / self.config.speed);
            debug!("Sim axis {} moving {:.3} -> {:.3}", self.name, from, to);
            state.motion = Motion::Moving {
                from,
                to,
                started: Instant::now(),
                duration,
            };
            duration
        };
        self.moves.fetch_add(1, Ordering::SeqCst);

        if blocking {
            sleep(duration).await;
        }
        Ok(())
    }

    async fn home(&self, blocking: bool) -> Result<()> {
        self.check_link()?;
        if !self.config.has_endstop {
            bail!("Axis {} has no endstop", self.name);
        }
        {
            let mut state = self.state.lock().await;
            state.homed = false;
            state.motion = Motion::Homing {
                started: Instant::now(),
            };
        }

        if blocking {
            if let Some(after) = self.config.endstop_after {
                sleep(after).await;
            }
        }
        Ok(())
    }

    async fn stop(&self, _blocking: bool) -> Result<()> {
        self.check_link()?;
        let mut state = self.state.lock().await;
        self.advance(&mut state);
        state.position = self.current_position(&state);
        state.motion = Motion::Stationary;
        Ok(())
    }

    async fn track(&self, setpoint: Setpoint) -> Result<()> {
        self.check_link()?;
        let mut state = self.state.lock().await;
        self.advance(&mut state);
        if !matches!(state.motion, Motion::Stationary) {
            bail!("Axis {} is busy", self.name);
        }
        state.motion = Motion::Tracking(setpoint);
        Ok(())
    }

    async fn status(&self) -> Result<ControllerStatus> {
        self.check_link()?;
        if self.faulted.load(Ordering::SeqCst) {
            bail!("Axis {}: status read timed out", self.name);
        }

        let mut state = self.state.lock().await;
        self.advance(&mut state);
        let motion = match state.motion {
            Motion::Stationary => MotionState::Stationary,
            Motion::Moving { .. } => MotionState::Moving,
            Motion::Homing { .. } => MotionState::Homing,
            Motion::Tracking(_) => MotionState::Tracking,
        };
        Ok(ControllerStatus::new(motion).with_homed(state.homed))
    }

    async fn position(&self) -> Result<f64> {
        self.check_link()?;
        let mut state = self.state.lock().await;
        self.advance(&mut state);
        Ok(self.current_position(&state))
    }
}

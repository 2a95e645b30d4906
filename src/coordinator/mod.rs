//! The motion command coordinator.
//!
//! Every public command returns a [`CommandStatus`] rather than an error:
//! hardware failures are logged and reported as `Failed`, and any lock taken
//! for the command is released by its guard on every exit path.

pub mod cancel;
pub mod command;
pub mod config;
pub mod locks;
pub mod target;

mod focus;
mod lifecycle;
mod pointing;


use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use futures::future::join_all;
use moka::future::Cache;
use tokio::{
    sync::RwLock,
    task::JoinHandle,
    time::{sleep, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    axis::{
        motion::MoveTarget, state::AxisState, state_info::ControllerStatus, Axis, AxisId,
    },
    ephemeris::{Ephemeris, HaDec},
    motor_controller::{MotorController, Rgb},
    status::{self, StatusReport},
    thermal,
    tracking::{Offsets, TrackTable},
};
use cancel::StopSignal;
use command::CommandStatus;
use config::CoordinatorConfig;
use locks::LockArbiter;
use target::Target;

pub struct Coordinator {
    config: CoordinatorConfig,
    hardware: Arc<dyn MotorController>,
    ephemeris: Arc<dyn Ephemeris>,
    ha: Axis,
    dec: Axis,
    focus: Axis,
    locks: LockArbiter,
    pointing_stop: StopSignal,
    focus_stop: StopSignal,
    connected: AtomicBool,
    homing: AtomicBool,
    target: RwLock<Target>,
    offsets: Arc<Offsets>,
    focus_set_position: RwLock<Option<f64>>,
    track_tables: Cache<String, Arc<TrackTable>>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        hardware: Arc<dyn MotorController>,
        ephemeris: Arc<dyn Ephemeris>,
    ) -> Self {
        let axis = |id: AxisId| Axis::new(id, hardware.axis(id), config.limits(id));
        let (ha, dec, focus) = (axis(AxisId::Ha), axis(AxisId::Dec), axis(AxisId::Focus));

        let track_tables = Cache::builder()
            .max_capacity(config.tracking.cache_capacity)
            .time_to_live(config.tracking.cache_ttl())
            .build();

        Coordinator {
            locks: LockArbiter::new(config.lock_layout),
            ha,
            dec,
            focus,
            hardware,
            ephemeris,
            pointing_stop: StopSignal::new(),
            focus_stop: StopSignal::new(),
            connected: AtomicBool::new(false),
            homing: AtomicBool::new(false),
            target: RwLock::new(Target::None),
            offsets: Arc::new(Offsets::default()),
            focus_set_position: RwLock::new(None),
            track_tables,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn hardware(&self) -> &Arc<dyn MotorController> {
        &self.hardware
    }

    pub fn axis(&self, id: AxisId) -> &Axis {
        match id {
            AxisId::Ha => &self.ha,
            AxisId::Dec => &self.dec,
            AxisId::Focus => &self.focus,
        }
    }

    pub fn axes(&self) -> [&Axis; 3] {
        [&self.ha, &self.dec, &self.focus]
    }

    fn pointing_axes(&self) -> [&Axis; 2] {
        [&self.ha, &self.dec]
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_homing(&self) -> bool {
        self.homing.load(Ordering::Acquire)
    }

    /// True while a pointing stop is waiting for in-flight commands to unwind.
    pub fn is_stopping(&self) -> bool {
        self.pointing_stop.is_stopping()
    }

    pub async fn target(&self) -> Target {
        self.target.read().await.clone()
    }

    pub fn offsets(&self) -> HaDec {
        self.offsets.snapshot()
    }

    pub async fn focus_set_position(&self) -> Option<f64> {
        *self.focus_set_position.read().await
    }

    /// Best-effort snapshot; takes no command lock.
    pub async fn report_status(&self) -> StatusReport {
        status::collect(self).await
    }

    /// Whether any axis controller reports motion. Read failures count as idle.
    pub async fn any_axis_active(&self) -> bool {
        for axis in self.axes() {
            match axis.controller().status().await {
                Ok(status) if status.is_active() => return true,
                Ok(_) => {}
                Err(e) => debug!("Status read for axis {} failed: {:#}", axis.id(), e),
            }
        }
        false
    }

    /// Starts the fan loop when a controller fan is configured.
    pub fn spawn_thermal(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let fan = self.config.controller_fan.clone()?;
        if !self.hardware.has_fan() {
            warn!(
                "Controller fan configured but {} has no fan output",
                self.hardware.name()
            );
            return None;
        }
        Some(tokio::spawn(thermal::run(self.clone(), fan)))
    }

    pub async fn set_light(&self, color: &str) -> CommandStatus {
        if !self.hardware.has_lights() {
            return CommandStatus::NoLights;
        }
        let Some(rgb) = Rgb::from_hex(color) else {
            return CommandStatus::InvalidLightColor;
        };
        if !self.is_connected() {
            return CommandStatus::NotConnected;
        }

        match self.hardware.set_light(rgb).await {
            Ok(()) => CommandStatus::Succeeded,
            Err(e) => {
                error!("Failed to set light color {}: {:#}", color, e);
                CommandStatus::Failed
            }
        }
    }

    /// Moves every listed axis at once and waits for all of them.
    ///
    /// A stop raised before the motion is issued abandons the move, halting
    /// any axis already started, and reports `Failed`.
    async fn move_axes(
        &self,
        moves: &[(&Axis, MoveTarget)],
        cancel: &CancellationToken,
    ) -> Result<CommandStatus> {
        let mut expected = Vec::with_capacity(moves.len());
        for (axis, target) in moves {
            let current = axis
                .controller()
                .position()
                .await
                .with_context(|| format!("Failed to read axis {} position", axis.id()))?;
            expected.push(target.resolve(current));
        }

        let mut started: Vec<&Axis> = Vec::with_capacity(moves.len());
        for (axis, target) in moves {
            if cancel.is_cancelled() {
                for axis in &started {
                    self.halt(axis).await;
                }
                let axes: Vec<&Axis> = moves.iter().map(|(axis, _)| *axis).collect();
                return Ok(self.abort(&axes).await);
            }
            if let Err(e) = self.begin_move(axis, *target).await {
                for axis in started {
                    self.halt(axis).await;
                    self.settle(axis).await;
                }
                return Err(e);
            }
            started.push(*axis);
        }

        let waits = moves
            .iter()
            .zip(&expected)
            .map(|((axis, _), expected)| self.finish_move(axis, *expected));
        join_all(waits).await.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(CommandStatus::Succeeded)
    }

    async fn begin_move(&self, axis: &Axis, target: MoveTarget) -> Result<()> {
        axis.transition(AxisState::Moving).await?;
        if let Err(e) = axis.controller().move_to(target, false).await {
            self.settle(axis).await;
            return Err(e.context(format!("Failed to start axis {} move", axis.id())));
        }
        debug!("Axis {} moving to {:?}", axis.id(), target);
        Ok(())
    }

    async fn finish_move(&self, axis: &Axis, expected: f64) -> Result<()> {
        let waited = self
            .wait_until_stationary(axis, self.config.move_timeout())
            .await;
        if waited.is_err() {
            self.halt(axis).await;
        }
        axis.transition(AxisState::Idle).await?;
        waited?;

        let position = axis.controller().position().await?;
        if !axis.limits().within_tolerance(position, expected) {
            anyhow::bail!(
                "Axis {} stopped at {:.4}, expected {:.4}",
                axis.id(),
                position,
                expected
            );
        }
        Ok(())
    }

    async fn wait_until_stationary(
        &self,
        axis: &Axis,
        timeout: std::time::Duration,
    ) -> Result<ControllerStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = axis.controller().status().await?;
            if status.is_stationary() {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                anyhow::bail!(
                    "Axis {} did not finish moving within {:?}",
                    axis.id(),
                    timeout
                );
            }
            sleep(self.config.poll_interval()).await;
        }
    }

    /// Blocking stop; failures are only logged.
    async fn halt(&self, axis: &Axis) {
        if let Err(e) = axis.controller().stop(true).await {
            warn!("Failed to stop axis {}: {:#}", axis.id(), e);
        }
    }

    /// Returns an active axis to `Idle` after its motion was stopped.
    async fn settle(&self, axis: &Axis) {
        if matches!(axis.state().await, AxisState::Moving | AxisState::Tracking) {
            if let Err(e) = axis.transition(AxisState::Idle).await {
                error!("{}", e);
            }
        }
    }

    /// Cooperative abort: non-blocking stops, axes back to `Idle`.
    async fn abort(&self, axes: &[&Axis]) -> CommandStatus {
        for axis in axes {
            if let Err(e) = axis.controller().stop(false).await {
                warn!("Failed to stop axis {}: {:#}", axis.id(), e);
            }
            self.settle(axis).await;
        }
        info!("Stop requested, abandoning command");
        CommandStatus::Failed
    }
}

/// Maps the internal result of a command to what the caller sees.
fn conclude(command: &str, result: Result<CommandStatus>) -> CommandStatus {
    match result {
        Ok(status) => {
            if status.is_success() {
                info!("{} succeeded", command);
            } else {
                info!("{} rejected: {}", command, status);
            }
            status
        }
        Err(e) => {
            error!("{} failed: {:#}", command, e);
            CommandStatus::Failed
        }
    }
}

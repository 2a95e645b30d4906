use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chrono::TimeDelta;
use futures::future::join_all;
use tokio::time::sleep;
use tracing::{error, info};

use super::{command::CommandStatus, locks::LockGroup, target::Target, Coordinator};
use crate::axis::{
    state::AxisState,
    state_info::{ControllerStatus, MotionState},
    Axis,
};

/// Marks the mount as homing until dropped.
struct HomingFlag<'a>(&'a AtomicBool);

impl<'a> HomingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for HomingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Coordinator {
    pub async fn initialize(&self) -> CommandStatus {
        let Some(_locks) = self.locks.try_acquire_all(&LockGroup::ALL) else {
            return CommandStatus::Blocked;
        };
        if self.is_connected() {
            return CommandStatus::NotDisconnected;
        }

        if let Err(e) = self.hardware.connect().await {
            error!("Failed to connect to {}: {:#}", self.hardware.name(), e);
            return CommandStatus::Failed;
        }

        for axis in self.axes() {
            if let Err(e) = axis.transition(AxisState::NotHomed).await {
                error!("{}", e);
            }
        }
        *self.target.write().await = Target::None;
        *self.focus_set_position.write().await = None;
        self.offsets.reset();
        self.connected.store(true, Ordering::Release);

        info!("Connected to {}", self.hardware.name());
        CommandStatus::Succeeded
    }

    pub async fn shutdown(&self) -> CommandStatus {
        let Some(_locks) = self.locks.try_acquire_all(&LockGroup::ALL) else {
            return CommandStatus::Blocked;
        };
        if !self.is_connected() {
            return CommandStatus::NotConnected;
        }

        self.connected.store(false, Ordering::Release);
        let result = self.hardware.shutdown().await;

        for axis in self.axes() {
            if let Err(e) = axis.transition(AxisState::Disconnected).await {
                error!("{}", e);
            }
        }
        *self.target.write().await = Target::None;

        match result {
            Ok(()) => {
                info!("Disconnected from {}", self.hardware.name());
                CommandStatus::Succeeded
            }
            Err(e) => {
                error!(
                    "Error while disconnecting from {}: {:#}",
                    self.hardware.name(),
                    e
                );
                CommandStatus::Failed
            }
        }
    }

    /// Homes every axis in parallel.
    ///
    /// Needs both group locks plus the individual lock of each axis with an
    /// endstop; if any is taken the command is `Blocked` and nothing is held.
    pub async fn home(&self) -> CommandStatus {
        let Some(_groups) = self.locks.try_acquire_all(&LockGroup::ALL) else {
            return CommandStatus::Blocked;
        };
        let mut axis_locks = Vec::new();
        for axis in self.axes() {
            if !axis.has_endstop() {
                continue;
            }
            match axis.try_lock() {
                Some(guard) => axis_locks.push(guard),
                None => return CommandStatus::Blocked,
            }
        }

        if !self.is_connected() {
            return CommandStatus::NotConnected;
        }

        let _homing = HomingFlag::raise(&self.homing);
        {
            let mut target = self.target.write().await;
            if target.body().is_some() {
                *target = Target::None;
            }
        }

        let axes = self.axes();
        let results = join_all(axes.iter().map(|axis| self.home_axis(axis))).await;

        let mut status = CommandStatus::Succeeded;
        for (axis, result) in axes.iter().zip(results) {
            if let Err(e) = result {
                error!("Failed to home axis {}: {:#}", axis.id(), e);
                status = CommandStatus::Failed;
            }
        }
        if status.is_success() {
            info!("Homing complete");
        }
        status
    }

    async fn home_axis(&self, axis: &Axis) -> Result<()> {
        if matches!(axis.state().await, AxisState::Moving | AxisState::Tracking) {
            self.halt(axis).await;
            self.settle(axis).await;
        }

        if !axis.has_endstop() {
            if axis.state().await == AxisState::NotHomed {
                axis.transition(AxisState::Idle).await?;
                info!(
                    "Axis {} has no endstop, using current position as reference",
                    axis.id()
                );
            }
            return Ok(());
        }

        axis.transition(AxisState::Homing).await?;
        if let Err(e) = axis.controller().home(false).await {
            axis.transition(AxisState::NotHomed).await?;
            return Err(e.context(format!("Failed to start homing axis {}", axis.id())));
        }

        match self.wait_for_endstop(axis).await {
            Ok(status) if status.is_homed_at_rest() => {
                axis.transition(AxisState::Idle).await?;
                info!("Axis {} homed", axis.id());
                Ok(())
            }
            Ok(status) => {
                axis.transition(AxisState::NotHomed).await?;
                anyhow::bail!(
                    "Axis {} stopped homing without reaching its endstop ({:?})",
                    axis.id(),
                    status.motion
                )
            }
            Err(e) => {
                self.halt(axis).await;
                axis.transition(AxisState::NotHomed).await?;
                Err(e)
            }
        }
    }

    /// Polls until the controller leaves its homing motion, with the deadline
    /// measured on the controller clock.
    async fn wait_for_endstop(&self, axis: &Axis) -> Result<ControllerStatus> {
        let clock = self.hardware.clock();
        let timeout = self.config.home_timeout();
        let deadline =
            clock.now() + TimeDelta::from_std(timeout).context("Home timeout out of range")?;

        loop {
            sleep(self.config.poll_interval()).await;
            let status = axis.controller().status().await?;
            if status.motion != MotionState::Homing {
                return Ok(status);
            }
            if clock.now() >= deadline {
                anyhow::bail!(
                    "Axis {} did not find its endstop within {:?}",
                    axis.id(),
                    timeout
                );
            }
        }
    }
}

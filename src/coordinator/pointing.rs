use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{command::CommandStatus, conclude, locks::LockGroup, target::Target, Coordinator};
use crate::{
    axis::{motion::MoveTarget, state::AxisState},
    tracking::{self, TrackTable},
};

impl Coordinator {
    pub async fn slew_hadec(&self, ha: f64, dec: f64) -> CommandStatus {
        let Some(_pointing) = self.locks.try_acquire(LockGroup::Pointing) else {
            return CommandStatus::Blocked;
        };
        let cancel = self.pointing_stop.token();
        conclude("slew_hadec", self.slew_locked(ha, dec, &cancel).await)
    }

    async fn slew_locked(
        &self,
        ha: f64,
        dec: f64,
        cancel: &CancellationToken,
    ) -> Result<CommandStatus> {
        if let Some(status) = self.check_pointing().await {
            return Ok(status);
        }
        if !self.ha.limits().contains(ha) || !self.dec.limits().contains(dec) {
            return Ok(CommandStatus::PositionOutsideLimits);
        }

        self.stop_tracking().await;
        *self.target.write().await = Target::Fixed { ha, dec };
        self.offsets.reset();

        self.move_axes(
            &[
                (&self.ha, MoveTarget::Absolute(ha)),
                (&self.dec, MoveTarget::Absolute(dec)),
            ],
            cancel,
        )
        .await
    }

    pub async fn track_body(&self, body: &str) -> CommandStatus {
        let Some(_pointing) = self.locks.try_acquire(LockGroup::Pointing) else {
            return CommandStatus::Blocked;
        };
        let cancel = self.pointing_stop.token();

        let status = conclude("track_body", self.track_locked(body, &cancel).await);
        if !status.is_success() {
            // Leave nothing half-tracking behind a failed start.
            for axis in self.pointing_axes() {
                if axis.state().await == AxisState::Tracking {
                    self.halt(axis).await;
                    self.settle(axis).await;
                }
            }
            let mut target = self.target.write().await;
            if target.body() == Some(body) {
                *target = Target::None;
            }
        }
        status
    }

    async fn track_locked(
        &self,
        body: &str,
        cancel: &CancellationToken,
    ) -> Result<CommandStatus> {
        if let Some(status) = self.check_pointing().await {
            return Ok(status);
        }

        self.stop_tracking().await;
        *self.target.write().await = Target::Body {
            name: body.to_string(),
        };

        let table = self.track_table(body).await?;
        let (ha_setpoint, dec_setpoint) = tracking::setpoints(table, self.offsets.clone());

        let now = self.hardware.clock().now();
        let (ha, dec) = (ha_setpoint(now), dec_setpoint(now));
        if !self.ha.limits().contains(ha) || !self.dec.limits().contains(dec) {
            warn!(
                "{} is outside the pointing limits (HA {:.3}, Dec {:.3})",
                body, ha, dec
            );
            return Ok(CommandStatus::PositionOutsideLimits);
        }

        let acquired = self
            .move_axes(
                &[
                    (&self.ha, MoveTarget::Absolute(ha)),
                    (&self.dec, MoveTarget::Absolute(dec)),
                ],
                cancel,
            )
            .await?;
        if !acquired.is_success() {
            return Ok(acquired);
        }

        if cancel.is_cancelled() {
            return Ok(self.abort(&self.pointing_axes()).await);
        }

        for (axis, setpoint) in [(&self.ha, ha_setpoint), (&self.dec, dec_setpoint)] {
            axis.controller()
                .track(setpoint)
                .await
                .with_context(|| format!("Failed to start tracking on axis {}", axis.id()))?;
            axis.transition(AxisState::Tracking).await?;
        }
        info!("Tracking {}", body);
        Ok(CommandStatus::Succeeded)
    }

    /// Accumulates a pointing offset.
    ///
    /// While a body is tracked the live setpoints pick the offset up on their
    /// next evaluation; otherwise the axes are moved by the delta immediately.
    pub async fn offset(&self, ha_delta: f64, dec_delta: f64) -> CommandStatus {
        let Some(_pointing) = self.locks.try_acquire(LockGroup::Pointing) else {
            return CommandStatus::Blocked;
        };
        let cancel = self.pointing_stop.token();
        conclude("offset", self.offset_locked(ha_delta, dec_delta, &cancel).await)
    }

    async fn offset_locked(
        &self,
        ha_delta: f64,
        dec_delta: f64,
        cancel: &CancellationToken,
    ) -> Result<CommandStatus> {
        if let Some(status) = self.check_pointing().await {
            return Ok(status);
        }

        let tracking_body = self.target.read().await.body().is_some()
            && self.ha.state().await == AxisState::Tracking;
        if tracking_body {
            self.offsets.add(ha_delta, dec_delta);
            debug!(
                "Offset applied to live setpoints: {:?}",
                self.offsets.snapshot()
            );
            return Ok(CommandStatus::Succeeded);
        }

        let ha = self.ha.controller().position().await? + ha_delta;
        let dec = self.dec.controller().position().await? + dec_delta;
        if !self.ha.limits().contains(ha) || !self.dec.limits().contains(dec) {
            return Ok(CommandStatus::PositionOutsideLimits);
        }

        let status = self
            .move_axes(
                &[
                    (&self.ha, MoveTarget::Relative(ha_delta)),
                    (&self.dec, MoveTarget::Relative(dec_delta)),
                ],
                cancel,
            )
            .await?;
        if status.is_success() {
            self.offsets.add(ha_delta, dec_delta);
        }
        Ok(status)
    }

    /// Halts the pointing axes, waiting for any in-flight pointing command to
    /// observe the stop and release its lock.
    pub async fn stop(&self) -> CommandStatus {
        if !self.is_connected() {
            return CommandStatus::NotConnected;
        }

        let stopping = self.pointing_stop.raise();
        for axis in self.pointing_axes() {
            if let Err(e) = axis.controller().stop(false).await {
                warn!("Failed to signal stop on axis {}: {:#}", axis.id(), e);
            }
        }

        let pointing = self.locks.acquire(LockGroup::Pointing).await;
        let status = self.stop_locked().await;
        // The fresh token must be armed before the next command can lock.
        drop(stopping);
        drop(pointing);
        status
    }

    async fn stop_locked(&self) -> CommandStatus {
        if !self.is_connected() {
            return CommandStatus::NotConnected;
        }

        let mut status = CommandStatus::Succeeded;
        for axis in self.pointing_axes() {
            if let Err(e) = axis.controller().stop(true).await {
                error!("Failed to stop axis {}: {:#}", axis.id(), e);
                status = CommandStatus::Failed;
            }
            self.settle(axis).await;
        }
        *self.target.write().await = Target::None;

        info!("Pointing stopped");
        status
    }

    /// Rejects pointing commands the hardware can't currently accept.
    async fn check_pointing(&self) -> Option<CommandStatus> {
        if !self.is_connected() {
            return Some(CommandStatus::NotConnected);
        }
        for axis in self.pointing_axes() {
            match axis.state().await {
                AxisState::NotHomed => return Some(CommandStatus::StepperNotHomed),
                AxisState::Idle | AxisState::Tracking => {}
                _ => return Some(CommandStatus::StepperNotIdle),
            }
        }
        None
    }

    async fn stop_tracking(&self) {
        for axis in self.pointing_axes() {
            if axis.state().await == AxisState::Tracking {
                self.halt(axis).await;
                self.settle(axis).await;
            }
        }
    }

    async fn track_table(&self, body: &str) -> Result<Arc<TrackTable>> {
        let now = self.hardware.clock().now();
        if let Some(table) = self.track_tables.get(body).await {
            if table.covers(now) {
                debug!("Reusing track table for {}", body);
                return Ok(table);
            }
        }

        let ephemeris = self.ephemeris.clone();
        let name = body.to_string();
        let horizon = self.config.tracking.horizon();
        let interval = self.config.tracking.sample_interval();
        let table = tokio::task::spawn_blocking(move || {
            TrackTable::build(ephemeris.as_ref(), &name, now, horizon, interval)
        })
        .await
        .context("Track table builder panicked")??;

        let table = Arc::new(table);
        self.track_tables.insert(body.to_string(), table.clone()).await;
        info!(
            "Built track table for {} ({} samples)",
            body,
            table.samples().len()
        );
        Ok(table)
    }
}

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{command::CommandStatus, conclude, locks::LockGroup, Coordinator};
use crate::axis::{motion::MoveTarget, state::AxisState};

impl Coordinator {
    pub async fn set_focus(&self, position: f64) -> CommandStatus {
        let Some(_focus) = self.locks.try_acquire(LockGroup::Focus) else {
            return CommandStatus::Blocked;
        };
        let cancel = self.focus_stop.token();
        conclude("set_focus", self.focus_locked(position, &cancel).await)
    }

    async fn focus_locked(
        &self,
        position: f64,
        cancel: &CancellationToken,
    ) -> Result<CommandStatus> {
        if !self.is_connected() {
            return Ok(CommandStatus::NotConnected);
        }
        match self.focus.state().await {
            AxisState::Idle => {}
            AxisState::NotHomed => return Ok(CommandStatus::StepperNotHomed),
            _ => return Ok(CommandStatus::StepperNotIdle),
        }
        if !self.focus.limits().contains(position) {
            return Ok(CommandStatus::PositionOutsideLimits);
        }

        *self.focus_set_position.write().await = Some(position);
        let status = self
            .move_axes(&[(&self.focus, MoveTarget::Absolute(position))], cancel)
            .await?;
        if status.is_success() {
            info!("Focus set to {:.3}", position);
        }
        Ok(status)
    }

    pub async fn stop_focus(&self) -> CommandStatus {
        if !self.is_connected() {
            return CommandStatus::NotConnected;
        }

        let stopping = self.focus_stop.raise();
        if let Err(e) = self.focus.controller().stop(false).await {
            warn!("Failed to signal stop on axis {}: {:#}", self.focus.id(), e);
        }

        let focus = self.locks.acquire(LockGroup::Focus).await;
        let status = self.stop_focus_locked().await;
        drop(stopping);
        drop(focus);
        status
    }

    async fn stop_focus_locked(&self) -> CommandStatus {
        if !self.is_connected() {
            return CommandStatus::NotConnected;
        }

        let status = match self.focus.controller().stop(true).await {
            Ok(()) => CommandStatus::Succeeded,
            Err(e) => {
                error!("Failed to stop axis {}: {:#}", self.focus.id(), e);
                CommandStatus::Failed
            }
        };
        self.settle(&self.focus).await;

        info!("Focus stopped");
        status
    }
}

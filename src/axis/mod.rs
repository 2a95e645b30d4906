pub mod motion;
pub mod state;
pub mod state_info;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use motion::{MoveTarget, Setpoint};
use state::{AxisState, AxisStateMachine, TransitionError};
use state_info::ControllerStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisId {
    Ha,
    Dec,
    Focus,
}

impl AxisId {
    pub const ALL: [AxisId; 3] = [AxisId::Ha, AxisId::Dec, AxisId::Focus];

    pub fn name(&self) -> &'static str {
        match self {
            AxisId::Ha => "ha",
            AxisId::Dec => "dec",
            AxisId::Focus => "focus",
        }
    }
}

impl std::fmt::Display for AxisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-axis capability set provided by the stepper driver.
///
/// Non-blocking calls return as soon as the command has been queued on the
/// controller; completion is observed through [`AxisController::status`].
#[async_trait::async_trait]
pub trait AxisController: Send + Sync {
    fn name(&self) -> &str;
    fn has_endstop(&self) -> bool;

    async fn move_to(&self, target: MoveTarget, blocking: bool) -> anyhow::Result<()>;
    async fn home(&self, blocking: bool) -> anyhow::Result<()>;
    async fn stop(&self, blocking: bool) -> anyhow::Result<()>;
    async fn track(&self, setpoint: Setpoint) -> anyhow::Result<()>;

    async fn status(&self) -> anyhow::Result<ControllerStatus>;
    async fn position(&self) -> anyhow::Result<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisLimits {
    pub position_min: f64,
    pub position_max: f64,
    /// Largest accepted difference between commanded and reached position.
    pub tolerance: f64,
}

impl AxisLimits {
    pub fn contains(&self, position: f64) -> bool {
        position >= self.position_min && position <= self.position_max
    }

    pub fn within_tolerance(&self, actual: f64, expected: f64) -> bool {
        (actual - expected).abs() <= self.tolerance
    }
}

impl Default for AxisLimits {
    fn default() -> Self {
        Self {
            position_min: -180.0,
            position_max: 180.0,
            tolerance: 0.01,
        }
    }
}

/// One motorized degree of freedom, owned by the coordinator.
pub struct Axis {
    id: AxisId,
    controller: Arc<dyn AxisController>,
    machine: RwLock<AxisStateMachine>,
    command_lock: Arc<Mutex<()>>,
    limits: AxisLimits,
}

impl Axis {
    pub fn new(id: AxisId, controller: Arc<dyn AxisController>, limits: AxisLimits) -> Self {
        let machine = AxisStateMachine::new(id.name(), controller.has_endstop());
        Self {
            id,
            controller,
            machine: RwLock::new(machine),
            command_lock: Arc::new(Mutex::new(())),
            limits,
        }
    }

    pub fn id(&self) -> AxisId {
        self.id
    }

    pub fn controller(&self) -> &Arc<dyn AxisController> {
        &self.controller
    }

    pub fn limits(&self) -> &AxisLimits {
        &self.limits
    }

    pub fn has_endstop(&self) -> bool {
        self.controller.has_endstop()
    }

    pub async fn state(&self) -> AxisState {
        self.machine.read().await.state()
    }

    pub async fn transition(&self, to: AxisState) -> Result<(), TransitionError> {
        let from = self.machine.write().await.transition(to)?;
        if from != to {
            debug!("Axis {}: {} -> {}", self.id, from, to);
        }
        Ok(())
    }

    /// Per-axis lock taken by homing on top of the group locks.
    pub fn try_lock(&self) -> Option<OwnedMutexGuard<()>> {
        self.command_lock.clone().try_lock_owned().ok()
    }
}

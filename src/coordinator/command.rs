use serde::{Deserialize, Serialize};

/// Outcome of a coordinator command, as reported across the RPC boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    Succeeded,
    Failed,
    Blocked,
    InvalidControlIP,
    StepperNotIdle,
    StepperNotHomed,
    PositionOutsideLimits,
    NotConnected,
    NotDisconnected,
    NoLights,
    InvalidLightColor,
}

impl CommandStatus {
    pub fn code(&self) -> i32 {
        match self {
            CommandStatus::Succeeded => 0,
            CommandStatus::Failed => 1,
            CommandStatus::Blocked => 2,
            CommandStatus::InvalidControlIP => 3,
            CommandStatus::StepperNotIdle => 4,
            CommandStatus::StepperNotHomed => 5,
            CommandStatus::PositionOutsideLimits => 6,
            CommandStatus::NotConnected => 7,
            CommandStatus::NotDisconnected => 8,
            CommandStatus::NoLights => 9,
            CommandStatus::InvalidLightColor => 10,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            CommandStatus::Succeeded => "command succeeded",
            CommandStatus::Failed => "error: command failed",
            CommandStatus::Blocked => "error: another command is already running",
            CommandStatus::InvalidControlIP => "error: command not accepted from this IP",
            CommandStatus::StepperNotIdle => "error: stepper is not idle",
            CommandStatus::StepperNotHomed => "error: stepper has not been homed",
            CommandStatus::PositionOutsideLimits => {
                "error: requested position outside stepper range"
            }
            CommandStatus::NotConnected => "error: controller is not connected",
            CommandStatus::NotDisconnected => "error: controller is already connected",
            CommandStatus::NoLights => "error: lights are not available",
            CommandStatus::InvalidLightColor => "error: invalid light color",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == CommandStatus::Succeeded
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

use serde::{Deserialize, Serialize};

/// What the motor controller reports an axis is physically doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionState {
    Stationary,
    Moving,
    Homing,
    Tracking,
}

#[derive(Debug, Clone)]
pub struct ControllerStatus {
    pub motion: MotionState,
    pub homed: bool,
}

impl ControllerStatus {
    pub fn new(motion: MotionState) -> Self {
        Self {
            motion,
            homed: false,
        }
    }

    pub fn with_homed(mut self, homed: bool) -> Self {
        self.homed = homed;
        self
    }

    pub fn is_stationary(&self) -> bool {
        self.motion == MotionState::Stationary
    }

    pub fn is_active(&self) -> bool {
        !self.is_stationary()
    }

    /// Homing only counts as successful when the axis came to rest referenced.
    pub fn is_homed_at_rest(&self) -> bool {
        self.is_stationary() && self.homed
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisState {
    Disconnected,
    NotHomed,
    Idle,
    Homing,
    Moving,
    Tracking,
}

impl AxisState {
    pub fn label(&self) -> &'static str {
        match self {
            AxisState::Disconnected => "OFFLINE",
            AxisState::NotHomed => "NOT HOMED",
            AxisState::Idle => "IDLE",
            AxisState::Homing => "HOMING",
            AxisState::Moving => "MOVING",
            AxisState::Tracking => "TRACKING",
        }
    }

    /// States in which the motor is energised and stepping.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AxisState::Homing | AxisState::Moving | AxisState::Tracking
        )
    }

    /// The axis position is only meaningful once it has been referenced.
    pub fn has_reference(&self) -> bool {
        matches!(
            self,
            AxisState::Idle | AxisState::Moving | AxisState::Tracking
        )
    }
}

impl std::fmt::Display for AxisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub axis: String,
    pub from: AxisState,
    pub to: AxisState,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid transition for axis {}: {:?} -> {:?}",
            self.axis, self.from, self.to
        )
    }
}

impl std::error::Error for TransitionError {}

/// Operating state of one axis as seen by the coordinator.
///
/// The coordinator drives every transition; the hardware only reports
/// whether a motion has finished. `Disconnected` is reachable from any
/// state, everything else follows the table in [`AxisStateMachine::can_enter`].
#[derive(Debug, Clone)]
pub struct AxisStateMachine {
    name: String,
    state: AxisState,
    has_endstop: bool,
}

impl AxisStateMachine {
    pub fn new(name: impl Into<String>, has_endstop: bool) -> Self {
        Self {
            name: name.into(),
            state: AxisState::Disconnected,
            has_endstop,
        }
    }

    pub fn state(&self) -> AxisState {
        self.state
    }

    pub fn has_endstop(&self) -> bool {
        self.has_endstop
    }

    pub fn can_enter(&self, to: AxisState) -> bool {
        use AxisState::*;

        match (self.state, to) {
            (_, Disconnected) => true,
            (Disconnected, NotHomed) => true,
            (NotHomed | Idle, Homing) => self.has_endstop,
            // Endstop-less axes adopt their current position as reference.
            (NotHomed, Idle) => !self.has_endstop,
            (Homing, Idle | NotHomed) => true,
            (Idle, Moving | Tracking) => true,
            (Moving | Tracking, Idle) => true,
            _ => false,
        }
    }

    pub fn transition(&mut self, to: AxisState) -> Result<AxisState, TransitionError> {
        if !self.can_enter(to) {
            return Err(TransitionError {
                axis: self.name.clone(),
                from: self.state,
                to,
            });
        }

        let from = self.state;
        self.state = to;
        Ok(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(has_endstop: bool) -> AxisStateMachine {
        let mut machine = AxisStateMachine::new("ha", has_endstop);
        machine.transition(AxisState::NotHomed).unwrap();
        machine
    }

    #[test]
    fn test_connect_enters_not_homed() {
        let mut machine = AxisStateMachine::new("dec", true);
        assert_eq!(machine.state(), AxisState::Disconnected);
        assert!(machine.transition(AxisState::Idle).is_err());
        assert_eq!(
            machine.transition(AxisState::NotHomed).unwrap(),
            AxisState::Disconnected
        );
    }

    #[test]
    fn test_homing_requires_endstop() {
        let mut without = connected(false);
        let err = without.transition(AxisState::Homing).unwrap_err();
        assert_eq!(err.from, AxisState::NotHomed);
        assert_eq!(err.to, AxisState::Homing);

        let mut with = connected(true);
        with.transition(AxisState::Homing).unwrap();
        with.transition(AxisState::Idle).unwrap();
        with.transition(AxisState::Homing).unwrap();
        with.transition(AxisState::NotHomed).unwrap();
    }

    #[test]
    fn test_reference_adoption_only_without_endstop() {
        assert!(connected(false).can_enter(AxisState::Idle));
        assert!(!connected(true).can_enter(AxisState::Idle));
    }

    #[test]
    fn test_tracking_only_from_idle() {
        let mut machine = connected(false);
        assert!(machine.transition(AxisState::Tracking).is_err());

        machine.transition(AxisState::Idle).unwrap();
        machine.transition(AxisState::Moving).unwrap();
        assert!(machine.transition(AxisState::Tracking).is_err());

        machine.transition(AxisState::Idle).unwrap();
        machine.transition(AxisState::Tracking).unwrap();
        assert!(machine.transition(AxisState::Moving).is_err());
        machine.transition(AxisState::Idle).unwrap();
    }

    #[test]
    fn test_shutdown_from_any_state() {
        let mut machine = connected(true);
        machine.transition(AxisState::Homing).unwrap();
        machine.transition(AxisState::Disconnected).unwrap();
        assert_eq!(machine.state(), AxisState::Disconnected);
    }

    #[test]
    fn test_labels_and_activity() {
        assert_eq!(AxisState::NotHomed.label(), "NOT HOMED");
        assert!(AxisState::Tracking.is_active());
        assert!(!AxisState::Idle.is_active());
        assert!(AxisState::Moving.has_reference());
        assert!(!AxisState::Homing.has_reference());
    }
}

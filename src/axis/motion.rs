use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Destination of a single move command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MoveTarget {
    Absolute(f64),
    Relative(f64),
}

impl MoveTarget {
    /// Where the axis should end up when starting from `current`.
    pub fn resolve(&self, current: f64) -> f64 {
        match self {
            MoveTarget::Absolute(target) => *target,
            MoveTarget::Relative(delta) => current + delta,
        }
    }
}

/// Time-indexed position function sampled by a controller while tracking.
pub type Setpoint = Arc<dyn Fn(DateTime<Utc>) -> f64 + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_targets() {
        assert_eq!(MoveTarget::Absolute(12.5).resolve(-3.0), 12.5);
        assert_eq!(MoveTarget::Relative(2.0).resolve(-3.0), -1.0);
    }
}

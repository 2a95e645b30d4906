use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Equatorial pointing, both in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HaDec {
    pub ha: f64,
    pub dec: f64,
}

impl HaDec {
    pub fn new(ha: f64, dec: f64) -> Self {
        Self { ha, dec }
    }
}

/// Resolves a named celestial body to the mount's native coordinates.
///
/// Implementations are expected to be pure and may be expensive, so the
/// coordinator evaluates them on a blocking thread and caches the results.
pub trait Ephemeris: Send + Sync {
    fn resolve(&self, body: &str, at: DateTime<Utc>) -> anyhow::Result<HaDec>;
}

/// Observatory location, forwarded to ephemeris providers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl Default for Site {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
        }
    }
}

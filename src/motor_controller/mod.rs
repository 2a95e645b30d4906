use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::axis::{AxisController, AxisId};

/// Time source synchronised with the motor controller board.
///
/// Homing deadlines are measured against this clock rather than host time so
/// they survive drift between the host and the controller.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    /// Parses `RRGGBB`, optionally prefixed with `#`.
    pub fn from_hex(color: &str) -> Option<Self> {
        let hex = color.strip_prefix('#').unwrap_or(color);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self {
            red: channel(0)?,
            green: channel(2)?,
            blue: channel(4)?,
        })
    }
}

/// The mount's controller board: three axes plus the accessory outputs.
#[async_trait::async_trait]
pub trait MotorController: Send + Sync {
    fn name(&self) -> &str;

    fn axis(&self, axis: AxisId) -> Arc<dyn AxisController>;
    fn clock(&self) -> Arc<dyn Clock>;

    async fn connect(&self) -> anyhow::Result<()>;
    async fn disconnect(&self) -> anyhow::Result<()>;

    fn has_fan(&self) -> bool {
        false
    }

    async fn set_fan(&self, _enabled: bool) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("Controller {} has no fan output", self.name()))
    }

    fn has_lights(&self) -> bool {
        false
    }

    async fn set_light(&self, _color: Rgb) -> anyhow::Result<()> {
        Err(anyhow::anyhow!(
            "Controller {} has no light output",
            self.name()
        ))
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        for axis in AxisId::ALL {
            self.axis(axis).stop(true).await?;
        }
        self.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_light_colors() {
        assert_eq!(
            Rgb::from_hex("#ff8000"),
            Some(Rgb {
                red: 255,
                green: 128,
                blue: 0
            })
        );
        assert_eq!(
            Rgb::from_hex("0A0b0C"),
            Some(Rgb {
                red: 10,
                green: 11,
                blue: 12
            })
        );
        assert_eq!(Rgb::from_hex("fff"), None);
        assert_eq!(Rgb::from_hex("#gg0000"), None);
        assert_eq!(Rgb::from_hex("ff00001"), None);
    }
}

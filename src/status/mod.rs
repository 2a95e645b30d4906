use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::{
    axis::{state::AxisState, Axis, AxisId},
    coordinator::{target::Target, Coordinator},
    ephemeris::HaDec,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MountStatus {
    Disconnected,
    Connected,
    Homing,
}

impl MountStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MountStatus::Disconnected => "OFFLINE",
            MountStatus::Connected => "ONLINE",
            MountStatus::Homing => "HOMING",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AxisReport {
    pub axis: AxisId,
    pub state: AxisState,
    pub label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_position: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub timestamp: DateTime<Utc>,
    pub status: MountStatus,
    pub status_label: &'static str,
    pub axes: Vec<AxisReport>,
    pub target: Target,
    pub offsets: HaDec,
}

impl StatusReport {
    pub fn axis(&self, id: AxisId) -> Option<&AxisReport> {
        self.axes.iter().find(|report| report.axis == id)
    }
}

async fn axis_report(axis: &Axis) -> AxisReport {
    let state = axis.state().await;
    let position = if state.has_reference() {
        match axis.controller().position().await {
            Ok(position) => Some(position),
            Err(e) => {
                debug!("Position read for axis {} failed: {:#}", axis.id(), e);
                None
            }
        }
    } else {
        None
    };

    AxisReport {
        axis: axis.id(),
        state,
        label: state.label(),
        position,
        set_position: None,
    }
}

/// Reads each axis in turn without taking command locks, so axes may be
/// sampled at slightly different moments.
pub async fn collect(coordinator: &Coordinator) -> StatusReport {
    let status = if !coordinator.is_connected() {
        MountStatus::Disconnected
    } else if coordinator.is_homing() {
        MountStatus::Homing
    } else {
        MountStatus::Connected
    };

    let mut axes = Vec::with_capacity(AxisId::ALL.len());
    for axis in coordinator.axes() {
        let mut report = axis_report(axis).await;
        if axis.id() == AxisId::Focus && report.state.has_reference() {
            report.set_position = coordinator.focus_set_position().await;
        }
        axes.push(report);
    }

    StatusReport {
        timestamp: coordinator.hardware().clock().now(),
        status,
        status_label: status.label(),
        axes,
        target: coordinator.target().await,
        offsets: coordinator.offsets(),
    }
}

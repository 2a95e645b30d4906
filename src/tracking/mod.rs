//! Precomputed ephemeris tables and the live setpoints derived from them.
//!
//! Resolving a body is too expensive to do on every controller tick, so a
//! [`TrackTable`] samples the ephemeris once over a horizon longer than any
//! realistic session and tracking interpolates between samples.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    axis::{motion::Setpoint, AxisId},
    ephemeris::{Ephemeris, HaDec},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    pub at: DateTime<Utc>,
    pub position: HaDec,
}

/// Ephemeris samples at a fixed interval starting at the build time.
#[derive(Debug, Clone)]
pub struct TrackTable {
    body: String,
    interval: Duration,
    samples: Vec<TrackSample>,
}

impl TrackTable {
    pub fn build(
        ephemeris: &dyn Ephemeris,
        body: &str,
        start: DateTime<Utc>,
        horizon: Duration,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() || interval >= horizon {
            anyhow::bail!(
                "Sample interval {:?} must be non-zero and shorter than horizon {:?}",
                interval,
                horizon
            );
        }

        let count = (horizon.as_secs_f64() / interval.as_secs_f64()).ceil() as u32 + 1;
        let step = TimeDelta::from_std(interval).context("Sample interval out of range")?;

        let mut samples: Vec<TrackSample> = Vec::with_capacity(count as usize);
        let mut at = start;
        for _ in 0..count {
            let mut position = ephemeris
                .resolve(body, at)
                .with_context(|| format!("Failed to resolve {} at {}", body, at))?;

            // Keep hour angle continuous across the +/-180 degree seam.
            if let Some(previous) = samples.last() {
                let prev_ha = previous.position.ha;
                position.ha -= 360.0 * ((position.ha - prev_ha) / 360.0).round();
            }

            samples.push(TrackSample { at, position });
            at += step;
        }

        Ok(Self {
            body: body.to_string(),
            interval,
            samples,
        })
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn samples(&self) -> &[TrackSample] {
        &self.samples
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.samples[0].at
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.samples[self.samples.len() - 1].at
    }

    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        at >= self.start() && at <= self.end()
    }

    /// Linear interpolation between the two samples around `at`.
    /// Times outside the table are clamped to the nearest end sample.
    pub fn interpolate(&self, at: DateTime<Utc>) -> HaDec {
        let elapsed = seconds_between(self.start(), at);
        if elapsed <= 0.0 {
            return self.samples[0].position;
        }

        let interval = self.interval.as_secs_f64();
        let index = (elapsed / interval).floor() as usize;
        if index + 1 >= self.samples.len() {
            return self.samples[self.samples.len() - 1].position;
        }

        let before = &self.samples[index];
        let after = &self.samples[index + 1];
        let fraction = seconds_between(before.at, at) / interval;

        HaDec {
            ha: lerp(before.position.ha, after.position.ha, fraction),
            dec: lerp(before.position.dec, after.position.dec, fraction),
        }
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to.signed_duration_since(from);
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) * 1e-9
}

fn lerp(a: f64, b: f64, fraction: f64) -> f64 {
    a + (b - a) * fraction
}

/// Accumulated pointing offsets in degrees.
///
/// Shared with live setpoints, so an update is visible at the next evaluation
/// without re-issuing the track.
#[derive(Debug, Default)]
pub struct Offsets {
    ha: AtomicU64,
    dec: AtomicU64,
}

impl Offsets {
    pub fn get(&self, axis: AxisId) -> f64 {
        match axis {
            AxisId::Ha => f64::from_bits(self.ha.load(Ordering::Acquire)),
            AxisId::Dec => f64::from_bits(self.dec.load(Ordering::Acquire)),
            AxisId::Focus => 0.0,
        }
    }

    pub fn snapshot(&self) -> HaDec {
        HaDec::new(self.get(AxisId::Ha), self.get(AxisId::Dec))
    }

    pub fn add(&self, ha: f64, dec: f64) {
        add_f64(&self.ha, ha);
        add_f64(&self.dec, dec);
    }

    pub fn reset(&self) {
        self.ha.store(0f64.to_bits(), Ordering::Release);
        self.dec.store(0f64.to_bits(), Ordering::Release);
    }
}

fn add_f64(cell: &AtomicU64, delta: f64) {
    let _ = cell.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
        Some((f64::from_bits(bits) + delta).to_bits())
    });
}

/// Hour angle and declination setpoints following `table` plus `offsets`.
pub fn setpoints(table: Arc<TrackTable>, offsets: Arc<Offsets>) -> (Setpoint, Setpoint) {
    let ha: Setpoint = {
        let table = table.clone();
        let offsets = offsets.clone();
        Arc::new(move |at| table.interpolate(at).ha + offsets.get(AxisId::Ha))
    };
    let dec: Setpoint = Arc::new(move |at| table.interpolate(at).dec + offsets.get(AxisId::Dec));
    (ha, dec)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hour angle grows by one degree per minute, declination fixed.
    struct Drift {
        epoch: DateTime<Utc>,
        start_ha: f64,
    }

    impl Ephemeris for Drift {
        fn resolve(&self, body: &str, at: DateTime<Utc>) -> Result<HaDec> {
            if body != "sun" {
                anyhow::bail!("Unknown body: {}", body);
            }
            let minutes = seconds_between(self.epoch, at) / 60.0;
            let ha = (self.start_ha + minutes + 180.0).rem_euclid(360.0) - 180.0;
            Ok(HaDec::new(ha, 20.0))
        }
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-06-21T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn table(start_ha: f64) -> TrackTable {
        let ephemeris = Drift {
            epoch: epoch(),
            start_ha,
        };
        TrackTable::build(
            &ephemeris,
            "sun",
            epoch(),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        )
        .unwrap()
    }

    #[test]
    fn test_table_spans_horizon() {
        let table = table(0.0);
        assert_eq!(table.samples().len(), 61);
        assert_eq!(table.body(), "sun");
        assert_eq!(table.end() - table.start(), TimeDelta::hours(1));
        assert!(table.covers(epoch() + TimeDelta::minutes(30)));
        assert!(!table.covers(epoch() - TimeDelta::seconds(1)));
    }

    #[test]
    fn test_interpolates_between_samples() {
        let table = table(10.0);
        let at = epoch() + TimeDelta::seconds(90);
        let position = table.interpolate(at);
        assert!((position.ha - 11.5).abs() < 1e-9);
        assert!((position.dec - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_unwraps_hour_angle_seam() {
        let table = table(170.0);
        let after_seam = table.interpolate(epoch() + TimeDelta::minutes(20));
        assert!((after_seam.ha - 190.0).abs() < 1e-9);

        let across = table.interpolate(epoch() + TimeDelta::seconds(10 * 60 + 30));
        assert!((across.ha - 180.5).abs() < 1e-9);
    }

    #[test]
    fn test_clamps_outside_table() {
        let table = table(0.0);
        assert_eq!(table.interpolate(epoch() - TimeDelta::hours(1)).ha, 0.0);
        assert!((table.interpolate(epoch() + TimeDelta::hours(5)).ha - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_body_fails_build() {
        let ephemeris = Drift {
            epoch: epoch(),
            start_ha: 0.0,
        };
        let result = TrackTable::build(
            &ephemeris,
            "vulcan",
            epoch(),
            Duration::from_secs(600),
            Duration::from_secs(60),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_interval_longer_than_horizon() {
        let ephemeris = Drift {
            epoch: epoch(),
            start_ha: 0.0,
        };
        assert!(TrackTable::build(
            &ephemeris,
            "sun",
            epoch(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
        .is_err());
    }

    #[test]
    fn test_setpoints_follow_offsets() {
        let table = Arc::new(table(0.0));
        let offsets = Arc::new(Offsets::default());
        let (ha, dec) = setpoints(table, offsets.clone());
        let at = epoch() + TimeDelta::minutes(2);

        assert!((ha(at) - 2.0).abs() < 1e-9);
        offsets.add(0.5, -1.0);
        offsets.add(0.25, 0.0);
        assert!((ha(at) - 2.75).abs() < 1e-9);
        assert!((dec(at) - 19.0).abs() < 1e-9);

        offsets.reset();
        assert_eq!(offsets.snapshot(), HaDec::new(0.0, 0.0));
    }
}

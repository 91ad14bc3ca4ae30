//! Vehicle yaw sources
//!
//! The yaw is a continuous angle in degrees whose zero is wherever [`HeadingSource::reset`]
//! put it at mission start. Which source is used is decided once, when the perception
//! stack is configured, and never changes during a run.

use crate::common::normalize_degrees;
use std::fmt;
use tracing::{info, warn};

/// Where the heading comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingMode {
    Inertial,
    DeadReckoned,
}

impl fmt::Display for HeadingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadingMode::Inertial => write!(f, "Inertial"),
            HeadingMode::DeadReckoned => write!(f, "DeadReckoned"),
        }
    }
}

/// Trait for yaw providers
pub trait HeadingSource: fmt::Debug + Send {
    fn mode(&self) -> HeadingMode;

    /// Make the current orientation the zero reference
    fn reset(&mut self, reading: Option<f64>);

    /// Feed this cycle's inertial yaw reading
    fn observe(&mut self, reading: Option<f64>);

    /// Current yaw in degrees
    fn current_heading_deg(&self) -> f64;

    /// Advance the estimate by the turn power that was applied for `dt_seconds`
    fn integrate(&mut self, _commanded_turn_power: f64, _dt_seconds: f64) {}
}

/// Yaw straight from the inertial sensor.
///
/// The sensor wraps at ±180°; successive readings are unwrapped so rotations of
/// more than half a turn keep a continuous angle.
#[derive(Debug, Default)]
pub struct InertialHeading {
    last_reading: Option<f64>,
    heading: f64,
}

impl InertialHeading {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HeadingSource for InertialHeading {
    fn mode(&self) -> HeadingMode {
        HeadingMode::Inertial
    }

    fn reset(&mut self, reading: Option<f64>) {
        self.last_reading = reading.filter(|r| r.is_finite());
        self.heading = 0.0;
    }

    fn observe(&mut self, reading: Option<f64>) {
        let Some(reading) = reading.filter(|r| r.is_finite()) else {
            return;
        };
        if let Some(last) = self.last_reading {
            self.heading += normalize_degrees(reading - last);
        }
        self.last_reading = Some(reading);
    }

    fn current_heading_deg(&self) -> f64 {
        self.heading
    }
}

/// Low-fidelity fallback: yaw accumulated from the commanded turn power.
///
/// This is not wheel odometry. The estimate is `turn_power * deg_per_sec * dt` per
/// cycle, so it drifts with battery level and floor friction.
#[derive(Debug)]
pub struct DeadReckonedHeading {
    accumulated_deg: f64,
    deg_per_sec_at_full_power: f64,
}

impl DeadReckonedHeading {
    pub fn new(deg_per_sec_at_full_power: f64) -> Self {
        DeadReckonedHeading {
            accumulated_deg: 0.0,
            deg_per_sec_at_full_power,
        }
    }
}

impl HeadingSource for DeadReckonedHeading {
    fn mode(&self) -> HeadingMode {
        HeadingMode::DeadReckoned
    }

    fn reset(&mut self, _reading: Option<f64>) {
        self.accumulated_deg = 0.0;
    }

    fn observe(&mut self, _reading: Option<f64>) {}

    fn current_heading_deg(&self) -> f64 {
        self.accumulated_deg
    }

    fn integrate(&mut self, commanded_turn_power: f64, dt_seconds: f64) {
        self.accumulated_deg += commanded_turn_power * self.deg_per_sec_at_full_power * dt_seconds;
    }
}

/// Pick the heading source for this run
pub fn select_heading_source(
    inertial_available: bool,
    dead_reckoning_deg_per_sec: f64,
) -> Box<dyn HeadingSource> {
    if inertial_available {
        info!("Using inertial heading");
        Box::new(InertialHeading::new())
    } else {
        warn!("Inertial sensor unavailable, falling back to dead-reckoned heading");
        Box::new(DeadReckonedHeading::new(dead_reckoning_deg_per_sec))
    }
}

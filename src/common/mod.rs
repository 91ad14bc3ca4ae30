//! Common utilities and types for the fiducial core

use nalgebra::Vector3;
use std::fmt;

/// Conversion factor between the vision pipeline (meters) and field measurements (inches)
pub const INCHES_PER_METER: f64 = 39.3701;

/// Tag id reported in telemetry when nothing is tracked
pub const NO_TAG: i32 = -1;

/// Common types and utilities used across the codebase
pub mod types {
    /// A 2D point
    pub type Point2D = (f64, f64);

    /// Seconds elapsed since the run started
    pub type Seconds = f64;
}

/// Wrap an angle in degrees into (-180, 180]
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// One fiducial observation from the vision pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub tag_id: i32,
    /// Horizontal offset from boresight, positive to the right
    pub bearing_deg: f64,
    pub elevation_deg: f64,
    /// Meters; x right, y up, z forward range
    pub position: Vector3<f64>,
}

impl Detection {
    pub fn new(tag_id: i32, bearing_deg: f64, range_m: f64) -> Self {
        Detection {
            tag_id,
            bearing_deg,
            elevation_deg: 0.0,
            position: Vector3::new(0.0, 0.0, range_m),
        }
    }

    /// Forward distance to the tag in meters
    pub fn range_m(&self) -> f64 {
        self.position.z
    }

    /// Bearing, elevation and position are all finite
    pub fn is_finite(&self) -> bool {
        self.bearing_deg.is_finite()
            && self.elevation_deg.is_finite()
            && self.position.iter().all(|v| v.is_finite())
    }
}

/// Everything the core consumes in one control cycle
#[derive(Debug, Clone, Default)]
pub struct CycleInput {
    /// Fiducials in the current frame, in the order the pipeline reported them
    pub detections: Vec<Detection>,
    /// Inertial yaw in degrees, `None` when no inertial sensor is present
    pub heading_deg: Option<f64>,
    pub elapsed_seconds: types::Seconds,
    pub stop_requested: bool,
}

impl CycleInput {
    pub fn at(elapsed_seconds: types::Seconds) -> Self {
        CycleInput {
            elapsed_seconds,
            ..Default::default()
        }
    }

    pub fn with_detection(mut self, detection: Option<Detection>) -> Self {
        self.detections.extend(detection);
        self
    }

    pub fn with_heading(mut self, heading_deg: f64) -> Self {
        self.heading_deg = Some(heading_deg);
        self
    }
}

/// Power for each of the four wheels, each in [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelPowers {
    pub front_left: f64,
    pub front_right: f64,
    pub back_left: f64,
    pub back_right: f64,
}

impl WheelPowers {
    pub const ZERO: WheelPowers = WheelPowers {
        front_left: 0.0,
        front_right: 0.0,
        back_left: 0.0,
        back_right: 0.0,
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn clamped(self) -> Self {
        WheelPowers {
            front_left: self.front_left.clamp(-1.0, 1.0),
            front_right: self.front_right.clamp(-1.0, 1.0),
            back_left: self.back_left.clamp(-1.0, 1.0),
            back_right: self.back_right.clamp(-1.0, 1.0),
        }
    }
}

impl fmt::Display for WheelPowers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FL {:.2} FR {:.2} BL {:.2} BR {:.2}",
            self.front_left, self.front_right, self.back_left, self.back_right
        )
    }
}

/// Display-only status emitted every cycle
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub phase: String,
    pub active_tag_id: i32,
    pub observed_tag_id: i32,
}

/// Everything the core emits in one control cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutput {
    pub powers: WheelPowers,
    pub status: StatusRecord,
}

/// Key/value telemetry collaborator (driver station display, log file, ...)
pub trait TelemetrySink {
    fn add_data(&mut self, key: &str, value: String);

    /// Flush the values added this cycle
    fn update(&mut self) {}
}

/// Telemetry sink that drops everything
#[derive(Debug, Default)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn add_data(&mut self, _key: &str, _value: String) {}
}

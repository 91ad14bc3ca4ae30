//! Motion primitives
//!
//! The control laws are plain functions of the current observation and whatever the
//! caller captured at step entry. [`Maneuver`] wraps each one so the mission can run
//! a step without knowing whether it is closed-loop or timed.

use super::MotionCommand;
use crate::common::types::Seconds;
use crate::common::{normalize_degrees, Detection, INCHES_PER_METER};
use crate::config::ControlConfig;
use std::fmt::Debug;
use tracing::trace;

/// Result of one primitive evaluation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PrimitiveOutput {
    pub drive: f64,
    pub turn: f64,
    pub strafe: f64,
    pub done: bool,
}

impl PrimitiveOutput {
    pub fn finished() -> Self {
        PrimitiveOutput {
            done: true,
            ..Default::default()
        }
    }

    pub fn command(&self) -> MotionCommand {
        if self.strafe != 0.0 {
            MotionCommand::Strafe {
                power: self.strafe,
            }
        } else {
            MotionCommand::Tank {
                drive: self.drive,
                turn: self.turn,
            }
        }
    }
}

/// Lift a non-zero command below `min_power` up to `min_power`
pub fn deadband(value: f64, min_power: f64) -> f64 {
    if value != 0.0 && value.abs() < min_power {
        min_power.copysign(value)
    } else {
        value
    }
}

/// Gains and tolerances for centering on a tag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterGains {
    pub drive_gain: f64,
    pub turn_gain: f64,
    pub max_drive: f64,
    pub min_drive: f64,
    pub max_turn: f64,
    pub min_turn: f64,
    pub distance_tolerance_m: f64,
    pub bearing_tolerance_deg: f64,
}

impl From<&ControlConfig> for CenterGains {
    fn from(config: &ControlConfig) -> Self {
        CenterGains {
            drive_gain: config.drive_gain,
            turn_gain: config.turn_gain,
            max_drive: config.drive.max_power,
            min_drive: config.drive.min_power,
            max_turn: config.turn.max_power,
            min_turn: config.turn.min_power,
            distance_tolerance_m: config.distance_tolerance_in / INCHES_PER_METER,
            bearing_tolerance_deg: config.center_tolerance_deg,
        }
    }
}

/// Hold `target_range_m` from the tag while keeping it on boresight.
///
/// Done only when range and bearing are both inside tolerance in the same cycle.
pub fn center_on_target(
    bearing_deg: f64,
    range_m: f64,
    target_range_m: f64,
    gains: &CenterGains,
) -> PrimitiveOutput {
    let distance_error = range_m - target_range_m;
    let drive = deadband(
        (distance_error * gains.drive_gain).clamp(-gains.max_drive, gains.max_drive),
        gains.min_drive,
    );
    let turn = deadband(
        (-bearing_deg * gains.turn_gain).clamp(-gains.max_turn, gains.max_turn),
        gains.min_turn,
    );
    let done = distance_error.abs() < gains.distance_tolerance_m
        && bearing_deg.abs() < gains.bearing_tolerance_deg;

    trace!(
        distance_error_in = distance_error * INCHES_PER_METER,
        drive,
        turn,
        done,
        "center on target"
    );

    PrimitiveOutput {
        drive,
        turn,
        strafe: 0.0,
        done,
    }
}

/// Gains for rotating in place
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotateGains {
    pub rotate_gain: f64,
    pub max_turn: f64,
    pub min_turn: f64,
    pub tolerance_deg: f64,
    /// Take the shortest way round instead of the raw error
    pub wrap_error: bool,
}

impl From<&ControlConfig> for RotateGains {
    fn from(config: &ControlConfig) -> Self {
        RotateGains {
            rotate_gain: config.rotate_gain,
            max_turn: config.turn.max_power,
            min_turn: config.turn.min_power,
            tolerance_deg: config.rotate_tolerance_deg,
            wrap_error: config.wrap_rotation_error,
        }
    }
}

/// Turn toward `start_heading + delta_deg`.
///
/// With `wrap_error` off the raw error is used, so deltas must stay within ±180° of
/// what the heading source can represent; a full 360° spin relies on this.
pub fn rotate_by_delta(
    start_heading: f64,
    delta_deg: f64,
    current_heading: f64,
    gains: &RotateGains,
) -> PrimitiveOutput {
    let target = start_heading + delta_deg;
    let mut error = target - current_heading;
    if gains.wrap_error {
        error = normalize_degrees(error);
    }

    if error.abs() < gains.tolerance_deg {
        return PrimitiveOutput::finished();
    }

    let turn = deadband(
        (error * gains.rotate_gain).clamp(-gains.max_turn, gains.max_turn),
        gains.min_turn,
    );
    trace!(target, current_heading, error, turn, "rotate by delta");
    PrimitiveOutput {
        turn,
        ..Default::default()
    }
}

/// Direction of an open-loop timed move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveAxis {
    /// Forward (+) / backward (-)
    Longitudinal,
    /// Right (+) / left (-)
    Lateral,
}

/// Fixed-power move for `|inches| * ms_per_inch` milliseconds
pub fn timed_move(
    axis: MoveAxis,
    inches: f64,
    power: f64,
    ms_per_inch: f64,
    elapsed: Seconds,
) -> PrimitiveOutput {
    let duration = inches.abs() * ms_per_inch / 1000.0;
    if elapsed >= duration {
        return PrimitiveOutput::finished();
    }
    let power = power.abs().copysign(inches);
    match axis {
        MoveAxis::Longitudinal => PrimitiveOutput {
            drive: power,
            ..Default::default()
        },
        MoveAxis::Lateral => PrimitiveOutput {
            strafe: power,
            ..Default::default()
        },
    }
}

/// What a maneuver can see in one cycle
#[derive(Debug, Clone, Copy)]
pub struct ManeuverContext<'a> {
    /// This cycle's detection of the tag the maneuver is about, if any
    pub target: Option<&'a Detection>,
    pub heading_deg: f64,
    pub now: Seconds,
}

/// Outcome of one maneuver update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManeuverStatus {
    pub command: MotionCommand,
    pub done: bool,
}

/// Trait for a single step of a mission
pub trait Maneuver: Debug + Send {
    /// Get the name of this maneuver
    fn name(&self) -> &str;

    /// Evaluate the maneuver for this cycle
    fn update(&mut self, context: &ManeuverContext<'_>) -> ManeuverStatus;
}

impl From<PrimitiveOutput> for ManeuverStatus {
    fn from(output: PrimitiveOutput) -> Self {
        ManeuverStatus {
            command: output.command(),
            done: output.done,
        }
    }
}

/// Closed-loop centering on the active tag
#[derive(Debug, Clone)]
pub struct CenterOnTarget {
    target_range_m: f64,
    gains: CenterGains,
}

impl CenterOnTarget {
    pub fn new(target_range_in: f64, gains: CenterGains) -> Self {
        CenterOnTarget {
            target_range_m: target_range_in / INCHES_PER_METER,
            gains,
        }
    }
}

impl Maneuver for CenterOnTarget {
    fn name(&self) -> &str {
        "CenterOnTarget"
    }

    fn update(&mut self, context: &ManeuverContext<'_>) -> ManeuverStatus {
        match context.target {
            Some(target) => center_on_target(
                target.bearing_deg,
                target.range_m(),
                self.target_range_m,
                &self.gains,
            )
            .into(),
            // bearing and range only come together; without them, let the outputs decay
            None => ManeuverStatus {
                command: MotionCommand::Coast,
                done: false,
            },
        }
    }
}

/// Closed-loop rotation relative to the heading captured at step entry
#[derive(Debug, Clone)]
pub struct RotateByDelta {
    start_heading: f64,
    delta_deg: f64,
    gains: RotateGains,
}

impl RotateByDelta {
    pub fn new(start_heading: f64, delta_deg: f64, gains: RotateGains) -> Self {
        RotateByDelta {
            start_heading,
            delta_deg,
            gains,
        }
    }
}

impl Maneuver for RotateByDelta {
    fn name(&self) -> &str {
        "RotateByDelta"
    }

    fn update(&mut self, context: &ManeuverContext<'_>) -> ManeuverStatus {
        rotate_by_delta(
            self.start_heading,
            self.delta_deg,
            context.heading_deg,
            &self.gains,
        )
        .into()
    }
}

/// Open-loop translate or strafe, polled every cycle until its duration elapses
#[derive(Debug, Clone)]
pub struct TimedMove {
    axis: MoveAxis,
    inches: f64,
    power: f64,
    ms_per_inch: f64,
    started_at: Seconds,
}

impl TimedMove {
    pub fn new(axis: MoveAxis, inches: f64, power: f64, ms_per_inch: f64, started_at: Seconds) -> Self {
        TimedMove {
            axis,
            inches,
            power,
            ms_per_inch,
            started_at,
        }
    }

    pub fn duration(&self) -> Seconds {
        self.inches.abs() * self.ms_per_inch / 1000.0
    }
}

impl Maneuver for TimedMove {
    fn name(&self) -> &str {
        match self.axis {
            MoveAxis::Longitudinal => "TranslateByDistance",
            MoveAxis::Lateral => "StrafeByDistance",
        }
    }

    fn update(&mut self, context: &ManeuverContext<'_>) -> ManeuverStatus {
        timed_move(
            self.axis,
            self.inches,
            self.power,
            self.ms_per_inch,
            context.now - self.started_at,
        )
        .into()
    }
}

//! Output shaping for actuator channels
//!
//! Every channel goes through the same pipeline each cycle: clamp to the channel
//! maximum, limit the change per second, then lift small non-zero commands up to
//! the minimum power that actually moves the wheels.

use crate::common::types::Seconds;
use crate::config::ChannelLimits;

/// Floor for the time step between two shaping calls
pub const MIN_DT_SECS: f64 = 1e-3;

/// Smoothing state for one channel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShaperState {
    /// Slew-limited value before the deadband lift
    last_output: f64,
    last_update_time: Option<Seconds>,
}

impl ShaperState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_output(&self) -> f64 {
        self.last_output
    }

    pub fn last_update_time(&self) -> Option<Seconds> {
        self.last_update_time
    }

    /// Force the channel to rest at `now`
    pub fn reset(&mut self, now: Seconds) {
        self.last_output = 0.0;
        self.last_update_time = Some(now);
    }
}

/// Shape `desired` into the next command for a channel.
///
/// A `desired` whose magnitude is under `min_effective_power` asks the channel to
/// come to rest: the ramp decays at the slew limit and snaps to exactly zero once
/// it falls inside the deadband instead of being lifted back up. A non-finite
/// `desired` is treated as zero.
pub fn shape(
    desired: f64,
    state: &mut ShaperState,
    max_magnitude: f64,
    min_effective_power: f64,
    max_slew_per_second: f64,
    now: Seconds,
) -> f64 {
    let desired = if desired.is_finite() { desired } else { 0.0 };
    let target = desired.clamp(-max_magnitude, max_magnitude);
    let last_time = *state.last_update_time.get_or_insert(now);
    let dt = (now - last_time).max(MIN_DT_SECS);

    let max_step = max_slew_per_second * dt;
    let ramp = state.last_output + (target - state.last_output).clamp(-max_step, max_step);
    let coasting = target.abs() < min_effective_power;

    let (ramp, output) = if ramp.abs() < min_effective_power {
        if coasting || ramp == 0.0 {
            (0.0, 0.0)
        } else {
            (ramp, min_effective_power.copysign(ramp))
        }
    } else {
        (ramp, ramp)
    };

    state.last_output = ramp;
    state.last_update_time = Some(now);
    output.clamp(-max_magnitude, max_magnitude)
}

/// A channel's limits bundled with its state
#[derive(Debug, Clone)]
pub struct ShapedChannel {
    limits: ChannelLimits,
    state: ShaperState,
}

impl ShapedChannel {
    pub fn new(limits: ChannelLimits) -> Self {
        ShapedChannel {
            limits,
            state: ShaperState::new(),
        }
    }

    pub fn shape(&mut self, desired: f64, now: Seconds) -> f64 {
        shape(
            desired,
            &mut self.state,
            self.limits.max_power,
            self.limits.min_power,
            self.limits.max_slew_per_sec,
            now,
        )
    }

    /// Decay toward rest through the slew limit
    pub fn coast(&mut self, now: Seconds) -> f64 {
        self.shape(0.0, now)
    }

    /// Drop to zero immediately
    pub fn stop(&mut self, now: Seconds) -> f64 {
        self.state.reset(now);
        0.0
    }

    pub fn state(&self) -> &ShaperState {
        &self.state
    }

    pub fn limits(&self) -> &ChannelLimits {
        &self.limits
    }
}

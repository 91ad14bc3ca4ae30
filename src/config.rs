//! Tunable constants for the fiducial core
//!
//! Everything is loaded once before the control loop starts. [`CoreConfig::validate`]
//! rejects out-of-range values up front so the loop can assume a sane configuration.

use crate::error::{CoreError, Result};
use crate::mission::choreography::{ChoreographyTable, Step, TagProgram};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Limits for one shaped output channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelLimits {
    pub max_power: f64,
    pub min_power: f64,
    /// Largest change in output per second
    pub max_slew_per_sec: f64,
}

impl ChannelLimits {
    fn validate(&self, channel: &str) -> Result<()> {
        if !(self.max_power > 0.0 && self.max_power <= 1.0) {
            return Err(invalid(format!(
                "{} max_power must be in (0, 1], got {}",
                channel, self.max_power
            )));
        }
        if self.min_power < 0.0 || self.min_power > self.max_power {
            return Err(invalid(format!(
                "{} min_power must be in [0, max_power], got {}",
                channel, self.min_power
            )));
        }
        if self.max_slew_per_sec <= 0.0 {
            return Err(invalid(format!("{} max_slew_per_sec must be positive", channel)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub turn_gain: f64,
    pub drive_gain: f64,
    pub rotate_gain: f64,
    pub turn: ChannelLimits,
    pub drive: ChannelLimits,
    pub strafe: ChannelLimits,
    /// Bearing tolerance while centering, degrees
    pub center_tolerance_deg: f64,
    /// Range tolerance while centering, inches
    pub distance_tolerance_in: f64,
    pub rotate_tolerance_deg: f64,
    /// Use the shortest angular distance for rotate-by-delta instead of the raw error
    pub wrap_rotation_error: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            turn_gain: 0.025,
            drive_gain: 0.18,
            rotate_gain: 0.012,
            turn: ChannelLimits {
                max_power: 0.35,
                min_power: 0.12,
                max_slew_per_sec: 2.0,
            },
            drive: ChannelLimits {
                max_power: 0.28,
                min_power: 0.12,
                max_slew_per_sec: 2.0,
            },
            strafe: ChannelLimits {
                max_power: 0.28,
                min_power: 0.12,
                max_slew_per_sec: 2.0,
            },
            center_tolerance_deg: 2.0,
            distance_tolerance_in: 1.5,
            rotate_tolerance_deg: 3.0,
            wrap_rotation_error: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub pause_secs: f64,
    /// A tracked tag unseen for longer than this is considered lost
    pub lost_timeout_secs: f64,
    /// Open-loop calibration for timed translate/strafe moves
    pub ms_per_inch: f64,
    pub cycle_period_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            pause_secs: 2.0,
            lost_timeout_secs: 20.0,
            ms_per_inch: 40.0,
            cycle_period_ms: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingConfig {
    /// Dead-reckoned yaw rate at full turn power, degrees per second
    pub dead_reckoning_deg_per_sec: f64,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        // 0.5 degrees per 20 ms cycle at full power
        HeadingConfig {
            dead_reckoning_deg_per_sec: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerConfig {
    pub primary_tag: i32,
    /// Tags the follower turns away from, in preference order
    pub shy_tags: Vec<i32>,
    pub approach_power: f64,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        FollowerConfig {
            primary_tag: 21,
            shy_tags: vec![22, 23],
            approach_power: 0.25,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub control: ControlConfig,
    pub timing: TimingConfig,
    pub heading: HeadingConfig,
    pub follower: FollowerConfig,
    pub mission: ChoreographyTable,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            control: ControlConfig::default(),
            timing: TimingConfig::default(),
            heading: HeadingConfig::default(),
            follower: FollowerConfig::default(),
            mission: ChoreographyTable::default(),
        }
    }
}

impl CoreConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: CoreConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.control;
        for (name, gain) in [
            ("turn_gain", c.turn_gain),
            ("drive_gain", c.drive_gain),
            ("rotate_gain", c.rotate_gain),
        ] {
            if gain <= 0.0 {
                return Err(invalid(format!("{} must be positive, got {}", name, gain)));
            }
        }
        c.turn.validate("turn")?;
        c.drive.validate("drive")?;
        c.strafe.validate("strafe")?;
        for (name, tolerance) in [
            ("center_tolerance_deg", c.center_tolerance_deg),
            ("distance_tolerance_in", c.distance_tolerance_in),
            ("rotate_tolerance_deg", c.rotate_tolerance_deg),
        ] {
            if tolerance <= 0.0 {
                return Err(invalid(format!("{} must be positive, got {}", name, tolerance)));
            }
        }

        let t = &self.timing;
        if t.pause_secs <= 0.0 {
            return Err(invalid("pause_secs must be positive".to_string()));
        }
        if t.lost_timeout_secs <= 0.0 {
            return Err(invalid("lost_timeout_secs must be positive".to_string()));
        }
        if t.ms_per_inch <= 0.0 {
            return Err(invalid("ms_per_inch must be positive".to_string()));
        }
        if t.cycle_period_ms == 0 {
            return Err(invalid("cycle_period_ms must be positive".to_string()));
        }

        if self.heading.dead_reckoning_deg_per_sec <= 0.0 {
            return Err(invalid(
                "dead_reckoning_deg_per_sec must be positive".to_string(),
            ));
        }

        let f = &self.follower;
        if f.shy_tags.contains(&f.primary_tag) {
            return Err(invalid(format!(
                "follower primary tag {} is also listed as shy",
                f.primary_tag
            )));
        }
        if !(f.approach_power > 0.0 && f.approach_power <= 1.0) {
            return Err(invalid("follower approach_power must be in (0, 1]".to_string()));
        }

        self.mission.validate()
    }

    /// Tag program for `tag_id`, if the table has one
    pub fn program(&self, tag_id: i32) -> Option<&TagProgram> {
        self.mission.get(tag_id)
    }

    /// Ordered step list for `tag_id`
    pub fn steps(&self, tag_id: i32) -> &[Step] {
        self.program(tag_id)
            .map(|program| program.steps.as_slice())
            .unwrap_or(&[])
    }
}

pub(crate) fn invalid(message: String) -> CoreError {
    CoreError::InvalidConfig(message)
}

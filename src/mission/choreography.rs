//! Per-tag choreography table
//!
//! Which maneuvers run for which tag is data, not control flow: the sequencer
//! looks up the active tag here and walks its step list in order.

use crate::config::invalid;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One maneuver in a tag's choreography
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Rotate in place by `delta_deg` relative to the heading captured at step entry
    Rotate { delta_deg: f64 },
    /// Timed open-loop move forward (+) or backward (-)
    Translate { inches: f64 },
    /// Timed open-loop move right (+) or left (-)
    Strafe { inches: f64 },
    /// Center on the active tag at the given range
    Center { distance_in: f64 },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Rotate { delta_deg } => write!(f, "rotate {:+.0} deg", delta_deg),
            Step::Translate { inches } => write!(f, "translate {:+.1} in", inches),
            Step::Strafe { inches } => write!(f, "strafe {:+.1} in", inches),
            Step::Center { distance_in } => write!(f, "center at {:.1} in", distance_in),
        }
    }
}

/// Approach distance and step list for one tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagProgram {
    pub tag_id: i32,
    /// Range held while centering before the first step, inches
    pub approach_distance_in: f64,
    pub steps: Vec<Step>,
}

impl TagProgram {
    pub fn new(tag_id: i32, approach_distance_in: f64, steps: Vec<Step>) -> Self {
        TagProgram {
            tag_id,
            approach_distance_in,
            steps,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.approach_distance_in <= 0.0 {
            return Err(invalid(format!(
                "tag {} approach distance must be positive",
                self.tag_id
            )));
        }
        if self.steps.is_empty() {
            return Err(invalid(format!("tag {} has no steps", self.tag_id)));
        }
        for (index, step) in self.steps.iter().enumerate() {
            let ok = match *step {
                Step::Rotate { delta_deg } => delta_deg.is_finite() && delta_deg != 0.0,
                Step::Translate { inches } | Step::Strafe { inches } => {
                    inches.is_finite() && inches != 0.0
                }
                Step::Center { distance_in } => distance_in > 0.0,
            };
            if !ok {
                return Err(invalid(format!(
                    "tag {} step {} ({}) is out of range",
                    self.tag_id,
                    index + 1,
                    step
                )));
            }
        }
        Ok(())
    }
}

/// Mapping from tag id to its program, in preference order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoreographyTable {
    pub tags: Vec<TagProgram>,
}

impl Default for ChoreographyTable {
    fn default() -> Self {
        ChoreographyTable {
            tags: vec![
                TagProgram::new(
                    21,
                    36.0,
                    vec![
                        Step::Rotate { delta_deg: 360.0 },
                        Step::Strafe { inches: 12.0 },
                        Step::Strafe { inches: -24.0 },
                        Step::Strafe { inches: 12.0 },
                    ],
                ),
                TagProgram::new(
                    22,
                    36.0,
                    vec![
                        Step::Translate { inches: -12.0 },
                        Step::Translate { inches: 24.0 },
                        Step::Translate { inches: -12.0 },
                        Step::Rotate { delta_deg: 360.0 },
                    ],
                ),
                TagProgram::new(
                    23,
                    48.0,
                    vec![
                        Step::Rotate { delta_deg: 15.0 },
                        Step::Rotate { delta_deg: -30.0 },
                        Step::Rotate { delta_deg: 15.0 },
                        Step::Center { distance_in: 48.0 },
                    ],
                ),
            ],
        }
    }
}

impl ChoreographyTable {
    pub fn get(&self, tag_id: i32) -> Option<&TagProgram> {
        self.tags.iter().find(|program| program.tag_id == tag_id)
    }

    /// Tag ids in table order
    pub fn tag_ids(&self) -> Vec<i32> {
        self.tags.iter().map(|program| program.tag_id).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.tags.is_empty() {
            return Err(invalid("mission table has no tags".to_string()));
        }
        let mut seen = HashSet::new();
        for program in &self.tags {
            if !seen.insert(program.tag_id) {
                return Err(invalid(format!(
                    "tag {} appears twice in the mission table",
                    program.tag_id
                )));
            }
            program.validate()?;
        }
        Ok(())
    }
}

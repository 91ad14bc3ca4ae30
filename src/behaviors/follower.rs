//! Tag follower behavior
//!
//! Keeps the primary tag centered and creeps toward it once it is on boresight.
//! Shy tags make the vehicle turn away instead. There is no notion of losing a
//! tag here: with nothing in view the outputs simply coast down.

use super::primitives::deadband;
use super::{Behavior, MotionCommand};
use crate::common::types::Seconds;
use crate::config::{ControlConfig, FollowerConfig};
use crate::perception::Observation;
use std::any::Any;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowPhase {
    Searching,
    Centering,
    Approaching,
    Avoiding,
}

impl fmt::Display for FollowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub struct TagFollower {
    primary_tag: i32,
    shy_tags: Vec<i32>,
    approach_power: f64,
    turn_gain: f64,
    max_turn: f64,
    min_turn: f64,
    center_tolerance_deg: f64,
    phase: FollowPhase,
    current_tag: Option<i32>,
}

impl TagFollower {
    pub fn new(follower: &FollowerConfig, control: &ControlConfig) -> Self {
        TagFollower {
            primary_tag: follower.primary_tag,
            shy_tags: follower.shy_tags.clone(),
            approach_power: follower.approach_power,
            turn_gain: control.turn_gain,
            max_turn: control.turn.max_power,
            min_turn: control.turn.min_power,
            center_tolerance_deg: control.center_tolerance_deg,
            phase: FollowPhase::Searching,
            current_tag: None,
        }
    }

    pub fn follow_phase(&self) -> FollowPhase {
        self.phase
    }

    fn toward(&self, bearing_deg: f64) -> f64 {
        deadband(
            (-bearing_deg * self.turn_gain).clamp(-self.max_turn, self.max_turn),
            self.min_turn,
        )
    }

    /// Turn away from the tag; a tag dead ahead gives no turn
    fn away(&self, bearing_deg: f64) -> f64 {
        -self.toward(bearing_deg)
    }
}

impl Behavior for TagFollower {
    fn name(&self) -> &str {
        "TagFollower"
    }

    fn accepted_tags(&self) -> Vec<i32> {
        self.preference()
    }

    fn preference(&self) -> Vec<i32> {
        std::iter::once(self.primary_tag)
            .chain(self.shy_tags.iter().copied())
            .collect()
    }

    fn step(&mut self, observation: &Observation) -> MotionCommand {
        let target = observation
            .target
            .filter(|d| d.tag_id == self.primary_tag || self.shy_tags.contains(&d.tag_id));
        self.current_tag = target.map(|d| d.tag_id);

        let (phase, command) = match target {
            None => (FollowPhase::Searching, MotionCommand::Coast),
            Some(d) if d.tag_id == self.primary_tag => {
                if d.bearing_deg.abs() < self.center_tolerance_deg {
                    (
                        FollowPhase::Approaching,
                        MotionCommand::Tank {
                            drive: self.approach_power,
                            turn: 0.0,
                        },
                    )
                } else {
                    (
                        FollowPhase::Centering,
                        MotionCommand::Tank {
                            drive: 0.0,
                            turn: self.toward(d.bearing_deg),
                        },
                    )
                }
            }
            Some(d) => (
                FollowPhase::Avoiding,
                MotionCommand::Tank {
                    drive: 0.0,
                    turn: self.away(d.bearing_deg),
                },
            ),
        };

        if phase != self.phase {
            debug!(from = %self.phase, to = %phase, tag = ?self.current_tag, "follower phase");
            self.phase = phase;
        }
        command
    }

    fn phase(&self) -> String {
        self.phase.to_string()
    }

    fn active_tag(&self) -> Option<i32> {
        self.current_tag
    }

    fn reset(&mut self, _now: Seconds) {
        self.phase = FollowPhase::Searching;
        self.current_tag = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! Behaviors module for the fiducial core
pub mod follower;
pub mod primitives;

use crate::common::types::Seconds;
use crate::error::Result;
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::perception::Observation;
use std::any::Any;
use std::fmt::Debug;
use tracing::debug;

/// Desired motion for one cycle, before shaping
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionCommand {
    /// Force every channel and wheel to exactly zero this cycle
    Stop,
    /// Let every channel decay toward zero through its slew limit
    Coast,
    /// Forward/backward drive plus turn, positive turn is counter-clockwise
    Tank { drive: f64, turn: f64 },
    /// Lateral move, positive to the right
    Strafe { power: f64 },
}

/// Trait for a top-level behavior driving the vehicle
pub trait Behavior: Debug + Send {
    /// Get the name of this behavior
    fn name(&self) -> &str;

    /// Tags whose absence counts toward staleness
    fn accepted_tags(&self) -> Vec<i32>;

    /// Order in which tag ids are tried when several are in view
    fn preference(&self) -> Vec<i32>;

    /// Advance the behavior by one cycle
    fn step(&mut self, observation: &Observation) -> MotionCommand;

    /// Display string for the current phase
    fn phase(&self) -> String;

    /// Tag the behavior is currently working on
    fn active_tag(&self) -> Option<i32>;

    /// Return to the initial phase with the run clock at `now`
    fn reset(&mut self, now: Seconds);

    /// Convert to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Behavior stack for the robot
#[derive(Debug)]
pub struct BehaviorStack {
    base: LifecycleNodeBase,
    behavior: Box<dyn Behavior>,
}

impl BehaviorStack {
    /// Create a new behavior stack with a specific behavior
    pub fn with_behavior<T: Behavior + 'static>(behavior: T) -> Self {
        BehaviorStack {
            base: LifecycleNodeBase::new("behavior_stack"),
            behavior: Box::new(behavior),
        }
    }

    /// Get the name of the current behavior
    pub fn behavior_name(&self) -> &str {
        self.behavior.name()
    }

    pub fn preference(&self) -> Vec<i32> {
        self.behavior.preference()
    }

    pub fn accepted_tags(&self) -> Vec<i32> {
        self.behavior.accepted_tags()
    }

    /// Run the behavior for one cycle
    pub fn step(&mut self, observation: &Observation) -> Result<MotionCommand> {
        self.base.require_active()?;
        Ok(self.behavior.step(observation))
    }

    pub fn phase(&self) -> String {
        self.behavior.phase()
    }

    pub fn active_tag(&self) -> Option<i32> {
        self.behavior.active_tag()
    }

    /// Downcast the behavior, e.g. to inspect the mission sequencer
    pub fn behavior_as<T: Behavior + 'static>(&self) -> Option<&T> {
        self.behavior.as_any().downcast_ref::<T>()
    }
}

impl LifecycleNode for BehaviorStack {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn on_configure(&mut self) -> Result<()> {
        debug!(behavior = self.behavior.name(), "Configuring behavior stack");
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        debug!("Activating behavior stack");
        self.behavior.reset(0.0);
        self.base.set_state(State::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        debug!("Deactivating behavior stack");
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        debug!("Cleaning up behavior stack");
        self.base.set_state(State::Unconfigured);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

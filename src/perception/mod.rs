//! Perception module for the fiducial core
pub mod heading;
pub mod localization;
pub mod tracker;

use self::heading::{select_heading_source, HeadingMode, HeadingSource};
use self::tracker::{TargetTracker, TrackerState};
use crate::common::types::Seconds;
use crate::common::{CycleInput, Detection};
use crate::config::CoreConfig;
use crate::error::Result;
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use std::any::Any;
use tracing::debug;

/// What the behaviors get to see in one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub now: Seconds,
    /// The single detection chosen for this cycle
    pub target: Option<Detection>,
    pub tracker: TrackerState,
    pub heading_deg: f64,
    pub heading_mode: HeadingMode,
}

impl Observation {
    /// This cycle's detection, if it is of `tag_id`
    pub fn target_for(&self, tag_id: Option<i32>) -> Option<&Detection> {
        self.target
            .as_ref()
            .filter(|d| Some(d.tag_id) == tag_id)
    }

    pub fn observed_tag(&self) -> Option<i32> {
        self.target.map(|d| d.tag_id)
    }
}

/// Perception stack for the robot
#[derive(Debug)]
pub struct PerceptionStack {
    base: LifecycleNodeBase,
    tracker: TargetTracker,
    inertial_available: bool,
    dead_reckoning_deg_per_sec: f64,
    heading: Option<Box<dyn HeadingSource>>,
    /// Turn power issued last cycle and when
    last_turn: Option<(f64, Seconds)>,
}

impl PerceptionStack {
    /// Create a new perception stack
    pub fn new(config: &CoreConfig, inertial_available: bool) -> Self {
        PerceptionStack {
            base: LifecycleNodeBase::new("perception_stack"),
            tracker: TargetTracker::new(config.timing.lost_timeout_secs),
            inertial_available,
            dead_reckoning_deg_per_sec: config.heading.dead_reckoning_deg_per_sec,
            heading: None,
            last_turn: None,
        }
    }

    /// Ingest one cycle of sensor input.
    ///
    /// `preference` orders the tag ids when several are in view; `accepted` is the
    /// set whose absence counts toward staleness.
    pub fn observe(
        &mut self,
        input: &CycleInput,
        preference: &[i32],
        accepted: &[i32],
    ) -> Result<Observation> {
        self.base.require_active()?;
        let now = input.elapsed_seconds;

        let target = TargetTracker::select(&input.detections, preference).copied();
        let tracker = self.tracker.update(target.as_ref(), now, accepted);

        let heading = self.heading_source_mut()?;
        heading.observe(input.heading_deg);
        let heading_deg = heading.current_heading_deg();
        let heading_mode = heading.mode();

        debug!(
            now,
            target = ?target.map(|d| d.tag_id),
            stale = tracker.is_stale,
            heading_deg,
            "observation"
        );

        Ok(Observation {
            now,
            target,
            tracker,
            heading_deg,
            heading_mode,
        })
    }

    /// Record the turn power issued this cycle.
    ///
    /// The dead-reckoned heading is advanced by the previously issued turn over the
    /// interval since it was issued.
    pub fn record_turn(&mut self, turn_power: f64, now: Seconds) -> Result<()> {
        let last_turn = self.last_turn.replace((turn_power, now));
        let heading = self.heading_source_mut()?;
        if let Some((previous, issued_at)) = last_turn {
            heading.integrate(previous, (now - issued_at).max(0.0));
        }
        Ok(())
    }

    pub fn heading_mode(&self) -> Option<HeadingMode> {
        self.heading.as_ref().map(|h| h.mode())
    }

    pub fn heading_deg(&self) -> Option<f64> {
        self.heading.as_ref().map(|h| h.current_heading_deg())
    }

    pub fn tracker_state(&self) -> TrackerState {
        self.tracker.state()
    }

    /// Start a new run with the given inertial reading as the zero heading
    pub fn reset(&mut self, reading: Option<f64>) {
        self.tracker.reset();
        self.last_turn = None;
        if let Some(heading) = self.heading.as_mut() {
            heading.reset(reading);
        }
    }

    fn heading_source_mut(&mut self) -> Result<&mut Box<dyn HeadingSource>> {
        self.heading
            .as_mut()
            .ok_or_else(|| self.base.lifecycle_error())
    }
}

impl LifecycleNode for PerceptionStack {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn on_configure(&mut self) -> Result<()> {
        debug!("Configuring perception stack");
        if self.heading.is_none() {
            self.heading = Some(select_heading_source(
                self.inertial_available,
                self.dead_reckoning_deg_per_sec,
            ));
        }
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        debug!("Activating perception stack");
        self.reset(None);
        self.base.set_state(State::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        debug!("Deactivating perception stack");
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        debug!("Cleaning up perception stack");
        self.base.set_state(State::Unconfigured);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub mod behaviors;
pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod mission;
pub mod perception;

use crate::behaviors::follower::TagFollower;
use crate::behaviors::BehaviorStack;
use crate::common::{CycleInput, CycleOutput, StatusRecord, TelemetrySink, WheelPowers, NO_TAG};
use crate::config::CoreConfig;
use crate::control::{ControlStack, WheelActuator};
use crate::error::{CoreError, Result};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::mission::MissionSequencer;
use crate::perception::PerceptionStack;
use tracing::{error, info};

/// Which top-level behavior drives the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorMode {
    Mission,
    Follow,
}

/// Core functionality for the fiducial mission controller
#[derive(Debug)]
pub struct FiducialCore {
    base: LifecycleNodeBase,
    perception: PerceptionStack,
    behaviors: BehaviorStack,
    control: ControlStack,
}

impl FiducialCore {
    /// Create a new core; the configuration is validated here, before any cycle runs
    pub fn new(config: CoreConfig, mode: BehaviorMode, inertial_available: bool) -> Result<Self> {
        config.validate()?;
        let behaviors = match mode {
            BehaviorMode::Mission => BehaviorStack::with_behavior(MissionSequencer::new(&config)),
            BehaviorMode::Follow => {
                BehaviorStack::with_behavior(TagFollower::new(&config.follower, &config.control))
            }
        };
        Ok(FiducialCore {
            base: LifecycleNodeBase::new("fiducial_core"),
            perception: PerceptionStack::new(&config, inertial_available),
            behaviors,
            control: ControlStack::new(&config.control),
        })
    }

    fn components(&mut self) -> [&mut dyn LifecycleNode; 3] {
        [&mut self.perception, &mut self.behaviors, &mut self.control]
    }

    /// Configure and activate all components
    pub fn init(&mut self) -> Result<()> {
        for component in self.components() {
            component.on_configure()?;
            component.on_activate()?;
        }
        self.base.set_state(State::Active);
        info!(behavior = self.behaviors.behavior_name(), "fiducial core initialized");
        Ok(())
    }

    /// Start the run over with `reading` as the zero heading
    pub fn reset_heading(&mut self, reading: Option<f64>) {
        self.perception.reset(reading);
    }

    /// Run one control cycle.
    ///
    /// A failing actuator is terminal: the core is finalized and every later call
    /// returns a lifecycle error.
    pub fn step(
        &mut self,
        input: &CycleInput,
        actuator: &mut dyn WheelActuator,
        telemetry: &mut dyn TelemetrySink,
    ) -> Result<CycleOutput> {
        self.base.require_active()?;
        let now = input.elapsed_seconds;

        let (powers, observed) = if input.stop_requested {
            self.control.stop(now);
            self.perception.record_turn(0.0, now)?;
            (WheelPowers::ZERO, None)
        } else {
            let preference = self.behaviors.preference();
            let accepted = self.behaviors.accepted_tags();
            let observation = self.perception.observe(input, &preference, &accepted)?;
            let command = self.behaviors.step(&observation)?;
            let shaped = self.control.apply(command, now)?;
            self.perception.record_turn(shaped.turn, now)?;
            (shaped.powers, observation.observed_tag())
        };

        if let Err(err) = actuator.set_powers(powers) {
            error!(%err, "wheel actuator failed, finalizing");
            self.base.set_state(State::Finalized);
            return Err(CoreError::from(err));
        }

        let status = StatusRecord {
            phase: self.behaviors.phase(),
            active_tag_id: self.behaviors.active_tag().unwrap_or(NO_TAG),
            observed_tag_id: observed.unwrap_or(NO_TAG),
        };
        self.publish(&status, powers, telemetry);

        Ok(CycleOutput { powers, status })
    }

    fn publish(&self, status: &StatusRecord, powers: WheelPowers, telemetry: &mut dyn TelemetrySink) {
        telemetry.add_data("State", status.phase.clone());
        telemetry.add_data("CurrentTagId", status.active_tag_id.to_string());
        telemetry.add_data("TagSeen", status.observed_tag_id.to_string());
        if let Some(mode) = self.perception.heading_mode() {
            telemetry.add_data("Heading", mode.to_string());
        }
        telemetry.add_data("Motor Power", powers.to_string());
        telemetry.update();
    }

    /// Deactivate and clean up all components
    pub fn shutdown(&mut self) -> Result<()> {
        for component in self.components() {
            component.on_deactivate()?;
            component.on_cleanup()?;
        }
        if self.base.get_state() != State::Finalized {
            self.base.set_state(State::Unconfigured);
        }
        info!("fiducial core shut down");
        Ok(())
    }

    pub fn state(&self) -> State {
        self.base.get_state()
    }

    /// Get a reference to the behavior stack
    pub fn behavior_stack(&self) -> &BehaviorStack {
        &self.behaviors
    }

    /// The mission sequencer, when running in mission mode
    pub fn mission(&self) -> Option<&MissionSequencer> {
        self.behaviors.behavior_as::<MissionSequencer>()
    }

    pub fn perception_stack(&self) -> &PerceptionStack {
        &self.perception
    }
}

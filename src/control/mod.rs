//! Control module for the fiducial core
pub mod mixer;
pub mod shaper;

use self::mixer::DriveMixer;
use self::shaper::ShapedChannel;
use crate::behaviors::MotionCommand;
use crate::common::types::Seconds;
use crate::common::WheelPowers;
use crate::config::ControlConfig;
use crate::error::{ActuatorError, Result};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use std::any::Any;
use tracing::{debug, trace};

/// Output channel for the four wheel powers
pub trait WheelActuator {
    /// Apply the powers; an error means the channel is gone for good
    fn set_powers(&mut self, powers: WheelPowers) -> std::result::Result<(), ActuatorError>;
}

/// Shaped channel values and the wheel powers mixed from them
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShapedCommand {
    pub drive: f64,
    pub turn: f64,
    pub strafe: f64,
    pub powers: WheelPowers,
}

/// Control stack for the robot
#[derive(Debug)]
pub struct ControlStack {
    base: LifecycleNodeBase,
    config: ControlConfig,
    drive: ShapedChannel,
    turn: ShapedChannel,
    strafe: ShapedChannel,
    mixer: DriveMixer,
}

impl ControlStack {
    /// Create a new control stack
    pub fn new(config: &ControlConfig) -> Self {
        ControlStack {
            base: LifecycleNodeBase::new("control_stack"),
            config: config.clone(),
            drive: ShapedChannel::new(config.drive),
            turn: ShapedChannel::new(config.turn),
            strafe: ShapedChannel::new(config.strafe),
            mixer: DriveMixer::new(),
        }
    }

    /// Shape a motion command and mix it into wheel powers
    pub fn apply(&mut self, command: MotionCommand, now: Seconds) -> Result<ShapedCommand> {
        self.base.require_active()?;

        let (drive, turn, strafe) = match command {
            MotionCommand::Stop => return Ok(self.stop(now)),
            MotionCommand::Coast => (
                self.drive.coast(now),
                self.turn.coast(now),
                self.strafe.coast(now),
            ),
            MotionCommand::Tank { drive, turn } => (
                self.drive.shape(drive, now),
                self.turn.shape(turn, now),
                self.strafe.coast(now),
            ),
            MotionCommand::Strafe { power } => (
                self.drive.coast(now),
                self.turn.coast(now),
                self.strafe.shape(power, now),
            ),
        };

        let powers = self.mixer.mix(drive, turn, strafe);
        trace!(?command, drive, turn, strafe, %powers, "shaped command");
        Ok(ShapedCommand {
            drive,
            turn,
            strafe,
            powers,
        })
    }

    /// Force every channel to rest immediately
    pub fn stop(&mut self, now: Seconds) -> ShapedCommand {
        self.drive.stop(now);
        self.turn.stop(now);
        self.strafe.stop(now);
        ShapedCommand::default()
    }

    fn reset_channels(&mut self) {
        self.drive = ShapedChannel::new(self.config.drive);
        self.turn = ShapedChannel::new(self.config.turn);
        self.strafe = ShapedChannel::new(self.config.strafe);
    }
}

impl LifecycleNode for ControlStack {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn on_configure(&mut self) -> Result<()> {
        debug!("Configuring control stack");
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        debug!("Activating control stack");
        self.reset_channels();
        self.base.set_state(State::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        debug!("Deactivating control stack");
        self.reset_channels();
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        debug!("Cleaning up control stack");
        self.base.set_state(State::Unconfigured);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

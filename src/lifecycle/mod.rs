//! Lifecycle management for fiducial core components

use crate::error::{CoreError, Result};
use std::any::Any;
use std::fmt;

/// Trait for components that follow a lifecycle pattern
pub trait LifecycleNode: Send {
    /// Component name used in logs and errors
    fn name(&self) -> &str;

    /// Configure the node
    fn on_configure(&mut self) -> Result<()>;

    /// Activate the node
    fn on_activate(&mut self) -> Result<()>;

    /// Deactivate the node
    fn on_deactivate(&mut self) -> Result<()>;

    /// Clean up the node
    fn on_cleanup(&mut self) -> Result<()>;

    /// Convert to Any for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Base implementation for lifecycle nodes
#[derive(Debug)]
pub struct LifecycleNodeBase {
    pub name: String,
    state: State,
}

/// State of a lifecycle node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unconfigured,
    Inactive,
    Active,
    Finalized,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Unconfigured => "unconfigured",
            State::Inactive => "inactive",
            State::Active => "active",
            State::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

impl LifecycleNodeBase {
    /// Create a new lifecycle node base
    pub fn new(name: &str) -> Self {
        LifecycleNodeBase {
            name: name.to_string(),
            state: State::Unconfigured,
        }
    }

    /// Get the current state
    pub fn get_state(&self) -> State {
        self.state
    }

    /// Set the state
    pub fn set_state(&mut self, state: State) {
        self.state = state;
    }

    /// Error describing why the node cannot do work right now
    pub fn lifecycle_error(&self) -> CoreError {
        CoreError::Lifecycle {
            component: self.name.clone(),
            state: self.state.to_string(),
        }
    }

    pub fn require_active(&self) -> Result<()> {
        if self.state == State::Active {
            Ok(())
        } else {
            Err(self.lifecycle_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_active() {
        let mut base = LifecycleNodeBase::new("control_stack");
        let err = base.require_active().unwrap_err();
        assert_eq!(err.to_string(), "control_stack cannot run while unconfigured");
        base.set_state(State::Active);
        assert!(base.require_active().is_ok());
        base.set_state(State::Finalized);
        assert!(base.require_active().is_err());
    }
}

//! Error types for the fiducial core

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the control core
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration failed validation before the control loop started
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read configuration file {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration")]
    ConfigParse(#[from] toml::de::Error),

    /// The actuation output channel is gone; terminal for the run
    #[error("actuator output channel lost: {0}")]
    ActuatorLost(String),

    #[error("{component} cannot run while {state}")]
    Lifecycle { component: String, state: String },
}

/// Failure reported by the wheel actuator collaborator
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ActuatorError(pub String);

impl From<ActuatorError> for CoreError {
    fn from(err: ActuatorError) -> Self {
        CoreError::ActuatorLost(err.0)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

use std::path::PathBuf;

use thiserror::Error;

/// Rejected configuration. Raised once while a run is set up, nothing is clamped silently.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("invalid chamber geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid flow conditions: {0}")]
    InvalidFlowConditions(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("overwrite key `{0}` is not a configuration attribute")]
    UnknownOverride(String),
}

impl ConfigurationError {
    pub fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("cannot access `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed YAML document")]
    Yaml(#[from] serde_yaml::Error),
}

pub type SimulationResult<T> = Result<T, SimulationError>;

impl SimulationError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SimulationError::Io {
            path: path.into(),
            source,
        }
    }
}

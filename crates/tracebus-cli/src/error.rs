//! Error types for the tracebus CLI

use thiserror::Error;
use tracebus_core::{BusError, ConfigError, FactoryError};

/// Errors that end a CLI run
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid input data or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The bus could not route the command. Handler faults are not errors
    /// of the run and never take this path.
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        CliError::InvalidInput(msg.into())
    }

    /// Check if this is a user-facing error (vs internal)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CliError::InvalidInput(_) | CliError::Factory(_) | CliError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors() {
        assert!(CliError::invalid_input("bad field").is_user_error());
        assert!(CliError::from(FactoryError::FactoryNotFound("x".into())).is_user_error());
        assert!(CliError::from(ConfigError::ZeroQueueSize).is_user_error());
        assert!(!CliError::from(anyhow::anyhow!("boom")).is_user_error());
    }

    #[test]
    fn test_factory_error_is_transparent() {
        let err = CliError::from(FactoryError::FactoryNotFound("frobnicate".into()));
        assert_eq!(err.to_string(), "No factory found for type: frobnicate");
    }
}

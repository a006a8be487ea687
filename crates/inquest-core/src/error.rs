//! Error types for the session engine surface.

use thiserror::Error;

use crate::domain::remote::ApiError;

/// Error returned by engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// An operation needing a selected client was triggered without one
    #[error("no client selected")]
    NoClientSelected,

    /// Start or schedule was triggered outside a configuration workflow
    #[error("no flow configuration in progress")]
    NoConfigurationActive,

    /// The flow name is absent from the descriptor catalog
    #[error("unknown flow: {0}")]
    UnknownFlow(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The engine's background workers have shut down
    #[error("session engine shut down")]
    EngineClosed,

    /// Remote call failure
    #[error(transparent)]
    Api(#[from] ApiError),
}

//! Runtime error types.

use rivet_core::{BridgeError, ConfigError};
use thiserror::Error;

use crate::config::LoadError;

/// Errors that can occur while building or running a session.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Startup wiring failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The native bridge failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// The native runtime could not be created.
    #[error("Failed to start native runtime: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

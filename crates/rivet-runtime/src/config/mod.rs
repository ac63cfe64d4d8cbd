//! Configuration module for the Rivet runtime.
//!
//! Layered loading ([`ConfigLoader`]), the [`RivetConfig`] schema and its
//! error type.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{LoadError, LoadResult};
pub use loader::{ConfigLoader, PROFILE_ENV, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LoggingConfig, NativeConfig, RivetConfig, SessionConfig,
    SpanEventConfig,
};

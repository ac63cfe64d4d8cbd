//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rivet_core::DecodeFailurePolicy;
use serde::{Deserialize, Serialize};

use super::error::{LoadError, LoadResult};

/// Root configuration structure.
///
/// ```toml
/// [logging]
/// level = "debug"
///
/// [session]
/// send_timeout_ms = 5000
/// decode_failure = "drop"
///
/// [native]
/// worker_threads = 2
///
/// [modules.echo]
/// prefix = "> "
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RivetConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub native: NativeConfig,

    /// Per-module sections, keyed by module factory id.
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

impl RivetConfig {
    /// Rejects values that parse but cannot be used.
    pub fn validate(&self) -> LoadResult<()> {
        if self.session.send_timeout_ms == Some(0) {
            return Err(LoadError::invalid(
                "session.send_timeout_ms must be positive; omit it to disable the timeout",
            ));
        }
        if self.native.worker_threads == Some(0) {
            return Err(LoadError::invalid("native.worker_threads must be positive"));
        }
        if self.logging.output == LogOutput::File && self.logging.file_path.is_none() {
            return Err(LoadError::invalid(
                "logging.output is \"file\" but logging.file_path is not set",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Session
// =============================================================================

/// Session and bridge behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Timeout for deferred outbound sends, in milliseconds. Unset means no
    /// timeout.
    #[serde(default)]
    pub send_timeout_ms: Option<u64>,

    /// What to do with inbound events that fail to decode.
    #[serde(default)]
    pub decode_failure: DecodeFailurePolicy,
}

impl SessionConfig {
    pub fn send_timeout(&self) -> Option<Duration> {
        self.send_timeout_ms.map(Duration::from_millis)
    }
}

// =============================================================================
// Native
// =============================================================================

/// Settings for the bundled in-process native runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeConfig {
    /// Worker threads of the native tokio runtime. Unset uses one per core.
    #[serde(default)]
    pub worker_threads: Option<usize>,

    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: default_thread_name(),
        }
    }
}

fn default_thread_name() -> String {
    "rivet-native".to_string()
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, used when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line number.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-target level overrides, e.g. `rivet_framework = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

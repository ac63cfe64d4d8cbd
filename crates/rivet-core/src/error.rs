//! Unified error types for the Rivet core.
//!
//! Each family maps onto one failure mode of the runtime:
//!
//! | Type | Raised by | Severity |
//! |---|---|---|
//! | [`ConfigError`] | registry build, handshake, session start | fatal at startup |
//! | [`CodecError`] | payload encode / decode | per call |
//! | [`DispatchError`] | a failing or panicking handler | per event |
//! | [`BridgeError`] | outbound `send` and the native loop | per call |
//! | [`InboundError`] | the inbound entry point | per event, unless fatal |

use std::time::Duration;

use thiserror::Error;

use crate::event::EventKind;

/// Boxed error returned by handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Startup wiring errors. None of these are recoverable: the session must not
/// reach the running state once one has been raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A member tagged as a handler does not have the handler shape.
    #[error("malformed handler `{module}::{handler}`: {reason}")]
    MalformedHandler {
        module: String,
        handler: String,
        reason: String,
    },

    /// Handlers for this kind were already collected.
    #[error("handlers for event kind `{kind}` are already registered")]
    DuplicateRegistration { kind: EventKind },

    /// The native handshake was attempted a second time.
    #[error("native handshake has already been performed")]
    DuplicateHandshake,

    /// The session was started a second time.
    #[error("session has already been started")]
    AlreadyStarted,

    /// A module rejected its configuration section.
    #[error("invalid configuration for module `{module}`: {reason}")]
    ModuleConfig { module: String, reason: String },

    /// Two modules in one session share an id.
    #[error("module id `{id}` is used by more than one module")]
    DuplicateModule { id: String },
}

impl ConfigError {
    /// Creates a [`ConfigError::MalformedHandler`].
    pub fn malformed(
        module: impl Into<String>,
        handler: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedHandler {
            module: module.into(),
            handler: handler.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Codec Errors
// =============================================================================

/// Errors raised while turning payloads into bytes and back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A value could not be serialized.
    #[error("failed to encode {kind}: {reason}")]
    Encode { kind: String, reason: String },

    /// A byte sequence is not a valid payload of the expected type.
    #[error("failed to decode {kind}: {reason}")]
    Decode { kind: String, reason: String },

    /// No payload type is known for this command name.
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
}

impl CodecError {
    pub fn encode(kind: impl Into<String>, reason: impl ToString) -> Self {
        Self::Encode {
            kind: kind.into(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(kind: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            kind: kind.into(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// A handler failed while processing an event. Remaining handlers in that
/// event's chain were skipped.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The handler returned an error.
    #[error("handler `{module}::{handler}` failed: {source}")]
    HandlerFailed {
        module: String,
        handler: String,
        #[source]
        source: BoxError,
    },

    /// The handler panicked. The panic was caught at the dispatch boundary.
    #[error("handler `{module}::{handler}` panicked: {message}")]
    HandlerPanicked {
        module: String,
        handler: String,
        message: String,
    },
}

impl DispatchError {
    /// Name of the module owning the failing handler.
    pub fn module(&self) -> &str {
        match self {
            Self::HandlerFailed { module, .. } | Self::HandlerPanicked { module, .. } => module,
        }
    }

    /// Name of the failing handler.
    pub fn handler(&self) -> &str {
        match self {
            Self::HandlerFailed { handler, .. } | Self::HandlerPanicked { handler, .. } => handler,
        }
    }
}

// =============================================================================
// Bridge Errors
// =============================================================================

/// Errors surfaced by the native bridge.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// The bridge was used before the handshake set the session handle.
    /// This is a programming error in the caller.
    #[error("`{command}` issued before the native handshake completed")]
    HandshakeIncomplete { command: String },

    /// The native side reported a failure.
    #[error("native call `{command}` failed: {message}")]
    Native { command: String, message: String },

    /// The native side has no operation with this name.
    #[error("native runtime has no command `{0}`")]
    UnknownCommand(String),

    /// The deferred send did not complete in time.
    #[error("native call `{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The native event loop cannot be started.
    #[error("native event loop unavailable: {0}")]
    LoopUnavailable(String),

    /// The native event loop stopped because inbound delivery failed fatally.
    #[error("native event loop aborted: {0}")]
    Aborted(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BridgeError {
    /// Creates a [`BridgeError::Native`].
    pub fn native(command: impl Into<String>, message: impl ToString) -> Self {
        Self::Native {
            command: command.into(),
            message: message.to_string(),
        }
    }
}

// =============================================================================
// Inbound Errors
// =============================================================================

/// Failure to deliver one inbound event.
#[derive(Debug, Error)]
pub enum InboundError {
    /// The payload could not be decoded; the event was dropped.
    #[error("dropped `{kind}` event: {source}")]
    Decode {
        kind: EventKind,
        #[source]
        source: CodecError,
    },

    /// The payload could not be decoded and the session is configured to
    /// stop on malformed input.
    #[error("undecodable `{kind}` event: {source}")]
    Aborted {
        kind: EventKind,
        #[source]
        source: CodecError,
    },

    /// A handler failed for this event.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl InboundError {
    /// Whether the native loop should stop delivering events.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for startup wiring.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

//! Native bridge implementation.
//!
//! The [`NativeBridge`] is the boundary object between Rivet and the native
//! session. It carries traffic in two directions:
//!
//! | Direction | Entry point | Caller |
//! |---|---|---|
//! | outbound | [`NativeBridge::send`] / [`NativeBridge::send_async`] | handlers, via [`Client`](crate::Client) |
//! | inbound | [`InboundSink::deliver`] (implemented by [`Inbound`]) | the native event-loop thread |
//!
//! # Architecture
//!
//! ```text
//! NativeRuntime::run_loop ──► Inbound::deliver ──► Codec::decode_event
//!                                                      │
//!                                                      ▼
//!                         NativeBridge::send ◄── EventDispatcher::dispatch
//! ```
//!
//! # Session handle
//!
//! The [`BridgeHandle`] triple is written exactly once by
//! [`NativeBridge::handshake`]. Outbound calls issued before that fail with
//! [`BridgeError::HandshakeIncomplete`]; a second handshake fails with
//! [`ConfigError::DuplicateHandshake`].
//!
//! The bridge neither retries nor buffers. Each outbound call is one
//! request/response pair and each inbound delivery is one dispatch.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::codec::Codec;
use crate::command::Command;
use crate::dispatch::{DispatchOutcome, EventDispatcher};
use crate::error::{BridgeError, BridgeResult, ConfigError, InboundError};
use crate::event::EventKind;

// =============================================================================
// Handles
// =============================================================================

/// Opaque identifier owned by the native side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(u64);

impl RawHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

/// The handle triple identifying one live native session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeHandle {
    pub environment: RawHandle,
    pub runtime: RawHandle,
    pub client: RawHandle,
}

// =============================================================================
// Native runtime boundary
// =============================================================================

/// Receives raw events from the native event loop.
pub trait InboundSink: Send + Sync {
    /// Decodes and dispatches one event.
    ///
    /// The native loop keeps going after an error unless
    /// [`InboundError::is_fatal`] says otherwise.
    fn deliver(&self, kind: EventKind, payload: &[u8]) -> Result<DispatchOutcome, InboundError>;
}

/// The three calls that cross into the native session.
pub trait NativeRuntime: Send + Sync {
    /// Establishes the session and hands back its handle triple.
    /// Called at most once per process.
    fn handshake(&self) -> BridgeResult<BridgeHandle>;

    /// Runs the native operation `command` with an encoded payload and
    /// returns the encoded response, which may be empty.
    fn send(&self, handle: &BridgeHandle, command: &str, payload: &[u8]) -> BridgeResult<Vec<u8>>;

    /// Hands control to the native event loop. Blocks until the session ends,
    /// calling `inbound` for every event.
    fn run_loop(&self, handle: &BridgeHandle, inbound: &dyn InboundSink) -> BridgeResult<()>;
}

// =============================================================================
// Native Bridge
// =============================================================================

/// Boundary object carrying the session handle.
pub struct NativeBridge {
    native: Arc<dyn NativeRuntime>,
    codec: Arc<dyn Codec>,
    handle: OnceLock<BridgeHandle>,
    /// Set before the native handshake runs so it can never run twice.
    handshake_started: AtomicBool,
    send_timeout: Option<Duration>,
}

impl NativeBridge {
    /// Creates a bridge with no session handle and no send timeout.
    pub fn new(native: Arc<dyn NativeRuntime>, codec: Arc<dyn Codec>) -> Self {
        Self {
            native,
            codec,
            handle: OnceLock::new(),
            handshake_started: AtomicBool::new(false),
            send_timeout: None,
        }
    }

    /// Sets the timeout applied by [`send_async`](Self::send_async).
    /// `None` waits forever.
    pub fn with_send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    pub fn send_timeout(&self) -> Option<Duration> {
        self.send_timeout
    }

    /// The session handle, once the handshake has completed.
    pub fn handle(&self) -> Option<BridgeHandle> {
        self.handle.get().copied()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.get().is_some()
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Performs the one-time native handshake and stores the handle triple.
    ///
    /// A failed native handshake is not retried: the bridge stays without a
    /// handle and further attempts are rejected.
    pub fn handshake(&self) -> BridgeResult<BridgeHandle> {
        if self.handshake_started.swap(true, Ordering::AcqRel) {
            return Err(ConfigError::DuplicateHandshake.into());
        }

        let handle = self.native.handshake()?;
        self.handle
            .set(handle)
            .map_err(|_| ConfigError::DuplicateHandshake)?;

        info!(
            environment = handle.environment.get(),
            runtime = handle.runtime.get(),
            client = handle.client.get(),
            "Native handshake completed"
        );
        Ok(handle)
    }

    /// Hands control to the native event loop until the session ends.
    pub fn run_loop(&self, inbound: &dyn InboundSink) -> BridgeResult<()> {
        let handle = self.require_handle("run_loop")?;
        info!("Entering native event loop");
        let result = self.native.run_loop(&handle, inbound);
        match &result {
            Ok(()) => info!("Native event loop finished"),
            Err(e) => error!(error = %e, "Native event loop failed"),
        }
        result
    }

    /// Builds the inbound entry point for this bridge's codec.
    pub fn inbound(
        &self,
        dispatcher: Arc<dyn EventDispatcher>,
        policy: DecodeFailurePolicy,
    ) -> Inbound {
        Inbound::new(Arc::clone(&self.codec), dispatcher, policy)
    }

    // ─── Outbound ────────────────────────────────────────────────────────────

    /// Runs a native command and blocks until it answers.
    pub fn send(&self, command: &str, payload: &[u8]) -> BridgeResult<Vec<u8>> {
        let handle = self.require_handle(command)?;
        trace!(command, bytes = payload.len(), "Sending native command");

        match self.native.send(&handle, command, payload) {
            Ok(reply) => {
                trace!(command, bytes = reply.len(), "Native command answered");
                Ok(reply)
            }
            Err(e) => {
                warn!(command, error = %e, "Native command failed");
                Err(e)
            }
        }
    }

    /// Encodes `command` with the bridge codec and sends it.
    pub fn send_command(&self, command: &Command) -> BridgeResult<Vec<u8>> {
        let payload = self.codec.encode_command(command)?;
        self.send(command.name(), &payload)
    }

    /// Deferred variant of [`send`](Self::send).
    ///
    /// The blocking call runs on tokio's blocking pool. If a send timeout is
    /// configured and elapses, [`BridgeError::Timeout`] is returned; the
    /// native call itself keeps running to completion and its reply is
    /// discarded.
    pub async fn send_async(
        self: &Arc<Self>,
        command: impl Into<String>,
        payload: Vec<u8>,
    ) -> BridgeResult<Vec<u8>> {
        let command = command.into();
        let bridge = Arc::clone(self);
        let name = command.clone();
        let call = tokio::task::spawn_blocking(move || bridge.send(&name, &payload));

        let joined = match self.send_timeout {
            Some(timeout) => tokio::time::timeout(timeout, call).await.map_err(|_| {
                warn!(command = %command, ?timeout, "Native command timed out");
                BridgeError::Timeout {
                    command: command.clone(),
                    timeout,
                }
            })?,
            None => call.await,
        };

        joined.map_err(|e| BridgeError::native(command, e))?
    }

    fn require_handle(&self, command: &str) -> BridgeResult<BridgeHandle> {
        self.handle
            .get()
            .copied()
            .ok_or_else(|| BridgeError::HandshakeIncomplete {
                command: command.to_string(),
            })
    }
}

impl fmt::Debug for NativeBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBridge")
            .field("handle", &self.handle.get())
            .field("send_timeout", &self.send_timeout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// What to do with an inbound payload that fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeFailurePolicy {
    /// Log the failure, drop the event and keep the loop running.
    #[default]
    Drop,
    /// Report the failure as fatal so the native loop stops.
    Abort,
}

/// Inbound entry point: decodes raw events and forwards them to a dispatcher.
///
/// Holds no mutable state, so the native runtime may call it from several
/// threads at once.
pub struct Inbound {
    codec: Arc<dyn Codec>,
    dispatcher: Arc<dyn EventDispatcher>,
    policy: DecodeFailurePolicy,
}

impl Inbound {
    pub fn new(
        codec: Arc<dyn Codec>,
        dispatcher: Arc<dyn EventDispatcher>,
        policy: DecodeFailurePolicy,
    ) -> Self {
        Self {
            codec,
            dispatcher,
            policy,
        }
    }

    pub fn policy(&self) -> DecodeFailurePolicy {
        self.policy
    }
}

impl InboundSink for Inbound {
    fn deliver(&self, kind: EventKind, payload: &[u8]) -> Result<DispatchOutcome, InboundError> {
        let event = match self.codec.decode_event(kind, payload) {
            Ok(event) => event,
            Err(source) => {
                return Err(match self.policy {
                    DecodeFailurePolicy::Drop => {
                        warn!(event = %kind, error = %source, "Dropping undecodable event");
                        InboundError::Decode { kind, source }
                    }
                    DecodeFailurePolicy::Abort => {
                        error!(event = %kind, error = %source, "Undecodable event, aborting");
                        InboundError::Aborted { kind, source }
                    }
                });
            }
        };

        // Message content only shows up at trace.
        match event.plain_text() {
            Some(text) if !text.is_empty() => {
                trace!(event = %kind, text = %text, "Received message event")
            }
            _ => debug!(event = %kind, "Received event"),
        }

        match self.dispatcher.dispatch(&event) {
            Ok(outcome) => {
                match &outcome {
                    DispatchOutcome::Handled { module, handler } => {
                        debug!(event = %kind, module = %module, handler = %handler, "Event handled")
                    }
                    DispatchOutcome::Unhandled => debug!(event = %kind, "Event not handled"),
                    DispatchOutcome::Unregistered => {
                        trace!(event = %kind, "No handlers registered for event")
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    event = %kind,
                    module = %e.module(),
                    handler = %e.handler(),
                    error = %e,
                    "Event handler failed"
                );
                Err(e.into())
            }
        }
    }
}

impl fmt::Debug for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbound")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

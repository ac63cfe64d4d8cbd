//! In-process native runtime backed by a tokio channel.
//!
//! [`ChannelRuntime`] plays the native side of the bridge inside the current
//! process:
//!
//! - inbound events are pushed through an [`EventSender`] and delivered one
//!   at a time by [`NativeRuntime::run_loop`];
//! - outbound commands are routed by name to registered
//!   [`CommandService`]s, which run on the runtime's own worker threads.
//!
//! ```text
//! EventSender::push ──► mpsc ──► run_loop ──► InboundSink::deliver
//!                                                    │
//!       CommandService ◄── worker pool ◄── send ◄────┘
//! ```
//!
//! The loop ends when every [`EventSender`] is dropped, when the shutdown
//! token is cancelled, or (if enabled) on Ctrl+C.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, mpsc};

use async_trait::async_trait;
use parking_lot::Mutex;
use rivet_core::{
    BridgeError, BridgeHandle, BridgeResult, Codec, ConfigError, Event, EventKind, InboundSink,
    JsonCodec, NativeRuntime, RawHandle,
};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::NativeConfig;
use crate::error::RuntimeResult;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Command services
// =============================================================================

/// Answers one named native command.
///
/// Implemented for any `Fn(Vec<u8>) -> impl Future<Output = BridgeResult<Vec<u8>>>`,
/// so plain async closures can be registered directly.
#[async_trait]
pub trait CommandService: Send + Sync {
    async fn call(&self, payload: Vec<u8>) -> BridgeResult<Vec<u8>>;
}

#[async_trait]
impl<F, Fut> CommandService for F
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BridgeResult<Vec<u8>>> + Send + 'static,
{
    async fn call(&self, payload: Vec<u8>) -> BridgeResult<Vec<u8>> {
        (self)(payload).await
    }
}

// =============================================================================
// Event feed
// =============================================================================

/// A raw event waiting to be delivered.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub kind: EventKind,
    pub payload: Vec<u8>,
}

/// Feeds events into a [`ChannelRuntime`].
///
/// Cloneable. The event loop finishes once every sender is gone.
#[derive(Clone)]
pub struct EventSender {
    tx: UnboundedSender<RawEvent>,
    codec: Arc<dyn Codec>,
}

impl EventSender {
    /// Queues an already-encoded event.
    pub fn push(&self, kind: EventKind, payload: impl Into<Vec<u8>>) -> BridgeResult<()> {
        self.tx
            .send(RawEvent {
                kind,
                payload: payload.into(),
            })
            .map_err(|_| BridgeError::LoopUnavailable("event loop has shut down".into()))
    }

    /// Encodes `event` with the runtime codec and queues it.
    pub fn push_event(&self, event: &Event) -> BridgeResult<()> {
        let payload = self.codec.encode_event(event)?;
        self.push(event.kind(), payload)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for EventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Channel Runtime
// =============================================================================

/// An in-process [`NativeRuntime`].
pub struct ChannelRuntime {
    /// `None` only while dropping.
    runtime: Option<Runtime>,
    services: HashMap<String, Arc<dyn CommandService>>,
    events: Mutex<Option<UnboundedReceiver<RawEvent>>>,
    shutdown: CancellationToken,
    ctrl_c: bool,
    handshaken: AtomicBool,
    handle: OnceLock<BridgeHandle>,
}

impl ChannelRuntime {
    pub fn builder() -> ChannelRuntimeBuilder {
        ChannelRuntimeBuilder::default()
    }

    /// Cancelling this token ends the event loop after the event in flight.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Names of the registered command services.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    fn runtime(&self) -> BridgeResult<&Runtime> {
        self.runtime
            .as_ref()
            .ok_or_else(|| BridgeError::LoopUnavailable("native runtime is shut down".into()))
    }

    fn check_handle(&self, command: &str, handle: &BridgeHandle) -> BridgeResult<()> {
        match self.handle.get() {
            Some(own) if own == handle => Ok(()),
            Some(_) => Err(BridgeError::native(command, "handle belongs to another session")),
            None => Err(BridgeError::HandshakeIncomplete {
                command: command.to_string(),
            }),
        }
    }

    async fn next_event(&self, rx: &mut UnboundedReceiver<RawEvent>) -> Option<RawEvent> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                info!("Shutdown requested, leaving event loop");
                None
            }
            event = rx.recv() => event,
        }
    }

    /// Listens for Ctrl+C for the whole loop, including while a handler runs.
    fn watch_ctrl_c(&self, runtime: &Runtime) -> Option<JoinHandle<()>> {
        if !self.ctrl_c {
            return None;
        }
        let token = self.shutdown.clone();
        Some(runtime.spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, leaving event loop");
                    token.cancel();
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
            }
        }))
    }

    fn drain(
        &self,
        runtime: &Runtime,
        rx: &mut UnboundedReceiver<RawEvent>,
        inbound: &dyn InboundSink,
    ) -> BridgeResult<usize> {
        let mut delivered = 0usize;
        // Delivery happens outside `block_on` so handlers can call `send`.
        while let Some(event) = runtime.block_on(self.next_event(rx)) {
            delivered += 1;
            if let Err(e) = inbound.deliver(event.kind, &event.payload) {
                if e.is_fatal() {
                    error!(error = %e, "Fatal inbound error, stopping event loop");
                    return Err(BridgeError::Aborted(e.to_string()));
                }
            }
        }
        Ok(delivered)
    }
}

impl NativeRuntime for ChannelRuntime {
    fn handshake(&self) -> BridgeResult<BridgeHandle> {
        if self.handshaken.swap(true, Ordering::AcqRel) {
            return Err(ConfigError::DuplicateHandshake.into());
        }

        let handle = BridgeHandle {
            environment: RawHandle::new(u64::from(std::process::id())),
            runtime: RawHandle::new(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)),
            client: RawHandle::new(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)),
        };
        self.handle
            .set(handle)
            .map_err(|_| ConfigError::DuplicateHandshake)?;
        debug!(commands = self.services.len(), "Channel runtime session opened");
        Ok(handle)
    }

    fn send(&self, handle: &BridgeHandle, command: &str, payload: &[u8]) -> BridgeResult<Vec<u8>> {
        self.check_handle(command, handle)?;
        let service = self
            .services
            .get(command)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownCommand(command.to_string()))?;

        // The caller may itself be a tokio thread, so the reply comes back
        // over a std channel instead of a nested `block_on`.
        let (tx, rx) = mpsc::sync_channel(1);
        let payload = payload.to_vec();
        self.runtime()?.spawn(async move {
            let _ = tx.send(service.call(payload).await);
        });

        rx.recv()
            .map_err(|_| BridgeError::native(command, "command service stopped without replying"))?
    }

    /// Blocks the calling thread, which must not be inside a tokio runtime.
    fn run_loop(&self, handle: &BridgeHandle, inbound: &dyn InboundSink) -> BridgeResult<()> {
        self.check_handle("run_loop", handle)?;
        if Handle::try_current().is_ok() {
            return Err(BridgeError::LoopUnavailable(
                "run_loop cannot block inside an async runtime".into(),
            ));
        }
        let runtime = self.runtime()?;
        let mut rx = self
            .events
            .lock()
            .take()
            .ok_or_else(|| BridgeError::LoopUnavailable("event loop already started".into()))?;

        let watcher = self.watch_ctrl_c(runtime);
        let result = self.drain(runtime, &mut rx, inbound);
        if let Some(watcher) = watcher {
            watcher.abort();
        }

        let delivered = result?;
        debug!(delivered, "Channel runtime event loop drained");
        Ok(())
    }
}

impl Drop for ChannelRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for ChannelRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut commands: Vec<_> = self.services.keys().collect();
        commands.sort();
        f.debug_struct("ChannelRuntime")
            .field("commands", &commands)
            .field("handle", &self.handle.get())
            .field("cancelled", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`ChannelRuntime`].
#[must_use]
pub struct ChannelRuntimeBuilder {
    worker_threads: Option<usize>,
    thread_name: String,
    codec: Arc<dyn Codec>,
    services: HashMap<String, Arc<dyn CommandService>>,
    ctrl_c: bool,
}

impl Default for ChannelRuntimeBuilder {
    fn default() -> Self {
        Self::from_config(&NativeConfig::default())
    }
}

impl ChannelRuntimeBuilder {
    pub fn from_config(config: &NativeConfig) -> Self {
        Self {
            worker_threads: config.worker_threads,
            thread_name: config.thread_name.clone(),
            codec: Arc::new(JsonCodec),
            services: HashMap::new(),
            ctrl_c: false,
        }
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Codec used by [`EventSender::push_event`]. Defaults to JSON.
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Registers the service answering `command`, replacing any earlier one.
    pub fn service(
        mut self,
        command: impl Into<String>,
        service: impl CommandService + 'static,
    ) -> Self {
        let command = command.into();
        if self
            .services
            .insert(command.clone(), Arc::new(service))
            .is_some()
        {
            warn!(command = %command, "Replacing command service");
        }
        self
    }

    /// End the event loop on Ctrl+C.
    pub fn shutdown_on_ctrl_c(mut self, enabled: bool) -> Self {
        self.ctrl_c = enabled;
        self
    }

    /// Starts the worker pool and returns the runtime with its event feed.
    pub fn build(self) -> RuntimeResult<(ChannelRuntime, EventSender)> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name(self.thread_name);
        if let Some(threads) = self.worker_threads {
            builder.worker_threads(threads);
        }
        let runtime = builder.build()?;

        let (tx, rx) = unbounded_channel();
        let sender = EventSender {
            tx,
            codec: self.codec,
        };
        let native = ChannelRuntime {
            runtime: Some(runtime),
            services: self.services,
            events: Mutex::new(Some(rx)),
            shutdown: CancellationToken::new(),
            ctrl_c: self.ctrl_c,
            handshaken: AtomicBool::new(false),
            handle: OnceLock::new(),
        };
        Ok((native, sender))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    use rivet_core::{CodecError, DispatchOutcome, InboundError, LoginEvent};

    use super::*;

    struct CountingSink(AtomicUsize);

    impl InboundSink for CountingSink {
        fn deliver(&self, _: EventKind, _: &[u8]) -> Result<DispatchOutcome, InboundError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(DispatchOutcome::Unhandled)
        }
    }

    struct AbortingSink;

    impl InboundSink for AbortingSink {
        fn deliver(&self, kind: EventKind, _: &[u8]) -> Result<DispatchOutcome, InboundError> {
            Err(InboundError::Aborted {
                kind,
                source: CodecError::decode(kind.as_str(), "bad bytes"),
            })
        }
    }

    struct SlowSink(Duration);

    impl InboundSink for SlowSink {
        fn deliver(&self, _: EventKind, _: &[u8]) -> Result<DispatchOutcome, InboundError> {
            std::thread::sleep(self.0);
            Ok(DispatchOutcome::Unhandled)
        }
    }

    fn echo_runtime() -> (ChannelRuntime, EventSender) {
        ChannelRuntime::builder()
            .worker_threads(1)
            .service("Reverse", |mut payload: Vec<u8>| async move {
                payload.reverse();
                Ok::<_, BridgeError>(payload)
            })
            .build()
            .unwrap()
    }

    #[test]
    fn routes_commands_to_services() {
        let (native, _events) = echo_runtime();
        let handle = native.handshake().unwrap();

        assert_eq!(native.send(&handle, "Reverse", b"abc").unwrap(), b"cba");
        assert!(matches!(
            native.send(&handle, "Missing", b""),
            Err(BridgeError::UnknownCommand(ref name)) if name == "Missing"
        ));
    }

    #[test]
    fn rejects_foreign_handles_and_second_handshake() {
        let (native, _events) = echo_runtime();
        let handle = native.handshake().unwrap();
        assert!(matches!(
            native.handshake(),
            Err(BridgeError::Config(ConfigError::DuplicateHandshake))
        ));

        let foreign = BridgeHandle {
            client: RawHandle::new(0),
            ..handle
        };
        assert!(matches!(
            native.send(&foreign, "Reverse", b""),
            Err(BridgeError::Native { .. })
        ));
    }

    #[test]
    fn loop_drains_until_senders_drop() {
        let (native, events) = echo_runtime();
        let handle = native.handshake().unwrap();

        events
            .push_event(&Event::Login(LoginEvent { uid: 1 }))
            .unwrap();
        events.push(EventKind::Login, b"raw".to_vec()).unwrap();
        let late = events.clone();
        drop(events);
        drop(late);

        let sink = CountingSink(AtomicUsize::new(0));
        native.run_loop(&handle, &sink).unwrap();
        assert_eq!(sink.0.load(Ordering::SeqCst), 2);

        assert!(matches!(
            native.run_loop(&handle, &sink),
            Err(BridgeError::LoopUnavailable(_))
        ));
    }

    #[test]
    fn push_fails_after_loop_ends() {
        let (native, events) = echo_runtime();
        let handle = native.handshake().unwrap();
        native.shutdown();

        native
            .run_loop(&handle, &CountingSink(AtomicUsize::new(0)))
            .unwrap();
        assert!(events.is_closed());
        assert!(matches!(
            events.push(EventKind::Login, Vec::new()),
            Err(BridgeError::LoopUnavailable(_))
        ));
    }

    #[test]
    fn cancellation_stops_a_live_loop() {
        let (native, events) = echo_runtime();
        let handle = native.handshake().unwrap();
        let token = native.shutdown_token();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(std::time::Duration::from_millis(50));
                token.cancel();
            });
            native
                .run_loop(&handle, &CountingSink(AtomicUsize::new(0)))
                .unwrap();
        });
        drop(events);
    }

    #[test]
    fn fatal_inbound_error_aborts_loop() {
        let (native, events) = echo_runtime();
        let handle = native.handshake().unwrap();
        events.push(EventKind::GroupMessage, b"[".to_vec()).unwrap();

        let err = native.run_loop(&handle, &AbortingSink).unwrap_err();
        assert!(matches!(err, BridgeError::Aborted(_)));
    }

    #[test]
    fn run_loop_before_handshake_is_rejected() {
        let (native, _events) = echo_runtime();
        let handle = BridgeHandle {
            environment: RawHandle::new(0),
            runtime: RawHandle::new(0),
            client: RawHandle::new(0),
        };
        assert!(matches!(
            native.run_loop(&handle, &AbortingSink),
            Err(BridgeError::HandshakeIncomplete { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn ctrl_c_during_delivery_ends_loop() {
        let (native, events) = ChannelRuntime::builder()
            .worker_threads(1)
            .shutdown_on_ctrl_c(true)
            .build()
            .unwrap();
        let handle = native.handshake().unwrap();
        events.push(EventKind::Login, Vec::new()).unwrap();
        let token = native.shutdown_token();
        let started = Instant::now();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(150));
                std::process::Command::new("kill")
                    .args(["-INT", &std::process::id().to_string()])
                    .status()
                    .unwrap();
            });
            let watchdog = token.clone();
            scope.spawn(move || {
                while !watchdog.is_cancelled() && started.elapsed() < Duration::from_secs(3) {
                    std::thread::sleep(Duration::from_millis(10));
                }
                watchdog.cancel();
            });

            native
                .run_loop(&handle, &SlowSink(Duration::from_millis(400)))
                .unwrap();
            let elapsed = started.elapsed();
            token.cancel();
            assert!(
                elapsed < Duration::from_secs(2),
                "loop kept running for {elapsed:?} after Ctrl+C"
            );
        });
        // The sender stays alive so only the signal can end the loop.
        drop(events);
    }

    #[tokio::test]
    async fn run_loop_inside_async_context_is_rejected() {
        let (native, events) = echo_runtime();
        let handle = native.handshake().unwrap();
        events.push(EventKind::Login, Vec::new()).unwrap();

        assert!(matches!(
            native.run_loop(&handle, &CountingSink(AtomicUsize::new(0))),
            Err(BridgeError::LoopUnavailable(_))
        ));
    }
}

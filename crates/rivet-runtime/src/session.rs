//! Session lifecycle.
//!
//! A [`Session`] owns everything one native session needs: the bridge, the
//! outbound [`Client`], and the frozen handler registry behind a
//! [`Dispatcher`]. Building it runs every module factory and freezes the
//! registry; running it performs the handshake and hands the calling thread
//! to the native event loop.
//!
//! ```text
//!  build()                 run()
//! ─────────► Unstarted ──► Handshaking ──► Running ──► Terminated
//!                               │                          ▲
//!                               └──── handshake failed ────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rivet_runtime::{ChannelRuntime, Session, load_config};
//!
//! let config = load_config()?;
//! let (native, events) = ChannelRuntime::builder().build()?;
//!
//! let session = Session::builder(Arc::new(native))
//!     .config(&config)
//!     .discover_modules()
//!     .build()?;
//! session.run()?;
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rivet_core::{
    Client, Codec, ConfigError, DecodeFailurePolicy, EventDispatcher, JsonCodec, NativeBridge,
    NativeRuntime,
};
use rivet_framework::{Dispatcher, Module, ModuleContext, ModuleFactory, Registry};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::RivetConfig;
use crate::error::RuntimeResult;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Built, registry frozen, no handshake yet.
    Unstarted,
    Handshaking,
    /// The native event loop owns the thread that called [`Session::run`].
    Running,
    /// The loop returned or the handshake failed. Terminal.
    Terminated,
}

impl SessionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::Handshaking => "handshaking",
            Self::Running => "running",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Session
// =============================================================================

/// One bot session over a native runtime.
pub struct Session {
    bridge: Arc<NativeBridge>,
    client: Client,
    dispatcher: Dispatcher,
    decode_failure: DecodeFailurePolicy,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn builder(native: Arc<dyn NativeRuntime>) -> SessionBuilder {
        SessionBuilder::new(native)
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Outbound client shared with every module.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.dispatcher.registry()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn bridge(&self) -> &Arc<NativeBridge> {
        &self.bridge
    }

    /// Performs the handshake and runs the native event loop on the calling
    /// thread until the session ends.
    ///
    /// A session runs once; calling this again is
    /// [`ConfigError::AlreadyStarted`].
    ///
    /// Call it from a plain thread. A native runtime that blocks, such as
    /// [`ChannelRuntime`](crate::ChannelRuntime), refuses to start its loop
    /// on a thread already driving a tokio runtime.
    pub fn run(&self) -> RuntimeResult<()> {
        {
            let mut state = self.state.lock();
            let current = *state;
            if current != SessionState::Unstarted {
                warn!(state = %current, "Session already started");
                return Err(ConfigError::AlreadyStarted.into());
            }
            *state = SessionState::Handshaking;
        }
        debug!(state = %SessionState::Handshaking, "Session state changed");

        if let Err(e) = self.bridge.handshake() {
            error!(error = %e, "Native handshake failed");
            self.transition(SessionState::Terminated);
            return Err(e.into());
        }
        self.transition(SessionState::Running);

        let dispatcher: Arc<dyn EventDispatcher> = Arc::new(self.dispatcher.clone());
        let inbound = self.bridge.inbound(dispatcher, self.decode_failure);
        let result = self.bridge.run_loop(&inbound);

        self.transition(SessionState::Terminated);
        info!("Session terminated");
        result.map_err(Into::into)
    }

    fn transition(&self, to: SessionState) {
        *self.state.lock() = to;
        debug!(state = %to, "Session state changed");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("bridge", &self.bridge)
            .field("handlers", &self.registry().handler_count())
            .field("decode_failure", &self.decode_failure)
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

enum PendingModule {
    Factory(ModuleFactory),
    Built(Module),
}

impl PendingModule {
    fn id(&self) -> &str {
        match self {
            Self::Factory(factory) => factory.id,
            Self::Built(module) => module.id(),
        }
    }
}

/// Builder for [`Session`].
///
/// Modules are constructed in the order they were added. Ties in priority
/// keep that order in the registry.
#[must_use]
pub struct SessionBuilder {
    native: Arc<dyn NativeRuntime>,
    codec: Arc<dyn Codec>,
    send_timeout: Option<Duration>,
    decode_failure: DecodeFailurePolicy,
    module_configs: HashMap<String, Value>,
    pending: Vec<PendingModule>,
}

impl SessionBuilder {
    pub fn new(native: Arc<dyn NativeRuntime>) -> Self {
        Self {
            native,
            codec: Arc::new(JsonCodec),
            send_timeout: None,
            decode_failure: DecodeFailurePolicy::default(),
            module_configs: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Payload codec for both directions. Defaults to JSON.
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Applies the `session` and `modules` sections.
    pub fn config(mut self, config: &RivetConfig) -> Self {
        self.send_timeout = config.session.send_timeout();
        self.decode_failure = config.session.decode_failure;
        self.module_configs.clone_from(&config.modules);
        self
    }

    pub fn send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn decode_failure(mut self, policy: DecodeFailurePolicy) -> Self {
        self.decode_failure = policy;
        self
    }

    /// Adds a module factory. Factories whose id is already queued are skipped.
    pub fn module(mut self, factory: ModuleFactory) -> Self {
        self.push(PendingModule::Factory(factory));
        self
    }

    pub fn modules(mut self, factories: impl IntoIterator<Item = ModuleFactory>) -> Self {
        for factory in factories {
            self.push(PendingModule::Factory(factory));
        }
        self
    }

    /// Adds a module that is already constructed.
    pub fn prebuilt(mut self, module: Module) -> Self {
        self.push(PendingModule::Built(module));
        self
    }

    /// Adds every module registered with `#[register_module]`.
    pub fn discover_modules(self) -> Self {
        let discovered = rivet_framework::discovered_modules();
        debug!(count = discovered.len(), "Discovered modules");
        self.modules(discovered)
    }

    fn push(&mut self, module: PendingModule) {
        if self.pending.iter().any(|p| p.id() == module.id()) {
            warn!(module = module.id(), "Module already added, ignoring");
            return;
        }
        self.pending.push(module);
    }

    /// Constructs every module and freezes the handler registry.
    ///
    /// The first module construction or registration error aborts the build,
    /// as do two modules sharing an id.
    pub fn build(self) -> RuntimeResult<Session> {
        let bridge = Arc::new(
            NativeBridge::new(self.native, self.codec).with_send_timeout(self.send_timeout),
        );
        let client = Client::new(Arc::clone(&bridge));

        let mut modules: Vec<Module> = Vec::with_capacity(self.pending.len());
        // Config sections are keyed by factory id, which may differ from the
        // id of the module the factory builds.
        let mut sections: HashSet<String> = HashSet::new();
        for pending in self.pending {
            sections.insert(pending.id().to_string());
            let module = match pending {
                PendingModule::Factory(factory) => {
                    let config = self.module_configs.get(factory.id).cloned();
                    let ctx = ModuleContext::new(factory.id, client.clone(), config);
                    let module = factory.instantiate(&ctx).inspect_err(|e| {
                        error!(module = factory.id, error = %e, "Failed to construct module");
                    })?;
                    if module.id() != factory.id {
                        debug!(
                            factory = factory.id,
                            module = module.id(),
                            "Factory built a module under another id"
                        );
                    }
                    module
                }
                PendingModule::Built(module) => module,
            };
            if modules.iter().any(|m| m.id() == module.id()) {
                error!(module = module.id(), "Module id is already taken");
                return Err(ConfigError::DuplicateModule {
                    id: module.id().to_string(),
                }
                .into());
            }
            debug!(
                module = module.id(),
                name = module.name(),
                priority = module.priority(),
                handlers = module.handlers().len(),
                "Module constructed"
            );
            modules.push(module);
        }

        for section in self.module_configs.keys() {
            if !sections.contains(section) {
                warn!(module = %section, "Config section has no matching module");
            }
        }

        let registry = Registry::build(&modules).inspect_err(|e| {
            error!(error = %e, "Failed to build handler registry");
        })?;
        info!(
            modules = modules.len(),
            handlers = registry.handler_count(),
            "Handler registry frozen"
        );

        Ok(Session {
            bridge,
            client,
            dispatcher: Dispatcher::new(Arc::new(registry)),
            decode_failure: self.decode_failure,
            state: Mutex::new(SessionState::Unstarted),
        })
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<_> = self.pending.iter().map(PendingModule::id).collect();
        f.debug_struct("SessionBuilder")
            .field("modules", &ids)
            .field("send_timeout", &self.send_timeout)
            .field("decode_failure", &self.decode_failure)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rivet_core::{
        BridgeError, Command, ConfigResult, Event, EventKind, FriendMessageEvent, LoginEvent,
        MessageElement, Outcome,
    };
    use rivet_framework::{HandlerDescriptor, OutputShape, Signature};
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::error::RuntimeError;
    use crate::native::{ChannelRuntime, EventSender};

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct EchoConfig {
        prefix: String,
    }

    fn echo_module(ctx: &ModuleContext) -> ConfigResult<Module> {
        let config: EchoConfig = ctx.config()?;
        let client = ctx.client().clone();
        Ok(Module::builder("echo")
            .on("echo", move |event: &FriendMessageEvent| {
                let reply = format!("{}{}", config.prefix, event.plain_text());
                client
                    .send_friend_message(event.from_uin, reply)
                    .map(|()| true)
            })
            .build())
    }

    type Sent = Arc<Mutex<Vec<Vec<u8>>>>;

    fn channel_runtime() -> (Arc<ChannelRuntime>, EventSender, Sent) {
        let sent: Sent = Arc::default();
        let recorder = Arc::clone(&sent);
        let (native, events) = ChannelRuntime::builder()
            .worker_threads(1)
            .service(Command::SEND_FRIEND_MESSAGE, move |payload: Vec<u8>| {
                let recorder = Arc::clone(&recorder);
                async move {
                    recorder.lock().push(payload);
                    Ok::<_, BridgeError>(Vec::new())
                }
            })
            .build()
            .unwrap();
        (Arc::new(native), events, sent)
    }

    fn friend_message(from_uin: i64, text: &str) -> Event {
        Event::FriendMessage(FriendMessageEvent {
            from_uin,
            elements: vec![MessageElement::text(text)],
            ..Default::default()
        })
    }

    fn decode_sent(bytes: &[u8]) -> (i64, String) {
        match JsonCodec.decode_command(Command::SEND_FRIEND_MESSAGE, bytes).unwrap() {
            Command::SendFriendMessage(msg) => {
                let text = msg
                    .elements
                    .iter()
                    .filter_map(|e| match e {
                        MessageElement::Text { content } => Some(content.as_str()),
                        _ => None,
                    })
                    .collect();
                (msg.target, text)
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn handler_reply_reaches_native_service() {
        let (native, events, sent) = channel_runtime();
        let session = Session::builder(native)
            .module(ModuleFactory::new("echo", echo_module))
            .build()
            .unwrap();
        assert_eq!(session.state(), SessionState::Unstarted);
        assert!(session.registry().is_registered(EventKind::FriendMessage));

        events.push_event(&friend_message(12345, "hello")).unwrap();
        drop(events);

        session.run().unwrap();
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(session.bridge().is_connected());

        let sent = sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(decode_sent(&sent[0]), (12345, "hello".to_string()));
    }

    #[test]
    fn module_config_section_reaches_factory() {
        let (native, events, sent) = channel_runtime();
        let mut config = RivetConfig::default();
        config
            .modules
            .insert("echo".into(), json!({ "prefix": "> " }));

        let session = Session::builder(native)
            .config(&config)
            .module(ModuleFactory::new("echo", echo_module))
            .build()
            .unwrap();
        events.push_event(&friend_message(7, "hi")).unwrap();
        drop(events);
        session.run().unwrap();

        assert_eq!(decode_sent(&sent.lock()[0]), (7, "> hi".to_string()));
    }

    #[test]
    fn invalid_module_config_fails_build() {
        let (native, _events, _) = channel_runtime();
        let mut config = RivetConfig::default();
        config.modules.insert("echo".into(), json!({ "prefix": 5 }));

        let err = Session::builder(native)
            .config(&config)
            .module(ModuleFactory::new("echo", echo_module))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Config(ConfigError::ModuleConfig { ref module, .. }) if module == "echo"
        ));
    }

    #[test]
    fn session_runs_once() {
        let (native, events, _) = channel_runtime();
        let session = Session::builder(native).build().unwrap();
        drop(events);

        session.run().unwrap();
        assert!(matches!(
            session.run(),
            Err(RuntimeError::Config(ConfigError::AlreadyStarted))
        ));
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[test]
    fn failed_handshake_terminates() {
        let (native, _events, _) = channel_runtime();
        // Consume the runtime's only handshake up front.
        native.handshake().unwrap();

        let session = Session::builder(native).build().unwrap();
        assert!(matches!(
            session.run(),
            Err(RuntimeError::Bridge(BridgeError::Config(
                ConfigError::DuplicateHandshake
            )))
        ));
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[test]
    fn abort_policy_stops_on_undecodable_event() {
        let (native, events, _) = channel_runtime();
        let session = Session::builder(native)
            .decode_failure(DecodeFailurePolicy::Abort)
            .prebuilt(
                Module::builder("log")
                    .on("login", |_: &LoginEvent| false)
                    .build(),
            )
            .build()
            .unwrap();

        events.push(EventKind::Login, b"not json".to_vec()).unwrap();
        assert!(matches!(
            session.run(),
            Err(RuntimeError::Bridge(BridgeError::Aborted(_)))
        ));
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[test]
    fn duplicate_module_ids_are_skipped() {
        let (native, _events, _) = channel_runtime();
        let session = Session::builder(native)
            .module(ModuleFactory::new("echo", echo_module))
            .module(ModuleFactory::new("echo", echo_module))
            .build()
            .unwrap();
        assert_eq!(session.registry().handler_count(), 1);
    }

    #[test]
    fn factory_id_keys_its_config_section() {
        let (native, events, sent) = channel_runtime();
        let mut config = RivetConfig::default();
        config
            .modules
            .insert("greeter".into(), json!({ "prefix": "hey " }));

        let session = Session::builder(native)
            .config(&config)
            .module(ModuleFactory::new("greeter", echo_module))
            .build()
            .unwrap();
        assert_eq!(session.registry().handler_count(), 1);

        events.push_event(&friend_message(9, "there")).unwrap();
        drop(events);
        session.run().unwrap();
        assert_eq!(decode_sent(&sent.lock()[0]), (9, "hey there".to_string()));
    }

    #[test]
    fn factories_building_the_same_module_id_fail_build() {
        let (native, _events, _) = channel_runtime();
        let err = Session::builder(native)
            .module(ModuleFactory::new("echo", echo_module))
            .module(ModuleFactory::new("greeter", echo_module))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Config(ConfigError::DuplicateModule { ref id }) if id == "echo"
        ));
    }

    #[test]
    fn malformed_prebuilt_handler_fails_build() {
        let (native, _events, _) = channel_runtime();
        let bad = Module::builder("bad")
            .handler(HandlerDescriptor::raw(
                "two_inputs",
                Signature {
                    inputs: vec![EventKind::Login, EventKind::Login],
                    output: OutputShape::Outcome,
                },
                |_| Ok(Outcome::Handled),
            ))
            .build();

        let err = Session::builder(native).prebuilt(bad).build().unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Config(ConfigError::MalformedHandler { ref module, ref handler, .. })
                if module == "bad" && handler == "two_inputs"
        ));
    }
}

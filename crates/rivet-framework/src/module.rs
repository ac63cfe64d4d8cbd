//! Modules: units of handler ownership.
//!
//! A [`Module`] is built once at startup by a [`ModuleFactory`], which gets a
//! [`ModuleContext`] with the outbound [`Client`] and the module's
//! configuration section. Factories are either handed to the session
//! explicitly or registered at compile time into [`MODULE_REGISTRY`] with the
//! `#[register_module]` attribute.
//!
//! # Example
//!
//! ```rust,ignore
//! use rivet::prelude::*;
//!
//! #[register_module]
//! fn echo(ctx: &ModuleContext) -> ConfigResult<Module> {
//!     let client = ctx.client().clone();
//!     Ok(Module::builder("echo")
//!         .priority(10)
//!         .on("echo_friend", move |msg: &FriendMessageEvent| {
//!             client.send_friend_message(msg.from_uin, msg.plain_text())?;
//!             Ok::<_, BridgeError>(true)
//!         })
//!         .build())
//! }
//! ```

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use linkme::distributed_slice;
use rivet_core::{Client, ConfigError, ConfigResult, EventPayload};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::handler::{HandlerDescriptor, IntoOutcome};

// ─── Module ──────────────────────────────────────────────────────────────────

/// A handler-owning unit with an ordering priority.
pub struct Module {
    id: Cow<'static, str>,
    name: Option<Cow<'static, str>>,
    priority: i32,
    handlers: Vec<HandlerDescriptor>,
}

impl Module {
    /// Starts building a module with priority 0 and no handlers.
    pub fn builder(id: impl Into<Cow<'static, str>>) -> ModuleBuilder {
        ModuleBuilder {
            module: Module {
                id: id.into(),
                name: None,
                priority: 0,
                handlers: Vec::new(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name, falling back to the id.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Handlers in declaration order.
    pub fn handlers(&self) -> &[HandlerDescriptor] {
        &self.handlers
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

/// Builder for [`Module`].
#[must_use]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.module.name = Some(name.into());
        self
    }

    /// Lower runs first. Defaults to 0.
    pub fn priority(mut self, priority: i32) -> Self {
        self.module.priority = priority;
        self
    }

    pub fn handler(mut self, handler: HandlerDescriptor) -> Self {
        self.module.handlers.push(handler);
        self
    }

    /// Adds a typed handler with priority 0.
    pub fn on<E, R, F>(self, name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        E: EventPayload,
        R: IntoOutcome,
        F: Fn(&E) -> R + Send + Sync + 'static,
    {
        self.handler(HandlerDescriptor::on(name, f))
    }

    pub fn build(self) -> Module {
        self.module
    }
}

// ─── ModuleContext ───────────────────────────────────────────────────────────

/// What a [`ModuleFactory`] gets to build its module.
#[derive(Clone, Debug)]
pub struct ModuleContext {
    module_id: &'static str,
    client: Client,
    /// Raw JSON value for this module's config section.
    config: Arc<Value>,
}

impl ModuleContext {
    /// `config` is the module's section, or `None` for an empty object.
    pub fn new(module_id: &'static str, client: Client, config: Option<Value>) -> Self {
        Self {
            module_id,
            client,
            config: Arc::new(config.unwrap_or_else(|| Value::Object(Map::default()))),
        }
    }

    /// Id of the factory being run, also the config section key.
    pub fn module_id(&self) -> &'static str {
        self.module_id
    }

    /// Outbound client. Usable once the session has completed its handshake.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn raw_config(&self) -> &Value {
        &self.config
    }

    /// Deserialise the module config section into `T`.
    ///
    /// Use `#[serde(default)]` on the struct to make every field optional.
    pub fn config<T>(&self) -> ConfigResult<T>
    where
        T: DeserializeOwned,
    {
        T::deserialize(self.config.as_ref()).map_err(|e| ConfigError::ModuleConfig {
            module: self.module_id.to_string(),
            reason: e.to_string(),
        })
    }
}

// ─── ModuleFactory ───────────────────────────────────────────────────────────

/// Signature of a module constructor.
pub type CreateModuleFn = fn(&ModuleContext) -> ConfigResult<Module>;

/// A static, `Copy` handle that identifies and constructs a module.
#[derive(Clone, Copy)]
pub struct ModuleFactory {
    /// Config section key and discovery identity.
    pub id: &'static str,
    pub create: CreateModuleFn,
}

impl ModuleFactory {
    pub const fn new(id: &'static str, create: CreateModuleFn) -> Self {
        Self { id, create }
    }

    #[inline]
    pub fn instantiate(&self, ctx: &ModuleContext) -> ConfigResult<Module> {
        (self.create)(ctx)
    }
}

impl fmt::Debug for ModuleFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleFactory")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// ─── Compile-time registry ───────────────────────────────────────────────────

/// Module factories registered with `#[register_module]` across the binary.
#[distributed_slice]
pub static MODULE_REGISTRY: [ModuleFactory];

/// Returns every registered factory, sorted by id.
///
/// Link order is not stable across builds, so ids give discovery a
/// deterministic order. Repeated ids keep their first entry.
pub fn discovered_modules() -> Vec<ModuleFactory> {
    let mut factories: Vec<ModuleFactory> = MODULE_REGISTRY.iter().copied().collect();
    factories.sort_by_key(|factory| factory.id);

    let mut seen = HashSet::new();
    factories.retain(|factory| {
        let fresh = seen.insert(factory.id);
        if !fresh {
            warn!(module = factory.id, "Module registered more than once, ignoring duplicate");
        }
        fresh
    });
    factories
}

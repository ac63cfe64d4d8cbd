//! The handler registry.
//!
//! [`RegistryBuilder::register`] runs once per [`EventKind`] over the complete
//! set of constructed modules and produces that kind's ordered handler list.
//! [`RegistryBuilder::freeze`] turns the collected lists into a read-only
//! [`Registry`]; there is no API to add or remove handlers afterwards.
//!
//! # Ordering
//!
//! Handlers are sorted by `(module priority, handler priority)` ascending.
//! The sort is stable, so ties keep discovery order: modules in the order they
//! were passed in, handlers in the order their module declared them.
//!
//! # Validation
//!
//! Every handler of every module is shape-checked on every `register` call,
//! not only the ones for the kind being registered. The first malformed
//! handler aborts with [`ConfigError::MalformedHandler`] and nothing is stored
//! for that kind.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rivet_core::{BoxError, ConfigError, ConfigResult, Event, EventKind, Outcome};
use tracing::{debug, info};

use crate::handler::HandlerFn;
use crate::module::Module;

// =============================================================================
// BoundHandler
// =============================================================================

/// A validated handler filed under one kind.
#[derive(Clone)]
pub struct BoundHandler {
    module: Arc<str>,
    handler: Arc<str>,
    module_priority: i32,
    priority: i32,
    callable: HandlerFn,
}

impl BoundHandler {
    pub fn module(&self) -> &Arc<str> {
        &self.module
    }

    pub fn handler(&self) -> &Arc<str> {
        &self.handler
    }

    pub fn module_priority(&self) -> i32 {
        self.module_priority
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Runs the handler body.
    pub fn call(&self, event: &Event) -> Result<Outcome, BoxError> {
        (self.callable)(event)
    }
}

impl fmt::Debug for BoundHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("module", &self.module)
            .field("handler", &self.handler)
            .field("module_priority", &self.module_priority)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RegistryBuilder
// =============================================================================

/// Collects handler lists during startup. Single-threaded by construction:
/// `register` takes `&mut self`.
#[derive(Default)]
pub struct RegistryBuilder {
    lists: HashMap<EventKind, Arc<[BoundHandler]>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the ordered handler list for `kind` from `modules`.
    ///
    /// Returns the number of handlers bound.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DuplicateRegistration`] if `kind` was already
    ///   registered. The existing list is left intact.
    /// - [`ConfigError::MalformedHandler`] for the first handler, in any
    ///   module, whose shape is wrong.
    pub fn register(&mut self, kind: EventKind, modules: &[Module]) -> ConfigResult<usize> {
        if self.lists.contains_key(&kind) {
            return Err(ConfigError::DuplicateRegistration { kind });
        }

        let mut bound = Vec::new();
        for module in modules {
            let module_id: Arc<str> = Arc::from(module.id());
            for descriptor in module.handlers() {
                let handled = descriptor
                    .signature()
                    .validate()
                    .map_err(|reason| ConfigError::malformed(module.id(), descriptor.name(), reason))?;

                if handled != kind {
                    continue;
                }

                bound.push(BoundHandler {
                    module: Arc::clone(&module_id),
                    handler: Arc::from(descriptor.name()),
                    module_priority: module.priority(),
                    priority: descriptor.get_priority(),
                    callable: Arc::clone(descriptor.callable()),
                });
            }
        }

        bound.sort_by_key(|h| (h.module_priority, h.priority));

        for h in &bound {
            info!(
                module = %h.module,
                handler = %h.handler,
                event = %kind,
                "Handler registered"
            );
        }

        let count = bound.len();
        self.lists.insert(kind, bound.into());
        debug!(event = %kind, handlers = count, "Event kind registered");
        Ok(count)
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.lists.contains_key(&kind)
    }

    /// Freezes the collected lists.
    pub fn freeze(self) -> Registry {
        Registry { lists: self.lists }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Read-only mapping from [`EventKind`] to its ordered handlers.
///
/// Safe to share between threads without locking.
pub struct Registry {
    lists: HashMap<EventKind, Arc<[BoundHandler]>>,
}

impl Registry {
    /// Registers every kind in [`EventKind::ALL`] once and freezes.
    /// Stops at the first configuration error.
    pub fn build(modules: &[Module]) -> ConfigResult<Self> {
        let mut builder = RegistryBuilder::new();
        for kind in EventKind::ALL {
            builder.register(kind, modules)?;
        }
        Ok(builder.freeze())
    }

    /// An empty registry with no registered kinds.
    pub fn empty() -> Self {
        Self {
            lists: HashMap::new(),
        }
    }

    /// The ordered handlers for `kind`, or `None` if it was never registered.
    pub fn handlers(&self, kind: EventKind) -> Option<&[BoundHandler]> {
        self.lists.get(&kind).map(|list| &**list)
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.lists.contains_key(&kind)
    }

    /// Registered kinds, in [`EventKind`] order.
    pub fn kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<_> = self.lists.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Total number of bound handlers across all kinds.
    pub fn handler_count(&self) -> usize {
        self.lists.values().map(|list| list.len()).sum()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.kinds())
            .field("handler_count", &self.handler_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerDescriptor, OutputShape, Signature};
    use rivet_core::{FriendMessageEvent, GroupMessageEvent, LoginEvent};

    fn names(registry: &Registry, kind: EventKind) -> Vec<String> {
        registry
            .handlers(kind)
            .unwrap()
            .iter()
            .map(|h| format!("{}::{}", h.module(), h.handler()))
            .collect()
    }

    #[test]
    fn orders_by_module_then_handler_priority() {
        let modules = vec![
            Module::builder("late")
                .priority(5)
                .on("a", |_: &LoginEvent| false)
                .build(),
            Module::builder("early")
                .priority(-1)
                .handler(HandlerDescriptor::on("b", |_: &LoginEvent| false).priority(2))
                .handler(HandlerDescriptor::on("c", |_: &LoginEvent| false).priority(1))
                .build(),
            Module::builder("middle")
                .on("d", |_: &LoginEvent| false)
                .build(),
        ];

        let registry = Registry::build(&modules).unwrap();
        assert_eq!(
            names(&registry, EventKind::Login),
            ["early::c", "early::b", "middle::d", "late::a"]
        );
    }

    #[test]
    fn ties_keep_discovery_order() {
        let modules = vec![
            Module::builder("m1")
                .on("x", |_: &FriendMessageEvent| false)
                .on("y", |_: &FriendMessageEvent| false)
                .build(),
            Module::builder("m2")
                .on("z", |_: &FriendMessageEvent| false)
                .build(),
        ];

        let registry = Registry::build(&modules).unwrap();
        assert_eq!(
            names(&registry, EventKind::FriendMessage),
            ["m1::x", "m1::y", "m2::z"]
        );
    }

    #[test]
    fn only_matching_kinds_are_bound() {
        let modules = vec![
            Module::builder("mixed")
                .on("login", |_: &LoginEvent| true)
                .on("group", |_: &GroupMessageEvent| true)
                .build(),
        ];

        let registry = Registry::build(&modules).unwrap();
        assert_eq!(names(&registry, EventKind::Login), ["mixed::login"]);
        assert_eq!(names(&registry, EventKind::GroupMessage), ["mixed::group"]);
        assert!(registry.handlers(EventKind::FriendMessage).unwrap().is_empty());
        assert_eq!(registry.handler_count(), 2);
    }

    #[test]
    fn duplicate_registration_keeps_first_list() {
        let modules = vec![
            Module::builder("log")
                .on("on_login", |_: &LoginEvent| true)
                .build(),
        ];

        let mut builder = RegistryBuilder::new();
        assert_eq!(builder.register(EventKind::Login, &modules), Ok(1));

        let err = builder.register(EventKind::Login, &[]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateRegistration {
                kind: EventKind::Login
            }
        );

        let registry = builder.freeze();
        assert_eq!(names(&registry, EventKind::Login), ["log::on_login"]);
    }

    #[test]
    fn malformed_handler_fails_every_kind() {
        let two_params = HandlerDescriptor::raw(
            "on_pair",
            Signature {
                inputs: vec![EventKind::Login, EventKind::GroupMessage],
                output: OutputShape::Outcome,
            },
            |_| Ok(Outcome::NotHandled),
        );
        let modules = vec![
            Module::builder("ok")
                .on("fine", |_: &FriendMessageEvent| true)
                .build(),
            Module::builder("broken").handler(two_params).build(),
        ];

        // Registering an unrelated kind still trips on the malformed member.
        let mut builder = RegistryBuilder::new();
        let err = builder
            .register(EventKind::FriendMessage, &modules)
            .unwrap_err();
        match err {
            ConfigError::MalformedHandler {
                module, handler, ..
            } => {
                assert_eq!(module, "broken");
                assert_eq!(handler, "on_pair");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!builder.is_registered(EventKind::FriendMessage));
    }

    #[test]
    fn non_outcome_return_fails_build() {
        let returns_string = HandlerDescriptor::raw(
            "describe",
            Signature {
                inputs: vec![EventKind::Login],
                output: OutputShape::Other("String".into()),
            },
            |_| Ok(Outcome::Handled),
        );
        let modules = vec![Module::builder("m").handler(returns_string).build()];

        assert!(matches!(
            Registry::build(&modules),
            Err(ConfigError::MalformedHandler { .. })
        ));
    }

    #[test]
    fn empty_registry_has_no_kinds() {
        let registry = Registry::empty();
        assert!(registry.kinds().is_empty());
        assert!(registry.handlers(EventKind::Login).is_none());
    }
}

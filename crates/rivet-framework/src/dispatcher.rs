//! Registry-backed event dispatch.
//!
//! [`Dispatcher`] implements [`EventDispatcher`]: for each incoming event it
//! looks up the frozen handler list for the event's kind and invokes the
//! handlers **sequentially** in registry order.
//!
//! | Handler result | Effect |
//! |---|---|
//! | `Outcome::Handled` | stop, [`DispatchOutcome::Handled`] |
//! | `Outcome::NotHandled` | continue with the next handler |
//! | `Err(_)` | stop, [`DispatchError::HandlerFailed`] |
//! | panic | stop, [`DispatchError::HandlerPanicked`] |
//!
//! Kinds that were never registered are a silent no-op
//! ([`DispatchOutcome::Unregistered`]).

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rivet_core::{DispatchError, DispatchOutcome, Event, EventDispatcher, Outcome};
use tracing::{Level, span, trace};

use crate::registry::Registry;

/// Routes events through a frozen [`Registry`].
///
/// Cloning is cheap and every clone shares the registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl EventDispatcher for Dispatcher {
    fn dispatch(&self, event: &Event) -> Result<DispatchOutcome, DispatchError> {
        let kind = event.kind();
        let Some(handlers) = self.registry.handlers(kind) else {
            trace!(event = %kind, "Event kind not registered, skipping");
            return Ok(DispatchOutcome::Unregistered);
        };

        let span = span!(Level::DEBUG, "dispatch", event = %kind);
        let _enter = span.enter();

        for bound in handlers {
            trace!(module = %bound.module(), handler = %bound.handler(), "Invoking handler");

            // Handlers run on the native loop thread; a panic must not unwind
            // across that boundary.
            match panic::catch_unwind(AssertUnwindSafe(|| bound.call(event))) {
                Ok(Ok(Outcome::Handled)) => {
                    return Ok(DispatchOutcome::Handled {
                        module: Arc::clone(bound.module()),
                        handler: Arc::clone(bound.handler()),
                    });
                }
                Ok(Ok(Outcome::NotHandled)) => {}
                Ok(Err(source)) => {
                    return Err(DispatchError::HandlerFailed {
                        module: bound.module().to_string(),
                        handler: bound.handler().to_string(),
                        source,
                    });
                }
                Err(payload) => {
                    return Err(DispatchError::HandlerPanicked {
                        module: bound.module().to_string(),
                        handler: bound.handler().to_string(),
                        message: panic_message(&*payload),
                    });
                }
            }
        }

        Ok(DispatchOutcome::Unhandled)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::module::Module;
    use crate::registry::RegistryBuilder;
    use rivet_core::{FriendMessageEvent, GroupMessageEvent, LoginEvent};

    fn dispatcher(modules: &[Module]) -> Dispatcher {
        Dispatcher::new(Arc::new(Registry::build(modules).unwrap()))
    }

    fn friend_message() -> Event {
        Event::FriendMessage(FriendMessageEvent {
            from_uin: 12345,
            ..Default::default()
        })
    }

    #[test]
    fn login_handled_by_single_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let modules = vec![
            Module::builder("m")
                .on("h1", move |_: &LoginEvent| {
                    c.fetch_add(1, Ordering::SeqCst);
                    true
                })
                .build(),
        ];

        let outcome = dispatcher(&modules)
            .dispatch(&Event::Login(LoginEvent { uid: 1 }))
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Handled {
                module: "m".into(),
                handler: "h1".into()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn propagation_continues_until_handled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (c1, c2) = (Arc::clone(&calls), Arc::clone(&calls));
        // Constructed in reverse to show priority wins over construction order.
        let modules = vec![
            Module::builder("m2")
                .priority(1)
                .on("consume", move |_: &FriendMessageEvent| {
                    c2.fetch_add(1, Ordering::SeqCst);
                    true
                })
                .build(),
            Module::builder("m1")
                .on("observe", move |_: &FriendMessageEvent| {
                    c1.fetch_add(1, Ordering::SeqCst);
                    false
                })
                .build(),
        ];

        let outcome = dispatcher(&modules).dispatch(&friend_message()).unwrap();
        assert!(matches!(outcome, DispatchOutcome::Handled { ref module, .. } if &**module == "m2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handled_stops_later_handlers() {
        let counter = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&counter);
        let modules = vec![
            Module::builder("m")
                .on("first", |_: &GroupMessageEvent| true)
                .on("second", move |_: &GroupMessageEvent| {
                    p.fetch_add(1, Ordering::SeqCst);
                    true
                })
                .build(),
        ];

        let event = Event::GroupMessage(GroupMessageEvent::default());
        dispatcher(&modules).dispatch(&event).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_chain_is_unhandled() {
        let modules = vec![Module::builder("m").on("l", |_: &LoginEvent| true).build()];
        let outcome = dispatcher(&modules).dispatch(&friend_message()).unwrap();
        assert_eq!(outcome, DispatchOutcome::Unhandled);
    }

    #[test]
    fn exhausted_chain_is_unhandled() {
        let modules = vec![
            Module::builder("m")
                .on("a", |_: &FriendMessageEvent| false)
                .on("b", |_: &FriendMessageEvent| Outcome::NotHandled)
                .build(),
        ];
        let outcome = dispatcher(&modules).dispatch(&friend_message()).unwrap();
        assert_eq!(outcome, DispatchOutcome::Unhandled);
    }

    #[test]
    fn unregistered_kind_is_a_no_op() {
        let mut builder = RegistryBuilder::new();
        builder.register(rivet_core::EventKind::Login, &[]).unwrap();
        let dispatcher = Dispatcher::new(Arc::new(builder.freeze()));

        let outcome = dispatcher.dispatch(&friend_message()).unwrap();
        assert_eq!(outcome, DispatchOutcome::Unregistered);
    }

    #[test]
    fn handler_error_stops_chain() {
        let counter = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&counter);
        let modules = vec![
            Module::builder("m")
                .on("fails", |_: &FriendMessageEvent| {
                    Err::<bool, _>("native send failed")
                })
                .on("after", move |_: &FriendMessageEvent| {
                    p.fetch_add(1, Ordering::SeqCst);
                    true
                })
                .build(),
        ];

        let err = dispatcher(&modules)
            .dispatch(&friend_message())
            .unwrap_err();
        assert!(matches!(err, DispatchError::HandlerFailed { .. }));
        assert_eq!(err.module(), "m");
        assert_eq!(err.handler(), "fails");
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_panic_is_contained() {
        let modules = vec![
            Module::builder("m")
                .on("explodes", |_: &LoginEvent| -> bool { panic!("kaboom") })
                .build(),
        ];
        let dispatcher = dispatcher(&modules);

        let err = dispatcher
            .dispatch(&Event::Login(LoginEvent::default()))
            .unwrap_err();
        match err {
            DispatchError::HandlerPanicked { message, .. } => assert_eq!(message, "kaboom"),
            other => panic!("unexpected error: {other:?}"),
        }

        // The dispatcher stays usable.
        assert!(
            dispatcher
                .dispatch(&Event::Login(LoginEvent::default()))
                .is_err()
        );
    }

    #[test]
    fn concurrent_dispatch_shares_registry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let modules = vec![
            Module::builder("m")
                .on("count", move |_: &FriendMessageEvent| {
                    c.fetch_add(1, Ordering::SeqCst);
                    true
                })
                .build(),
        ];
        let dispatcher = dispatcher(&modules);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let d = dispatcher.clone();
                scope.spawn(move || {
                    for _ in 0..25 {
                        d.dispatch(&friend_message()).unwrap();
                    }
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 100);
    }
}

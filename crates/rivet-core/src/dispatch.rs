//! Dispatch contract shared by the bridge and the framework.
//!
//! The bridge only needs *something* that routes a decoded [`Event`]; the
//! framework's registry-backed dispatcher is the standard implementation.

use std::sync::Arc;

use crate::error::DispatchError;
use crate::event::Event;

/// Result of a single handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The event is fully consumed; stop propagation.
    Handled,
    /// Let the next handler see the event.
    NotHandled,
}

impl Outcome {
    pub const fn is_handled(self) -> bool {
        matches!(self, Outcome::Handled)
    }
}

impl From<bool> for Outcome {
    fn from(handled: bool) -> Self {
        if handled {
            Outcome::Handled
        } else {
            Outcome::NotHandled
        }
    }
}

/// Result of dispatching one event through its handler chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler consumed the event; later handlers did not run.
    Handled { module: Arc<str>, handler: Arc<str> },
    /// Every handler ran and none consumed the event. Includes the empty chain.
    Unhandled,
    /// No handler list exists for the event's kind.
    Unregistered,
}

impl DispatchOutcome {
    pub const fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled { .. })
    }
}

/// Event dispatcher: routes a decoded event to its handlers.
///
/// Implementations must be safe to call from several threads at once. The
/// handlers for a single event always run sequentially.
///
/// Use `Arc<dyn EventDispatcher>` to pass a dispatcher through the bridge.
pub trait EventDispatcher: Send + Sync {
    /// Routes `event` through its handler chain.
    fn dispatch(&self, event: &Event) -> Result<DispatchOutcome, DispatchError>;
}

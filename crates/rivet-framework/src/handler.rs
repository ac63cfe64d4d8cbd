//! Handler descriptors.
//!
//! A handler is a `(name, signature, priority, callable)` binding owned by a
//! [`Module`](crate::Module). The typed constructor [`HandlerDescriptor::on`]
//! derives the signature from the payload type, so it is always well formed.
//! [`HandlerDescriptor::raw`] accepts a declared signature as-is; descriptors
//! produced by external wiring go through it and are shape-checked when the
//! registry is built.
//!
//! # Example
//!
//! ```rust,ignore
//! use rivet_framework::HandlerDescriptor;
//! use rivet_core::FriendMessageEvent;
//!
//! let greet = HandlerDescriptor::on("greet", |msg: &FriendMessageEvent| {
//!     msg.plain_text() == "hi"
//! })
//! .priority(-1);
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use rivet_core::{BoxError, Event, EventKind, EventPayload, Outcome};

// ─── Return values ───────────────────────────────────────────────────────────

/// Values a handler body may return.
///
/// `bool` keeps the `true` = handled convention; `Result` lets handlers use
/// `?` on fallible work such as outbound sends.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<Outcome, BoxError>;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        Ok(self)
    }
}

impl IntoOutcome for bool {
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        Ok(Outcome::from(self))
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        match self {
            Ok(value) => value.into_outcome(),
            Err(e) => Err(e.into()),
        }
    }
}

// ─── Signature ───────────────────────────────────────────────────────────────

/// Declared return shape of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputShape {
    /// Returns an [`Outcome`] (or something convertible into one).
    Outcome,
    /// Returns some other type, named for diagnostics.
    Other(Cow<'static, str>),
}

/// Declared shape of a handler: its inputs and its return.
///
/// A well-formed handler takes exactly one event payload and returns an
/// [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub inputs: Vec<EventKind>,
    pub output: OutputShape,
}

impl Signature {
    /// The well-formed shape for a handler of `kind`.
    pub fn unary(kind: EventKind) -> Self {
        Self {
            inputs: vec![kind],
            output: OutputShape::Outcome,
        }
    }

    /// Returns the handled kind, or why the shape is rejected.
    pub fn validate(&self) -> Result<EventKind, String> {
        let kind = match self.inputs.as_slice() {
            [kind] => *kind,
            inputs => {
                return Err(format!(
                    "expected exactly one event parameter, found {}",
                    inputs.len()
                ));
            }
        };
        match &self.output {
            OutputShape::Outcome => Ok(kind),
            OutputShape::Other(ty) => Err(format!("expected an Outcome return, found `{ty}`")),
        }
    }
}

// ─── HandlerDescriptor ───────────────────────────────────────────────────────

/// Type-erased handler body.
pub type HandlerFn = Arc<dyn Fn(&Event) -> Result<Outcome, BoxError> + Send + Sync>;

/// A handler binding as declared by its module.
#[derive(Clone)]
pub struct HandlerDescriptor {
    name: Cow<'static, str>,
    priority: i32,
    signature: Signature,
    callable: HandlerFn,
}

impl HandlerDescriptor {
    /// Creates a handler for the payload type `E`.
    ///
    /// The handler only ever sees events of `E::KIND`.
    pub fn on<E, R, F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        E: EventPayload,
        R: IntoOutcome,
        F: Fn(&E) -> R + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            priority: 0,
            signature: Signature::unary(E::KIND),
            callable: Arc::new(move |event| match E::from_event(event) {
                Some(payload) => f(payload).into_outcome(),
                None => Ok(Outcome::NotHandled),
            }),
        }
    }

    /// Creates a handler from a declared signature and an untyped body.
    pub fn raw<F>(name: impl Into<Cow<'static, str>>, signature: Signature, f: F) -> Self
    where
        F: Fn(&Event) -> Result<Outcome, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            priority: 0,
            signature,
            callable: Arc::new(f),
        }
    }

    /// Sets the ordering priority within the module. Lower runs first.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_priority(&self) -> i32 {
        self.priority
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn callable(&self) -> &HandlerFn {
        &self.callable
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

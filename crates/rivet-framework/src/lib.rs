//! # Rivet Framework
//!
//! Handler registry, modules and the dispatch engine.
//!
//! This layer provides:
//! - [`HandlerDescriptor`]s with shape validation ([`Signature`])
//! - [`Module`]s, their construction context and compile-time discovery
//!   ([`ModuleFactory`], [`MODULE_REGISTRY`])
//! - The frozen, ordered [`Registry`]
//! - The [`Dispatcher`], the registry-backed [`EventDispatcher`](rivet_core::EventDispatcher)

pub mod dispatcher;
pub mod handler;
pub mod module;
pub mod registry;

#[cfg(test)]
mod testing;

pub use dispatcher::Dispatcher;
pub use handler::{HandlerDescriptor, HandlerFn, IntoOutcome, OutputShape, Signature};
pub use module::{
    CreateModuleFn, MODULE_REGISTRY, Module, ModuleBuilder, ModuleContext, ModuleFactory,
    discovered_modules,
};
pub use registry::{BoundHandler, Registry, RegistryBuilder};

/// Re-exported for `#[register_module]` expansions.
#[doc(hidden)]
pub use linkme;

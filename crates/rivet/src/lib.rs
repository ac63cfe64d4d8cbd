//! # Rivet
//!
//! A plugin-style bot framework whose event loop belongs to a native session
//! runtime.
//!
//! ## Overview
//!
//! Rivet receives opaque events from a native session (login, group message,
//! friend message), routes each one through the handlers of the registered
//! modules in priority order, and lets those handlers send commands back into
//! the session through a bridge.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌────────────┐     ┌──────────────────┐
//! │ NativeRuntime │────▶│ NativeBridge │────▶│ Dispatcher │────▶│ module "log"     │
//! │  (run_loop)   │     │  (inbound)   │     │ (registry) │────▶│ module "echo"    │
//! └───────────────┘     └──────────────┘     └────────────┘     └────────┬─────────┘
//!         ▲                                                              │
//!         └────────────────────── Client::send_* ◀───────────────────────┘
//! ```
//!
//! - **Session**: builds modules, freezes the registry, runs the handshake
//!   and the native loop
//! - **Modules**: own handlers and an ordering priority
//! - **Handlers**: take one event payload, return whether the event was handled
//! - **Client**: typed outbound commands over the bridge
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rivet::prelude::*;
//!
//! #[register_module(crate = rivet::framework)]
//! fn echo(ctx: &ModuleContext) -> ConfigResult<Module> {
//!     let client = ctx.client().clone();
//!     Ok(Module::builder("echo")
//!         .on("on_friend_message", move |e: &FriendMessageEvent| {
//!             client.send_friend_message(e.from_uin, e.plain_text()).map(|()| true)
//!         })
//!         .build())
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     init_from_config(&config.logging);
//!
//!     let (native, events) = ChannelRuntime::builder().build()?;
//!     let session = Session::builder(Arc::new(native))
//!         .config(&config)
//!         .discover_modules()
//!         .build()?;
//!     session.run()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `macros`: `#[register_module]` (default)
//! - `toml-config`: read `rivet.toml` (default)
//! - `yaml-config`: read `rivet.yaml`
//! - `json-log`: JSON log output

pub use rivet_core as core;
pub use rivet_framework as framework;
pub use rivet_runtime as runtime;

#[cfg(feature = "macros")]
pub use rivet_macros::register_module;

/// Commonly used types for writing modules and starting a session.
///
/// ```rust,ignore
/// use rivet::prelude::*;
/// ```
pub mod prelude {
    // Session and configuration
    pub use rivet_runtime::{
        ChannelRuntime, EventSender, RivetConfig, Session, SessionState, init_from_config,
        load_config, load_config_from_file,
    };

    // Modules and handlers
    pub use rivet_framework::{HandlerDescriptor, Module, ModuleContext, ModuleFactory};

    // Events, commands and outcomes
    pub use rivet_core::{
        Client, ConfigResult, Event, EventKind, FriendMessageEvent, GroupMessageEvent, Image,
        LoginEvent, MessageElement, Outcome,
    };

    #[cfg(feature = "macros")]
    pub use rivet_macros::register_module;
}

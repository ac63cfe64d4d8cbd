//! Procedural macros for the Rivet bot framework.
//!
//! # Module registration
//!
//! `#[register_module]` turns a module factory function into a compile-time
//! registration, so the session can discover it without being told about it:
//!
//! ```rust,ignore
//! use rivet_framework::{Module, ModuleContext};
//! use rivet_core::{ConfigResult, LoginEvent};
//!
//! #[register_module]
//! fn log(_ctx: &ModuleContext) -> ConfigResult<Module> {
//!     Ok(Module::builder("log")
//!         .on("on_login", |e: &LoginEvent| {
//!             tracing::info!(uid = e.uid, "logged in");
//!             true
//!         })
//!         .build())
//! }
//! ```
//!
//! Arguments:
//!
//! - `id = "..."`: factory id and config section key (default: the function name)
//! - `crate = path`: path to `rivet_framework` when it is only reachable
//!   through a re-export, e.g. `crate = rivet::framework`

mod module;

use proc_macro::TokenStream;

/// Registers a `fn(&ModuleContext) -> ConfigResult<Module>` in
/// `MODULE_REGISTRY`.
///
/// The function itself is left unchanged.
#[proc_macro_attribute]
pub fn register_module(attr: TokenStream, item: TokenStream) -> TokenStream {
    module::register_module(attr, item)
}

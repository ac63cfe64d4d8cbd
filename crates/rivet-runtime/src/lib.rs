//! Rivet Runtime - session lifecycle for the Rivet bot framework.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `RivetConfig`)
//! - Logging setup (`LoggingBuilder`, `init_from_config`)
//! - The session state machine (`Session`, `SessionBuilder`, `SessionState`)
//! - An in-process native runtime (`ChannelRuntime`) for demos and tests
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rivet_runtime::{ChannelRuntimeBuilder, Session, load_config, logging};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let (native, events) = ChannelRuntimeBuilder::from_config(&config.native)
//!         .service("SendFriendMessage", |payload| async move { Ok(Vec::new()) })
//!         .build()?;
//!
//!     let session = Session::builder(Arc::new(native))
//!         .config(&config)
//!         .discover_modules()
//!         .build()?;
//!
//!     // Blocks until every `EventSender` is dropped.
//!     session.run()?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `toml-config`: read `rivet.toml`
//! - `yaml-config`: read `rivet.yaml`
//! - `json-log`: JSON log output

pub mod config;
pub mod error;
pub mod logging;
pub mod native;
pub mod session;

pub use config::{
    ConfigLoader, LoadError, LoadResult, RivetConfig, load_config, load_config_from_file,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents, init_from_config};
pub use native::{ChannelRuntime, ChannelRuntimeBuilder, CommandService, EventSender};
pub use session::{Session, SessionBuilder, SessionState};

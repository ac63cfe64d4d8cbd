//! # Rivet Core
//!
//! The core engine of the Rivet bot framework.
//!
//! This crate defines everything that crosses the native boundary and the
//! contract the dispatch engine fulfils:
//!
//! - **Event model**: the closed [`EventKind`] tag and one payload type per
//!   kind ([`Event`], [`EventPayload`]).
//! - **Command model**: outbound [`Command`]s and their [`Reply`]s.
//! - **Codec**: the [`Codec`] contract and the bundled [`JsonCodec`].
//! - **Dispatch contract**: [`EventDispatcher`], [`Outcome`], [`DispatchOutcome`].
//! - **Native bridge**: the write-once session handle, outbound `send`, and
//!   the inbound entry point ([`NativeBridge`], [`Inbound`]).
//! - **Client**: typed outbound helpers used by handlers ([`Client`]).
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐     ┌─────────┐     ┌────────────┐     ┌─────────┐
//! │ NativeRuntime│────▶│ Inbound │────▶│ Dispatcher │────▶│ Handler │
//! │  (run_loop)  │     │ (decode)│     │            │     │         │
//! └──────────────┘     └─────────┘     └────────────┘     └────┬────┘
//!        ▲                                                     │
//!        └──────────────── NativeBridge::send ◀── Client ◀─────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rivet_core::{JsonCodec, NativeBridge, Client};
//!
//! let bridge = Arc::new(NativeBridge::new(native, Arc::new(JsonCodec)));
//! bridge.handshake()?;
//!
//! let client = Client::new(bridge.clone());
//! client.send_friend_message(12345, "hello")?;
//! ```

pub mod bridge;
pub mod client;
pub mod codec;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod event;

pub use bridge::{
    BridgeHandle, DecodeFailurePolicy, Inbound, InboundSink, NativeBridge, NativeRuntime,
    RawHandle,
};
pub use client::Client;
pub use codec::{Codec, JsonCodec};
pub use command::{
    Command, Reply, SendFriendMessage, SendGroupMessage, TargetType, UploadImage,
};
pub use dispatch::{DispatchOutcome, EventDispatcher, Outcome};
pub use error::{
    BoxError, BridgeError, BridgeResult, CodecError, CodecResult, ConfigError, ConfigResult,
    DispatchError, InboundError,
};
pub use event::{
    Event, EventKind, EventPayload, FriendMessageEvent, GroupMessageEvent, Image, LoginEvent,
    MessageElement,
};

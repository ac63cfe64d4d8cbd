//! Native runtimes bundled with Rivet.

pub mod channel;

pub use channel::{ChannelRuntime, ChannelRuntimeBuilder, CommandService, EventSender, RawEvent};

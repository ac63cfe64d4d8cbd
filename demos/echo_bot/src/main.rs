//! Echo Bot Example
//!
//! Runs the `log` and `echo` modules over the in-process channel runtime and
//! feeds it a few canned events.
//!
//! # Modules
//!
//! Both modules are picked up through `#[register_module]`; the handler chain
//! for a friend message is:
//!
//! ```text
//! log::on_friend_message (priority -10, returns false)
//! └── echo::echo_friend  (priority 0, replies and returns true)
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot
//! cargo run --package echo-bot -- --config rivet.toml --wait
//! ```
//!
//! With a config file such as:
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [modules.echo]
//! prefix = "echo: "
//! ```

mod modules;
mod native;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rivet::core::{
    Command, Event, FriendMessageEvent, GroupMessageEvent, LoginEvent, MessageElement,
};
use rivet::runtime::{
    ChannelRuntimeBuilder, Session, init_from_config, load_config, load_config_from_file,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "Echo bot demo for the Rivet framework")]
struct Args {
    /// Configuration file. Searched for in the working directory when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep the session open until Ctrl+C.
    #[arg(long)]
    wait: bool,
}

fn demo_events() -> Vec<Event> {
    vec![
        LoginEvent { uid: 10001 }.into(),
        GroupMessageEvent {
            group_code: 20002,
            group_name: "rivet-dev".into(),
            from_uin: 12345,
            elements: vec![MessageElement::text("/echo hello group")],
            ..Default::default()
        }
        .into(),
        GroupMessageEvent {
            group_code: 20002,
            group_name: "rivet-dev".into(),
            from_uin: 12345,
            elements: vec![MessageElement::text("just chatting")],
            ..Default::default()
        }
        .into(),
        FriendMessageEvent {
            from_uin: 12345,
            from_nick: "alice".into(),
            elements: vec![MessageElement::text("hello")],
            ..Default::default()
        }
        .into(),
        FriendMessageEvent {
            from_uin: 12345,
            from_nick: "alice".into(),
            elements: vec![MessageElement::text("/image")],
            ..Default::default()
        }
        .into(),
    ]
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config_from_file(path)?,
        None => load_config()?,
    };
    init_from_config(&config.logging);

    let (native, events) = ChannelRuntimeBuilder::from_config(&config.native)
        .service(Command::SEND_FRIEND_MESSAGE, native::send_friend_message)
        .service(Command::SEND_GROUP_MESSAGE, native::send_group_message)
        .service(Command::UPLOAD_IMAGE, native::upload_image)
        .shutdown_on_ctrl_c(true)
        .build()?;

    let session = Session::builder(Arc::new(native))
        .config(&config)
        .discover_modules()
        .build()?;

    for event in demo_events() {
        events.push_event(&event)?;
    }

    // The loop ends once every sender is gone.
    let _keep_open = args.wait.then(|| events.clone());
    drop(events);
    if args.wait {
        info!("Demo events queued, press Ctrl+C to stop");
    }

    session.run()?;
    Ok(())
}

//! Demo modules, discovered through `#[register_module]`.

use rivet::prelude::*;
use serde::Deserialize;
use tracing::{info, warn};

// ============================================================================
// Log module
// ============================================================================

/// Logs every event. Runs first and only consumes logins.
#[register_module(crate = rivet::framework)]
fn log(_ctx: &ModuleContext) -> ConfigResult<Module> {
    Ok(Module::builder("log")
        .name("Event log")
        .priority(-10)
        .on("on_login", |e: &LoginEvent| {
            info!(uid = e.uid, "Logged in");
            true
        })
        .on("on_group_message", |e: &GroupMessageEvent| {
            info!(
                group = e.group_code,
                group_name = %e.group_name,
                from = e.from_uin,
                "[Group] {}",
                e.plain_text()
            );
            false
        })
        .on("on_friend_message", |e: &FriendMessageEvent| {
            info!(from = e.from_uin, nick = %e.from_nick, "[Friend] {}", e.plain_text());
            false
        })
        .build())
}

// ============================================================================
// Echo module
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EchoConfig {
    /// Prepended to every echoed message.
    prefix: String,
}

/// Echoes friend messages, and group messages starting with `/echo `.
///
/// A friend message of `/image` uploads a small picture and sends it back.
#[register_module(crate = rivet::framework)]
fn echo(ctx: &ModuleContext) -> ConfigResult<Module> {
    let config: EchoConfig = ctx.config()?;
    let prefix = config.prefix;
    info!(prefix = %prefix, "Echo module configured");

    let group_client = ctx.client().clone();
    let group_prefix = prefix.clone();
    let friend_client = ctx.client().clone();

    Ok(Module::builder("echo")
        .on("echo_group", move |e: &GroupMessageEvent| {
            let text = e.plain_text();
            let Some(content) = text.strip_prefix("/echo ") else {
                return Ok(false);
            };
            group_client
                .send_group_message(e.group_code, format!("{group_prefix}{content}"))
                .map(|()| true)
        })
        .on("echo_friend", move |e: &FriendMessageEvent| {
            let text = e.plain_text();
            if text.trim() == "/image" {
                let image = friend_client.upload_friend_image(e.from_uin, PIXEL.to_vec())?;
                if image.res_id.is_empty() {
                    warn!(from = e.from_uin, "Upload returned no resource id");
                }
                return friend_client
                    .send_friend_elements(e.from_uin, vec![MessageElement::FriendImage(image)])
                    .map(|()| true);
            }
            friend_client
                .send_friend_message(e.from_uin, format!("{prefix}{text}"))
                .map(|()| true)
        })
        .build())
}

/// A 1x1 transparent GIF.
const PIXEL: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];

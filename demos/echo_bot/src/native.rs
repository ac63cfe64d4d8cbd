//! Command services standing in for a real native session.
//!
//! They log what would have been sent and answer uploads with made-up image
//! metadata.

use std::sync::atomic::{AtomicU32, Ordering};

use rivet::core::{BridgeError, BridgeResult, Codec, Command, Image, JsonCodec, MessageElement};
use tracing::info;

static NEXT_IMAGE: AtomicU32 = AtomicU32::new(1);

fn decode(name: &str, payload: &[u8]) -> BridgeResult<Command> {
    Ok(JsonCodec.decode_command(name, payload)?)
}

fn render(elements: &[MessageElement]) -> String {
    elements
        .iter()
        .map(|element| match element {
            MessageElement::Text { content } => content.clone(),
            MessageElement::FriendImage(image) | MessageElement::GroupImage(image) => {
                format!("[image {}]", image.res_id)
            }
            other => format!("[{other:?}]"),
        })
        .collect()
}

pub async fn send_friend_message(payload: Vec<u8>) -> BridgeResult<Vec<u8>> {
    if let Command::SendFriendMessage(msg) = decode(Command::SEND_FRIEND_MESSAGE, &payload)? {
        info!(to = msg.target, "-> friend: {}", render(&msg.elements));
    }
    Ok(Vec::new())
}

pub async fn send_group_message(payload: Vec<u8>) -> BridgeResult<Vec<u8>> {
    if let Command::SendGroupMessage(msg) = decode(Command::SEND_GROUP_MESSAGE, &payload)? {
        info!(group = msg.group_code, "-> group: {}", render(&msg.elements));
    }
    Ok(Vec::new())
}

pub async fn upload_image(payload: Vec<u8>) -> BridgeResult<Vec<u8>> {
    let Command::UploadImage(upload) = decode(Command::UPLOAD_IMAGE, &payload)? else {
        return Err(BridgeError::native(Command::UPLOAD_IMAGE, "unexpected payload"));
    };

    let id = NEXT_IMAGE.fetch_add(1, Ordering::Relaxed);
    let image = Image {
        res_id: format!("demo-{id}"),
        size: u32::try_from(upload.data.len()).unwrap_or(u32::MAX),
        width: 1,
        height: 1,
        ..Default::default()
    };
    info!(to = upload.target, res_id = %image.res_id, bytes = image.size, "Image uploaded");
    Ok(JsonCodec.encode_image(&image)?)
}

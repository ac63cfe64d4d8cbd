//! Outbound command model.
//!
//! Commands travel from handlers into the native session through
//! [`NativeBridge::send`](crate::bridge::NativeBridge::send). Each command has a
//! stable name that the native side uses to pick the operation to run.

use serde::{Deserialize, Serialize};

use crate::event::{Image, MessageElement};

/// Sends a message to a friend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendFriendMessage {
    pub target: i64,
    pub elements: Vec<MessageElement>,
}

/// Sends a message to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendGroupMessage {
    pub group_code: i64,
    pub elements: Vec<MessageElement>,
}

/// Where an uploaded image is going to be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Friend,
    Group,
}

/// Uploads raw image bytes so they can be referenced from a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadImage {
    pub target_type: TargetType,
    pub target: i64,
    pub data: Vec<u8>,
}

/// A command understood by the native session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SendFriendMessage(SendFriendMessage),
    SendGroupMessage(SendGroupMessage),
    UploadImage(UploadImage),
}

impl Command {
    pub const SEND_FRIEND_MESSAGE: &'static str = "SendFriendMessage";
    pub const SEND_GROUP_MESSAGE: &'static str = "SendGroupMessage";
    pub const UPLOAD_IMAGE: &'static str = "UploadImage";

    /// Native operation name for this command.
    pub const fn name(&self) -> &'static str {
        match self {
            Command::SendFriendMessage(_) => Self::SEND_FRIEND_MESSAGE,
            Command::SendGroupMessage(_) => Self::SEND_GROUP_MESSAGE,
            Command::UploadImage(_) => Self::UPLOAD_IMAGE,
        }
    }
}

impl From<SendFriendMessage> for Command {
    fn from(cmd: SendFriendMessage) -> Self {
        Command::SendFriendMessage(cmd)
    }
}

impl From<SendGroupMessage> for Command {
    fn from(cmd: SendGroupMessage) -> Self {
        Command::SendGroupMessage(cmd)
    }
}

impl From<UploadImage> for Command {
    fn from(cmd: UploadImage) -> Self {
        Command::UploadImage(cmd)
    }
}

/// Decoded response to a [`Command`].
///
/// Message sends are fire-and-forget and answer with an empty byte sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Empty,
    Image(Image),
}

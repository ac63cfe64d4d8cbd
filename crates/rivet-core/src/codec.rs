//! Payload codecs.
//!
//! The native boundary only moves byte sequences. A [`Codec`] turns events,
//! commands and replies into bytes and back; the bridge never looks at the
//! bytes itself. [`JsonCodec`] is the bundled implementation.
//!
//! Event bytes carry the payload only. The [`EventKind`] travels next to them,
//! so `decode_event` is told which payload type to expect.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::command::{Command, SendFriendMessage, SendGroupMessage, UploadImage};
use crate::error::{CodecError, CodecResult};
use crate::event::{Event, EventKind, FriendMessageEvent, GroupMessageEvent, Image, LoginEvent};

/// Encodes and decodes everything that crosses the native boundary.
///
/// Implementations must be total over the kinds and commands the framework
/// declares: a malformed byte sequence yields [`CodecError::Decode`], never a
/// panic.
pub trait Codec: Send + Sync {
    /// Encodes the payload of `event` (without its kind tag).
    fn encode_event(&self, event: &Event) -> CodecResult<Vec<u8>>;

    /// Decodes a payload that the native session tagged with `kind`.
    fn decode_event(&self, kind: EventKind, bytes: &[u8]) -> CodecResult<Event>;

    /// Encodes a command payload.
    fn encode_command(&self, command: &Command) -> CodecResult<Vec<u8>>;

    /// Decodes the payload of the command called `name`.
    fn decode_command(&self, name: &str, bytes: &[u8]) -> CodecResult<Command>;

    /// Encodes image metadata, the reply to an image upload.
    fn encode_image(&self, image: &Image) -> CodecResult<Vec<u8>>;

    /// Decodes image metadata.
    fn decode_image(&self, bytes: &[u8]) -> CodecResult<Image>;
}

// =============================================================================
// JSON Codec
// =============================================================================

/// [`Codec`] backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub const fn new() -> Self {
        Self
    }
}

fn to_bytes<T: Serialize>(kind: &str, value: &T) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CodecError::encode(kind, e))
}

fn from_bytes<T: DeserializeOwned>(kind: &str, bytes: &[u8]) -> CodecResult<T> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::decode(kind, e))
}

impl Codec for JsonCodec {
    fn encode_event(&self, event: &Event) -> CodecResult<Vec<u8>> {
        let kind = event.kind().as_str();
        match event {
            Event::Login(payload) => to_bytes(kind, payload),
            Event::GroupMessage(payload) => to_bytes(kind, payload),
            Event::FriendMessage(payload) => to_bytes(kind, payload),
        }
    }

    fn decode_event(&self, kind: EventKind, bytes: &[u8]) -> CodecResult<Event> {
        let name = kind.as_str();
        Ok(match kind {
            EventKind::Login => Event::Login(from_bytes::<LoginEvent>(name, bytes)?),
            EventKind::GroupMessage => {
                Event::GroupMessage(from_bytes::<GroupMessageEvent>(name, bytes)?)
            }
            EventKind::FriendMessage => {
                Event::FriendMessage(from_bytes::<FriendMessageEvent>(name, bytes)?)
            }
        })
    }

    fn encode_command(&self, command: &Command) -> CodecResult<Vec<u8>> {
        let name = command.name();
        match command {
            Command::SendFriendMessage(payload) => to_bytes(name, payload),
            Command::SendGroupMessage(payload) => to_bytes(name, payload),
            Command::UploadImage(payload) => to_bytes(name, payload),
        }
    }

    fn decode_command(&self, name: &str, bytes: &[u8]) -> CodecResult<Command> {
        match name {
            Command::SEND_FRIEND_MESSAGE => {
                from_bytes::<SendFriendMessage>(name, bytes).map(Command::from)
            }
            Command::SEND_GROUP_MESSAGE => {
                from_bytes::<SendGroupMessage>(name, bytes).map(Command::from)
            }
            Command::UPLOAD_IMAGE => from_bytes::<UploadImage>(name, bytes).map(Command::from),
            other => Err(CodecError::UnknownCommand(other.to_string())),
        }
    }

    fn encode_image(&self, image: &Image) -> CodecResult<Vec<u8>> {
        to_bytes("Image", image)
    }

    fn decode_image(&self, bytes: &[u8]) -> CodecResult<Image> {
        from_bytes("Image", bytes)
    }
}

//! Typed outbound client.

use std::fmt;
use std::sync::Arc;

use crate::bridge::NativeBridge;
use crate::command::{Command, Reply, SendFriendMessage, SendGroupMessage, TargetType, UploadImage};
use crate::error::{BridgeError, BridgeResult};
use crate::event::{Image, MessageElement};

/// Issues commands into the native session on behalf of handlers.
///
/// Cheap to clone; every clone shares the same [`NativeBridge`]. All calls
/// block until the native side answers.
#[derive(Clone)]
pub struct Client {
    bridge: Arc<NativeBridge>,
}

impl Client {
    pub fn new(bridge: Arc<NativeBridge>) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &Arc<NativeBridge> {
        &self.bridge
    }

    /// Sends any command and decodes its reply.
    pub fn call(&self, command: &Command) -> BridgeResult<Reply> {
        let bytes = self.bridge.send_command(command)?;
        match command {
            Command::UploadImage(_) => Ok(Reply::Image(self.bridge.codec().decode_image(&bytes)?)),
            Command::SendFriendMessage(_) | Command::SendGroupMessage(_) => Ok(Reply::Empty),
        }
    }

    /// Sends a plain-text message to a friend.
    pub fn send_friend_message(&self, target: i64, text: impl Into<String>) -> BridgeResult<()> {
        self.send_friend_elements(target, vec![MessageElement::text(text)])
    }

    pub fn send_friend_elements(
        &self,
        target: i64,
        elements: Vec<MessageElement>,
    ) -> BridgeResult<()> {
        self.call(&SendFriendMessage { target, elements }.into())
            .map(drop)
    }

    /// Sends a plain-text message to a group.
    pub fn send_group_message(&self, group_code: i64, text: impl Into<String>) -> BridgeResult<()> {
        self.send_group_elements(group_code, vec![MessageElement::text(text)])
    }

    pub fn send_group_elements(
        &self,
        group_code: i64,
        elements: Vec<MessageElement>,
    ) -> BridgeResult<()> {
        self.call(
            &SendGroupMessage {
                group_code,
                elements,
            }
            .into(),
        )
        .map(drop)
    }

    /// Uploads an image for use in a friend message.
    pub fn upload_friend_image(&self, target: i64, data: Vec<u8>) -> BridgeResult<Image> {
        self.upload_image(TargetType::Friend, target, data)
    }

    /// Uploads an image for use in a group message.
    pub fn upload_group_image(&self, group_code: i64, data: Vec<u8>) -> BridgeResult<Image> {
        self.upload_image(TargetType::Group, group_code, data)
    }

    fn upload_image(
        &self,
        target_type: TargetType,
        target: i64,
        data: Vec<u8>,
    ) -> BridgeResult<Image> {
        let command = UploadImage {
            target_type,
            target,
            data,
        }
        .into();
        match self.call(&command)? {
            Reply::Image(image) => Ok(image),
            Reply::Empty => Err(BridgeError::native(Command::UPLOAD_IMAGE, "empty reply")),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("connected", &self.bridge.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::bridge::{BridgeHandle, InboundSink, NativeRuntime, RawHandle};
    use crate::codec::{Codec, JsonCodec};

    #[derive(Default)]
    struct RecordingNative {
        sends: Mutex<Vec<Command>>,
    }

    impl NativeRuntime for RecordingNative {
        fn handshake(&self) -> BridgeResult<BridgeHandle> {
            let raw = RawHandle::new(0);
            Ok(BridgeHandle {
                environment: raw,
                runtime: raw,
                client: raw,
            })
        }

        fn send(&self, _: &BridgeHandle, command: &str, payload: &[u8]) -> BridgeResult<Vec<u8>> {
            let decoded = JsonCodec.decode_command(command, payload)?;
            let reply = match &decoded {
                Command::UploadImage(upload) => JsonCodec.encode_image(&Image {
                    res_id: format!("res-{}", upload.target),
                    size: upload.data.len() as u32,
                    ..Default::default()
                })?,
                _ => Vec::new(),
            };
            self.sends.lock().unwrap().push(decoded);
            Ok(reply)
        }

        fn run_loop(&self, _: &BridgeHandle, _: &dyn InboundSink) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn connected_client() -> (Arc<RecordingNative>, Client) {
        let native = Arc::new(RecordingNative::default());
        let bridge = Arc::new(NativeBridge::new(native.clone(), Arc::new(JsonCodec)));
        bridge.handshake().unwrap();
        (native, Client::new(bridge))
    }

    #[test]
    fn friend_message_is_sent_as_text_element() {
        let (native, client) = connected_client();
        client.send_friend_message(12345, "hello").unwrap();

        let sends = native.sends.lock().unwrap();
        assert_eq!(
            *sends,
            vec![Command::SendFriendMessage(SendFriendMessage {
                target: 12345,
                elements: vec![MessageElement::text("hello")],
            })]
        );
    }

    #[test]
    fn group_image_upload_returns_image() {
        let (native, client) = connected_client();
        let image = client.upload_group_image(777, vec![0xFF; 16]).unwrap();

        assert_eq!(image.res_id, "res-777");
        assert_eq!(image.size, 16);
        let sends = native.sends.lock().unwrap();
        assert!(matches!(
            &sends[0],
            Command::UploadImage(UploadImage { target_type: TargetType::Group, target: 777, .. })
        ));
    }

    #[test]
    fn client_fails_before_handshake() {
        let native = Arc::new(RecordingNative::default());
        let client = Client::new(Arc::new(NativeBridge::new(native, Arc::new(JsonCodec))));
        assert!(matches!(
            client.send_group_message(1, "hi"),
            Err(BridgeError::HandshakeIncomplete { .. })
        ));
    }
}

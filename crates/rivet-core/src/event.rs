//! Inbound event model.
//!
//! Every event delivered by the native session carries exactly one
//! [`EventKind`] tag and a payload specific to that kind. Routing is a lookup
//! keyed by the tag; nothing inspects payload types at runtime.
//!
//! # Adding a kind
//!
//! 1. Add a variant to [`EventKind`] and list it in [`EventKind::ALL`].
//! 2. Add a payload struct and a matching [`Event`] variant.
//! 3. Implement [`EventPayload`] for it with `impl_event_payload!`.
//! 4. Teach the codec how to decode it.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// EventKind
// =============================================================================

/// Tag identifying a category of inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    /// The native session finished logging in.
    Login,
    /// A message was posted in a group.
    GroupMessage,
    /// A private message arrived from a friend.
    FriendMessage,
}

impl EventKind {
    /// Every kind the framework knows about, in declaration order.
    pub const ALL: [EventKind; 3] = [
        EventKind::Login,
        EventKind::GroupMessage,
        EventKind::FriendMessage,
    ];

    /// Stable wire name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Login => "Login",
            EventKind::GroupMessage => "GroupMessage",
            EventKind::FriendMessage => "FriendMessage",
        }
    }

    /// Looks a kind up by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Message elements
// =============================================================================

/// Image metadata as reported by the native session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    pub res_id: String,
    pub file_path: String,
    /// Hex-encoded MD5 digest of the image bytes.
    pub md5: String,
    pub size: u32,
    pub width: u32,
    pub height: u32,
    pub image_type: i32,
    pub orig_url: String,
    pub flash: bool,
}

/// One segment of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageElement {
    Text { content: String },
    At { target: i64, display: String },
    Face { index: i32, name: String },
    Dice { value: i32 },
    FriendImage(Image),
    GroupImage(Image),
    /// Anything the native session could not classify.
    #[serde(other)]
    Unknown,
}

impl MessageElement {
    /// Shorthand for a text segment.
    pub fn text(content: impl Into<String>) -> Self {
        MessageElement::Text {
            content: content.into(),
        }
    }
}

/// Concatenates the text segments of a message.
fn plain_text(elements: &[MessageElement]) -> String {
    elements
        .iter()
        .filter_map(|element| match element {
            MessageElement::Text { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginEvent {
    pub uid: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupMessageEvent {
    pub seqs: Vec<i32>,
    pub rands: Vec<i32>,
    pub group_code: i64,
    pub group_name: String,
    pub group_card: String,
    pub from_uin: i64,
    pub time: i32,
    pub elements: Vec<MessageElement>,
}

impl GroupMessageEvent {
    /// Text content of the message with non-text segments skipped.
    pub fn plain_text(&self) -> String {
        plain_text(&self.elements)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FriendMessageEvent {
    pub seqs: Vec<i32>,
    pub rands: Vec<i32>,
    /// Account that received the message (the bot itself).
    pub target: i64,
    pub time: i32,
    pub from_uin: i64,
    pub from_nick: String,
    pub elements: Vec<MessageElement>,
}

impl FriendMessageEvent {
    /// Text content of the message with non-text segments skipped.
    pub fn plain_text(&self) -> String {
        plain_text(&self.elements)
    }
}

// =============================================================================
// Event
// =============================================================================

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Login(LoginEvent),
    GroupMessage(GroupMessageEvent),
    FriendMessage(FriendMessageEvent),
}

impl Event {
    /// Returns the tag of this event.
    pub const fn kind(&self) -> EventKind {
        match self {
            Event::Login(_) => EventKind::Login,
            Event::GroupMessage(_) => EventKind::GroupMessage,
            Event::FriendMessage(_) => EventKind::FriendMessage,
        }
    }

    /// Text content for message events, `None` for everything else.
    pub fn plain_text(&self) -> Option<String> {
        match self {
            Event::GroupMessage(msg) => Some(msg.plain_text()),
            Event::FriendMessage(msg) => Some(msg.plain_text()),
            Event::Login(_) => None,
        }
    }
}

/// A payload type bound to exactly one [`EventKind`].
///
/// Handlers are written against payload types; the registry uses
/// [`EventPayload::KIND`] to file them under the right tag.
pub trait EventPayload: Sized + Send + Sync + 'static {
    /// The kind this payload belongs to.
    const KIND: EventKind;

    /// Borrows the payload out of an event of the matching kind.
    fn from_event(event: &Event) -> Option<&Self>;

    /// Wraps the payload into an [`Event`].
    fn into_event(self) -> Event;
}

macro_rules! impl_event_payload {
    ($($payload:ty => $variant:ident),* $(,)?) => {
        $(
            impl EventPayload for $payload {
                const KIND: EventKind = EventKind::$variant;

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$variant(payload) => Some(payload),
                        _ => None,
                    }
                }

                fn into_event(self) -> Event {
                    Event::$variant(self)
                }
            }

            impl From<$payload> for Event {
                fn from(payload: $payload) -> Self {
                    Event::$variant(payload)
                }
            }
        )*
    };
}

impl_event_payload! {
    LoginEvent => Login,
    GroupMessageEvent => GroupMessage,
    FriendMessageEvent => FriendMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_name("GroupRecall"), None);
    }

    #[test]
    fn payload_matches_only_its_kind() {
        let event: Event = LoginEvent { uid: 42 }.into();
        assert_eq!(event.kind(), EventKind::Login);
        assert_eq!(LoginEvent::from_event(&event), Some(&LoginEvent { uid: 42 }));
        assert!(FriendMessageEvent::from_event(&event).is_none());
    }

    #[test]
    fn plain_text_skips_non_text_elements() {
        let msg = GroupMessageEvent {
            elements: vec![
                MessageElement::text("hello "),
                MessageElement::At {
                    target: 1,
                    display: "@bob".into(),
                },
                MessageElement::text("world"),
            ],
            ..Default::default()
        };
        assert_eq!(msg.plain_text(), "hello world");
        assert_eq!(
            Event::GroupMessage(msg).plain_text().as_deref(),
            Some("hello world")
        );
        assert_eq!(Event::Login(LoginEvent::default()).plain_text(), None);
    }

    #[test]
    fn unknown_element_type_is_tolerated() {
        let element: MessageElement =
            serde_json::from_str(r#"{"type":"market_face"}"#).unwrap();
        assert_eq!(element, MessageElement::Unknown);
    }
}

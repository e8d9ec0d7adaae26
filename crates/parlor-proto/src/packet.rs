//! The packet catalog: the static bijection between a [`PacketType`] tag and
//! its typed body.
//!
//! Every variant exposes a body encoder and a body decoder; together with
//! [`crate::frame`] this gives a full `encode(packet) -> bytes` /
//! `decode(bytes) -> packet` round trip (§4.2).

use crate::{
    error::{ProtocolError, Result},
    frame::{HeaderWidths, decode_be, encode_be},
    packet_type::PacketType,
};

/// One row of a caller's relation to another user, as carried on the wire by
/// `ServerGetRelations` (§4.2). Field names follow the wire layout
/// (`a`/`b`) rather than the domain model's `first_username` /
/// `secondary_username`; [`parlor_core`] maps between the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRelation {
    /// The first (requesting) user in the directed pair.
    pub a: String,
    /// The second user in the directed pair.
    pub b: String,
    /// Whether `a` considers `b` a friend.
    pub a_is_friend: bool,
    /// Whether `b` considers `a` a friend.
    pub b_is_friend: bool,
    /// Whether `b` is blocked (held on `a`'s row).
    pub b_is_blocked: bool,
}

/// One message row, as carried on the wire by `ServerGetMessages` (§4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    /// Sender username.
    pub sender: String,
    /// Receiver username.
    pub receiver: String,
    /// Unix epoch second the message was stored.
    pub time_sent: u64,
    /// Message body text.
    pub content: String,
}

/// The full packet catalog, tagged by [`PacketType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// `ClientAuthenticate`: present a token.
    ClientAuthenticate {
        /// Raw token text.
        token: String,
    },
    /// `ClientGetRelations`: no body.
    ClientGetRelations,
    /// `ClientGetMessages`: a peer and a lookback window.
    ClientGetMessages {
        /// The other party in the conversation.
        peer: String,
        /// Seconds of history to return; `0` means unbounded (§4.6).
        after: u64,
    },
    /// `ClientAddFriend`: befriend `username`.
    ClientAddFriend {
        /// The peer to befriend.
        username: String,
    },
    /// `ClientRemoveFriend`: unfriend `username`.
    ClientRemoveFriend {
        /// The peer to unfriend.
        username: String,
    },
    /// `ClientSendMessage`: send `content` to `receiver`.
    ClientSendMessage {
        /// The recipient username.
        receiver: String,
        /// The message body.
        content: String,
    },
    /// `Quit`: no body; the last frame either peer sends.
    Quit,
    /// `InvalidPacketType`: the set of types currently accepted.
    InvalidPacketType {
        /// The types the session will accept next.
        accepted: Vec<PacketType>,
    },
    /// `ServerAuthenticate`: authentication outcome.
    ServerAuthenticate {
        /// Whether the token was valid.
        success: bool,
        /// The resolved username, empty iff `!success`.
        username: String,
    },
    /// `ServerGetRelations`: the caller's relation rows.
    ServerGetRelations {
        /// Relation rows, in store iteration order.
        relations: Vec<WireRelation>,
    },
    /// `ServerGetMessages`: messages exchanged with a peer.
    ServerGetMessages {
        /// Message rows, in store iteration order.
        messages: Vec<WireMessage>,
    },
    /// `ServerAddFriend`: outcome of an add-friend request.
    ServerAddFriend {
        /// Whether the friendship was recorded.
        success: bool,
    },
    /// `ServerRemoveFriend`: no body.
    ServerRemoveFriend,
    /// `ServerSendMessage`: no body.
    ServerSendMessage,
}

impl Packet {
    /// The wire type tag for this packet's variant.
    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::ClientAuthenticate { .. } => PacketType::ClientAuthenticate,
            Self::ClientGetRelations => PacketType::ClientGetRelations,
            Self::ClientGetMessages { .. } => PacketType::ClientGetMessages,
            Self::ClientAddFriend { .. } => PacketType::ClientAddFriend,
            Self::ClientRemoveFriend { .. } => PacketType::ClientRemoveFriend,
            Self::ClientSendMessage { .. } => PacketType::ClientSendMessage,
            Self::Quit => PacketType::Quit,
            Self::InvalidPacketType { .. } => PacketType::InvalidPacketType,
            Self::ServerAuthenticate { .. } => PacketType::ServerAuthenticate,
            Self::ServerGetRelations { .. } => PacketType::ServerGetRelations,
            Self::ServerGetMessages { .. } => PacketType::ServerGetMessages,
            Self::ServerAddFriend { .. } => PacketType::ServerAddFriend,
            Self::ServerRemoveFriend => PacketType::ServerRemoveFriend,
            Self::ServerSendMessage => PacketType::ServerSendMessage,
        }
    }

    /// Encode the body (everything after the header) for this packet.
    ///
    /// `widths` is only consulted by `InvalidPacketType`, whose body is a
    /// concatenation of `type_bytes`-wide tags; every other variant's
    /// layout is width-independent.
    #[must_use]
    pub fn encode_body(&self, widths: &HeaderWidths) -> Vec<u8> {
        match self {
            Self::ClientAuthenticate { token } => token.clone().into_bytes(),
            Self::ClientGetRelations | Self::Quit | Self::ServerRemoveFriend
            | Self::ServerSendMessage => Vec::new(),
            Self::ClientGetMessages { peer, after } => {
                let mut out = encode_string_u16(peer);
                out.extend(encode_be(*after, 8));
                out
            },
            Self::ClientAddFriend { username } | Self::ClientRemoveFriend { username } => {
                username.clone().into_bytes()
            },
            Self::ClientSendMessage { receiver, content } => {
                let mut out = encode_string_u16(receiver);
                out.extend(content.as_bytes());
                out
            },
            Self::InvalidPacketType { accepted } => {
                let mut out = Vec::with_capacity(accepted.len() * widths.type_bytes);
                for packet_type in accepted {
                    out.extend(encode_be(packet_type.tag(), widths.type_bytes));
                }
                out
            },
            Self::ServerAuthenticate { success, username } => {
                let mut out = vec![encode_bool(*success)];
                out.extend(username.as_bytes());
                out
            },
            Self::ServerGetRelations { relations } => {
                let mut out = Vec::new();
                for relation in relations {
                    out.extend(encode_string_u16(&relation.a));
                    out.extend(encode_string_u16(&relation.b));
                    out.push(encode_bool(relation.a_is_friend));
                    out.push(encode_bool(relation.b_is_friend));
                    out.push(encode_bool(relation.b_is_blocked));
                }
                out
            },
            Self::ServerGetMessages { messages } => {
                let mut out = Vec::new();
                for message in messages {
                    out.extend(encode_string_u16(&message.sender));
                    out.extend(encode_string_u16(&message.receiver));
                    out.extend(encode_be(message.time_sent, 8));
                    let content_bytes = message.content.as_bytes();
                    out.extend(encode_be(content_bytes.len() as u64, 8));
                    out.extend(content_bytes);
                }
                out
            },
            Self::ServerAddFriend { success } => vec![encode_bool(*success)],
        }
    }

    /// Decode a body of `packet_type` from exactly `body`'s bytes.
    pub fn decode_body(
        packet_type: PacketType,
        body: &[u8],
        widths: &HeaderWidths,
    ) -> Result<Self> {
        let mut cursor = Cursor::new(body);
        let packet = match packet_type {
            PacketType::ClientAuthenticate => {
                Self::ClientAuthenticate { token: cursor.take_rest_string()? }
            },
            PacketType::ClientGetRelations => Self::ClientGetRelations,
            PacketType::ClientGetMessages => {
                let peer = cursor.take_string_u16(packet_type)?;
                let after = cursor.take_u64(packet_type)?;
                Self::ClientGetMessages { peer, after }
            },
            PacketType::ClientAddFriend => {
                Self::ClientAddFriend { username: cursor.take_rest_string()? }
            },
            PacketType::ClientRemoveFriend => {
                Self::ClientRemoveFriend { username: cursor.take_rest_string()? }
            },
            PacketType::ClientSendMessage => {
                let receiver = cursor.take_string_u16(packet_type)?;
                let content = cursor.take_rest_string()?;
                Self::ClientSendMessage { receiver, content }
            },
            PacketType::Quit => Self::Quit,
            PacketType::InvalidPacketType => {
                let mut accepted = Vec::new();
                while cursor.remaining() > 0 {
                    let tag_bytes = cursor.take(widths.type_bytes, packet_type)?;
                    accepted.push(PacketType::from_tag(decode_be(tag_bytes))?);
                }
                Self::InvalidPacketType { accepted }
            },
            PacketType::ServerAuthenticate => {
                let success = cursor.take_bool(packet_type)?;
                let username = cursor.take_rest_string()?;
                Self::ServerAuthenticate { success, username }
            },
            PacketType::ServerGetRelations => {
                let mut relations = Vec::new();
                while cursor.remaining() > 0 {
                    let a = cursor.take_string_u16(packet_type)?;
                    let b = cursor.take_string_u16(packet_type)?;
                    let a_is_friend = cursor.take_bool(packet_type)?;
                    let b_is_friend = cursor.take_bool(packet_type)?;
                    let b_is_blocked = cursor.take_bool(packet_type)?;
                    relations.push(WireRelation { a, b, a_is_friend, b_is_friend, b_is_blocked });
                }
                Self::ServerGetRelations { relations }
            },
            PacketType::ServerGetMessages => {
                let mut messages = Vec::new();
                while cursor.remaining() > 0 {
                    let sender = cursor.take_string_u16(packet_type)?;
                    let receiver = cursor.take_string_u16(packet_type)?;
                    let time_sent = cursor.take_u64(packet_type)?;
                    let content_len = cursor.take_u64(packet_type)?;
                    let content = cursor.take_string(content_len as usize, packet_type)?;
                    messages.push(WireMessage { sender, receiver, time_sent, content });
                }
                Self::ServerGetMessages { messages }
            },
            PacketType::ServerAddFriend => {
                Self::ServerAddFriend { success: cursor.take_bool(packet_type)? }
            },
            PacketType::ServerRemoveFriend => Self::ServerRemoveFriend,
            PacketType::ServerSendMessage => Self::ServerSendMessage,
        };
        Ok(packet)
    }
}

/// `0xFF` for true, `0x00` for false (§4.2).
fn encode_bool(value: bool) -> u8 {
    if value { 0xFF } else { 0x00 }
}

fn decode_bool(byte: u8) -> Result<bool> {
    match byte {
        0xFF => Ok(true),
        0x00 => Ok(false),
        other => Err(ProtocolError::InvalidBoolean(other)),
    }
}

fn encode_string_u16(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let mut out = encode_be(bytes.len() as u64, 2);
    out.extend(bytes);
    out
}

/// A forward-only cursor over a packet body, used instead of a general
/// buffer crate because every field width here is spec-fixed and small.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize, packet_type: PacketType) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&e| e <= self.bytes.len()).ok_or_else(
            || ProtocolError::MalformedBody {
                packet_type,
                reason: format!("expected {len} more bytes, only {} remain", self.remaining()),
            },
        )?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u64(&mut self, packet_type: PacketType) -> Result<u64> {
        Ok(decode_be(self.take(8, packet_type)?))
    }

    fn take_bool(&mut self, packet_type: PacketType) -> Result<bool> {
        decode_bool(self.take(1, packet_type)?[0])
    }

    fn take_string(&mut self, len: usize, packet_type: PacketType) -> Result<String> {
        Ok(String::from_utf8(self.take(len, packet_type)?.to_vec())?)
    }

    fn take_string_u16(&mut self, packet_type: PacketType) -> Result<String> {
        let len = decode_be(self.take(2, packet_type)?) as usize;
        self.take_string(len, packet_type)
    }

    /// Consume every remaining byte as UTF-8 text (used by variants whose
    /// trailing field fills the rest of `data_length`, e.g. a token or a
    /// message's `content`).
    fn take_rest_string(&mut self) -> Result<String> {
        let rest = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        Ok(String::from_utf8(rest.to_vec())?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const WIDTHS: HeaderWidths = HeaderWidths { id_bytes: 4, type_bytes: 2, data_length_bytes: 4 };

    fn round_trip(packet: &Packet) {
        let body = packet.encode_body(&WIDTHS);
        let decoded = Packet::decode_body(packet.packet_type(), &body, &WIDTHS).unwrap();
        assert_eq!(&decoded, packet);
    }

    #[test]
    fn empty_variants_round_trip() {
        round_trip(&Packet::ClientGetRelations);
        round_trip(&Packet::Quit);
        round_trip(&Packet::ServerRemoveFriend);
        round_trip(&Packet::ServerSendMessage);
    }

    #[test]
    fn authenticate_round_trips() {
        round_trip(&Packet::ClientAuthenticate { token: "abc123".to_string() });
        round_trip(&Packet::ServerAuthenticate { success: true, username: "alice".to_string() });
        round_trip(&Packet::ServerAuthenticate { success: false, username: String::new() });
    }

    #[test]
    fn get_messages_round_trips_with_unbounded_after() {
        round_trip(&Packet::ClientGetMessages { peer: "bob".to_string(), after: 0 });
        round_trip(&Packet::ClientGetMessages { peer: "bob".to_string(), after: 3600 });
    }

    #[test]
    fn invalid_packet_type_lists_accepted_types() {
        round_trip(&Packet::InvalidPacketType {
            accepted: PacketType::ACCEPTED_AFTER_AUTH.to_vec(),
        });
        round_trip(&Packet::InvalidPacketType {
            accepted: PacketType::ACCEPTED_BEFORE_AUTH.to_vec(),
        });
    }

    #[test]
    fn relations_and_messages_round_trip_with_multiple_rows() {
        round_trip(&Packet::ServerGetRelations {
            relations: vec![
                WireRelation {
                    a: "alice".into(),
                    b: "bob".into(),
                    a_is_friend: true,
                    b_is_friend: false,
                    b_is_blocked: false,
                },
                WireRelation {
                    a: "alice".into(),
                    b: "carol".into(),
                    a_is_friend: false,
                    b_is_friend: true,
                    b_is_blocked: true,
                },
            ],
        });

        round_trip(&Packet::ServerGetMessages {
            messages: vec![WireMessage {
                sender: "alice".into(),
                receiver: "bob".into(),
                time_sent: 1_700_000_000,
                content: "hi".into(),
            }],
        });
    }

    #[test]
    fn invalid_boolean_byte_is_rejected() {
        let body = vec![0x42];
        let result = Packet::decode_body(PacketType::ServerAddFriend, &body, &WIDTHS);
        assert!(matches!(result, Err(ProtocolError::InvalidBoolean(0x42))));
    }

    #[test]
    fn truncated_body_is_malformed_not_a_panic() {
        let body = vec![0x00, 0x05]; // claims a 5-byte name, delivers none
        let result = Packet::decode_body(PacketType::ClientGetMessages, &body, &WIDTHS);
        assert!(matches!(result, Err(ProtocolError::MalformedBody { .. })));
    }

    proptest! {
        #[test]
        fn send_message_round_trips_for_arbitrary_text(
            receiver in "[a-zA-Z]{1,16}",
            content in ".{0,64}",
        ) {
            round_trip(&Packet::ClientSendMessage { receiver, content });
        }
    }
}

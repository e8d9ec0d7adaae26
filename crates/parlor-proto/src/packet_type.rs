//! The closed enumeration of numeric packet type tags.
//!
//! Tags are partitioned by origin: client requests live in the 100-range,
//! packets either peer may send live in the 200-range, and server responses
//! live in the 300-range. The numeric value is carried on the wire in
//! `packet_type_bytes` big-endian bytes (§3 of the protocol); in memory we
//! always widen it to `u64` so the registry does not care what width the
//! shared configuration picked.

use crate::error::ProtocolError;

/// A single entry in the closed packet-type enumeration.
///
/// `repr(u64)` discriminants double as the wire tag values, so
/// [`PacketType::tag`] and the `From<PacketType> for u64` impl can never
/// disagree with the match arms in [`PacketType::from_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum PacketType {
    /// Client → server: present a token for authentication.
    ClientAuthenticate = 100,
    /// Client → server: request the caller's relations.
    ClientGetRelations = 101,
    /// Client → server: request messages exchanged with a peer.
    ClientGetMessages = 102,
    /// Client → server: befriend a peer.
    ClientAddFriend = 103,
    /// Client → server: unfriend a peer.
    ClientRemoveFriend = 104,
    /// Client → server: send a message to a peer.
    ClientSendMessage = 105,

    /// Either peer: the sender is ending the session.
    Quit = 200,
    /// Either peer: a request carried an unrecognized or out-of-state type.
    InvalidPacketType = 201,

    /// Server → client: authentication outcome.
    ServerAuthenticate = 300,
    /// Server → client: the caller's relations.
    ServerGetRelations = 301,
    /// Server → client: messages exchanged with a peer.
    ServerGetMessages = 302,
    /// Server → client: outcome of an add-friend request.
    ServerAddFriend = 303,
    /// Server → client: acknowledgement of a remove-friend request.
    ServerRemoveFriend = 304,
    /// Server → client: acknowledgement of a sent message.
    ServerSendMessage = 305,
}

impl PacketType {
    /// All variants, used by tests that assert tag uniqueness and by the
    /// config-time sanity check run at process start.
    pub const ALL: [Self; 14] = [
        Self::ClientAuthenticate,
        Self::ClientGetRelations,
        Self::ClientGetMessages,
        Self::ClientAddFriend,
        Self::ClientRemoveFriend,
        Self::ClientSendMessage,
        Self::Quit,
        Self::InvalidPacketType,
        Self::ServerAuthenticate,
        Self::ServerGetRelations,
        Self::ServerGetMessages,
        Self::ServerAddFriend,
        Self::ServerRemoveFriend,
        Self::ServerSendMessage,
    ];

    /// The set of types accepted as the very first packet on a fresh
    /// connection (§4.3: only `ClientAuthenticate`).
    pub const ACCEPTED_BEFORE_AUTH: [Self; 1] = [Self::ClientAuthenticate];

    /// The set of types accepted once a session is authenticated (§4.3).
    pub const ACCEPTED_AFTER_AUTH: [Self; 6] = [
        Self::Quit,
        Self::ClientGetRelations,
        Self::ClientGetMessages,
        Self::ClientAddFriend,
        Self::ClientRemoveFriend,
        Self::ClientSendMessage,
    ];

    /// The wire tag for this variant.
    #[must_use]
    pub fn tag(self) -> u64 {
        self as u64
    }

    /// Resolve a wire tag to its variant, failing for anything outside the
    /// closed enumeration.
    pub fn from_tag(tag: u64) -> Result<Self, ProtocolError> {
        Self::ALL.into_iter().find(|candidate| candidate.tag() == tag).ok_or(
            ProtocolError::UnknownPacketType(tag),
        )
    }
}

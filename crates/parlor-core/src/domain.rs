//! Domain types shared by the store and both session state machines.

use parlor_proto::{WireMessage, WireRelation};
use sha2::{Digest, Sha512};

/// A directed edge describing `first_username`'s view of `secondary_username`
/// (§3). Friendship is symmetric at the logical level and is represented by
/// two mirror rows, one per direction; this type models a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// The user this row belongs to.
    pub first_username: String,
    /// The other party.
    pub secondary_username: String,
    /// Whether `first_username` considers `secondary_username` a friend.
    pub first_is_friend: bool,
    /// Whether `secondary_username` considers `first_username` a friend
    /// (mirrors the other row's `first_is_friend`).
    pub secondary_is_friend: bool,
    /// Whether `first_username` has blocked `secondary_username`. Blocking
    /// is directional and lives only on the blocker's row.
    pub secondary_is_blocked: bool,
}

impl From<Relation> for WireRelation {
    fn from(relation: Relation) -> Self {
        Self {
            a: relation.first_username,
            b: relation.secondary_username,
            a_is_friend: relation.first_is_friend,
            b_is_friend: relation.secondary_is_friend,
            b_is_blocked: relation.secondary_is_blocked,
        }
    }
}

/// An immutable stored message (§3). Not amendable or deletable in v1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sender username.
    pub sender: String,
    /// Receiver username.
    pub receiver: String,
    /// Unix epoch second the message was stored.
    pub time_sent: u64,
    /// Message body text.
    pub content: String,
}

impl From<Message> for WireMessage {
    fn from(message: Message) -> Self {
        Self {
            sender: message.sender,
            receiver: message.receiver,
            time_sent: message.time_sent,
            content: message.content,
        }
    }
}

/// A registered account. Only the SHA-512 digest of the issued token is ever
/// persisted; the plaintext is returned exactly once, at creation (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// The account's username.
    pub username: String,
    /// `SHA-512(token_utf8)`.
    pub token_hash: [u8; 64],
}

/// Hash a plaintext token the way every store implementation must: never
/// store or log the token itself, only this digest.
#[must_use]
pub fn hash_token(token: &str) -> [u8; 64] {
    let digest = Sha512::digest(token.as_bytes());
    digest.into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn same_token_hashes_identically() {
        assert_eq!(hash_token("abc123"), hash_token("abc123"));
    }

    #[test]
    fn different_tokens_hash_differently() {
        assert_ne!(hash_token("abc123"), hash_token("abc124"));
    }

    #[test]
    fn relation_maps_a_and_b_from_first_and_secondary() {
        let relation = Relation {
            first_username: "alice".into(),
            secondary_username: "bob".into(),
            first_is_friend: true,
            secondary_is_friend: false,
            secondary_is_blocked: true,
        };
        let wire = WireRelation::from(relation);
        assert_eq!(wire.a, "alice");
        assert_eq!(wire.b, "bob");
        assert!(wire.a_is_friend);
        assert!(!wire.b_is_friend);
        assert!(wire.b_is_blocked);
    }
}

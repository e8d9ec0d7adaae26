//! Input/output events (§4.4): the producer-facing vocabulary, distinct from
//! the wire packets they are translated to and from.

use parlor_core::{Message, Relation};

/// A request a producer (e.g. an HTTP handler) submits to the client
/// session. Each carries a random `event_id`, independent of the wire
/// packet id the session assigns when it issues the corresponding request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Fetch every relation row for the authenticated user.
    GetRelations,
    /// Fetch messages exchanged with `sender` in the last `after` seconds
    /// (`0` means the full history; see §9's `after == 0` decision).
    GetMessages {
        /// The other party.
        sender: String,
        /// Lookback window in seconds, or `0` for unbounded.
        after: u64,
    },
    /// Befriend `username`.
    AddFriend {
        /// The user to befriend.
        username: String,
    },
    /// Unfriend `username`.
    RemoveFriend {
        /// The user to unfriend.
        username: String,
    },
    /// Send a message to `receiver`.
    SendMessage {
        /// The recipient.
        receiver: String,
        /// Message body.
        content: String,
    },
}

/// A reply the client session hands back to the producer that submitted the
/// matching [`InputEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Reply to [`InputEvent::GetRelations`].
    GetRelations {
        /// The rows the server returned.
        relations: Vec<Relation>,
    },
    /// Reply to [`InputEvent::GetMessages`].
    GetMessages {
        /// The messages the server returned.
        messages: Vec<Message>,
    },
    /// Reply to [`InputEvent::AddFriend`].
    AddFriend {
        /// Whether the friendship was recorded.
        success: bool,
    },
    /// Reply to [`InputEvent::RemoveFriend`].
    RemoveFriend,
    /// Reply to [`InputEvent::SendMessage`].
    SendMessage,
}

//! The server-side session state machine (§4.3).
//!
//! [`ServerSession`] is Sans-IO: it never touches a socket or a store
//! directly. `handle_frame` and `complete_dispatch` take the inputs they
//! need and return a list of [`ServerAction`]s for an external driver to
//! execute, whether that's sending bytes, calling the store, or closing
//! the socket.
//!
//! Generic over a clock type `I` (typically [`std::time::Instant`]) so
//! timeout logic can be driven deterministically in tests.

use std::ops::Sub;
use std::time::Duration;

use parlor_proto::{Packet, PacketType};

use crate::error::SessionError;

/// Everything the session needs to know to evaluate the authentication
/// timeout.
#[derive(Debug, Clone, Copy)]
pub struct ServerSessionConfig {
    /// How long a freshly accepted socket may go without sending a valid
    /// first frame before the server closes it (§5).
    pub authentication_timeout: Duration,
}

/// A store operation the driver must perform on the session's behalf.
/// [`ServerSession`] never calls the store itself; it only describes what
/// is needed, by which correlation id, for whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchRequest {
    /// Look up `token` and resolve it to a username.
    Authenticate {
        /// The presented token.
        token: String,
    },
    /// Fetch every relation row owned by the authenticated user.
    GetRelations,
    /// Fetch messages exchanged with `peer`, looking back `after` seconds
    /// (`0` meaning unbounded, resolved by the driver per §4.6).
    GetMessages {
        /// The other party in the conversation.
        peer: String,
        /// Seconds of history requested by the client.
        after: u64,
    },
    /// Befriend `username`.
    AddFriend {
        /// The peer to befriend.
        username: String,
    },
    /// Unfriend `username`.
    RemoveFriend {
        /// The peer to unfriend.
        username: String,
    },
    /// Send `content` to `receiver`.
    SendMessage {
        /// Message recipient.
        receiver: String,
        /// Message body.
        content: String,
    },
}

/// The outcome of a [`DispatchRequest`], fed back into the session via
/// [`ServerSession::complete_dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// The token resolved to `username`.
    Authenticated {
        /// The resolved username.
        username: String,
    },
    /// The token did not resolve to any account.
    AuthenticationFailed,
    /// Relation rows for `ServerGetRelations`.
    Relations(Vec<parlor_proto::WireRelation>),
    /// Message rows for `ServerGetMessages`.
    Messages(Vec<parlor_proto::WireMessage>),
    /// Outcome of an add-friend request.
    FriendAdded {
        /// Whether the friendship was recorded.
        success: bool,
    },
    /// Acknowledgement of a remove-friend request. Removal is unconditional
    /// at the response level (§4.3: `ServerRemoveFriend` carries no body).
    FriendRemoved,
    /// Acknowledgement that a message was stored.
    MessageSent,
}

/// Something the driver must do as a result of feeding a frame or dispatch
/// result into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    /// Encode and send `packet`, echoing `id` as its frame id.
    Send {
        /// Correlation id to send the packet under.
        id: u64,
        /// The packet to send.
        packet: Packet,
    },
    /// Call the store on the session's behalf and feed the result back via
    /// [`ServerSession::complete_dispatch`] using the same `id`.
    Dispatch {
        /// Correlation id of the request being served.
        id: u64,
        /// The store operation to perform.
        request: DispatchRequest,
    },
    /// Tear down the connection. If `send_quit`, emit a `Quit` frame first
    /// (never the case for the server in v1: the server only initiates
    /// closes on timeout or protocol violation, neither of which sends
    /// `Quit` per §4.3).
    Close {
        /// Whether to emit `Quit` before closing.
        send_quit: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    AwaitingFirstFrame,
    AwaitingAuthResult { request_id: u64 },
    Authed { username: String },
    AwaitingRequestResult { username: String, request_id: u64 },
    Closed,
}

impl State {
    fn label(&self) -> &'static str {
        match self {
            Self::AwaitingFirstFrame => "awaiting first frame",
            Self::AwaitingAuthResult { .. } => "awaiting authentication result",
            Self::Authed { .. } => "authenticated",
            Self::AwaitingRequestResult { .. } => "awaiting dispatch result",
            Self::Closed => "closed",
        }
    }
}

/// The per-connection server session state machine.
#[derive(Debug, Clone)]
pub struct ServerSession<I> {
    state: State,
    config: ServerSessionConfig,
    started_at: I,
}

impl<I> ServerSession<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Start a new session for a freshly accepted socket at time `now`.
    #[must_use]
    pub fn new(config: ServerSessionConfig, now: I) -> Self {
        Self { state: State::AwaitingFirstFrame, config, started_at: now }
    }

    /// The authenticated username, once known.
    #[must_use]
    pub fn authenticated_username(&self) -> Option<&str> {
        match &self.state {
            State::Authed { username } | State::AwaitingRequestResult { username, .. } => {
                Some(username.as_str())
            },
            _ => None,
        }
    }

    /// Whether the session has closed (driver should stop polling it).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Evaluate the authentication timeout. Call this periodically (e.g.
    /// whenever a read times out without data) rather than only before
    /// `decode`, since a fully silent peer never triggers `handle_frame`.
    pub fn tick(&mut self, now: I) -> Vec<ServerAction> {
        if let State::AwaitingFirstFrame = self.state {
            let elapsed = now - self.started_at;
            if elapsed > self.config.authentication_timeout {
                self.state = State::Closed;
                return vec![ServerAction::Close { send_quit: false }];
            }
        }
        Vec::new()
    }

    /// Feed a decoded frame into the session.
    ///
    /// `decoded` is the *result* of decoding the frame's body, not a bare
    /// packet: an unknown type tag or a malformed body (§7's "protocol
    /// violation" category) is handled exactly like an accepted-but-wrong
    /// variant; the session cannot tell the two apart once decoding has
    /// already failed, and both are handled identically (reply
    /// `InvalidPacketType` with whatever the session currently accepts).
    pub fn handle_frame(
        &mut self,
        id: u64,
        decoded: Result<Packet, parlor_proto::ProtocolError>,
        _now: I,
    ) -> Result<Vec<ServerAction>, SessionError> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::AwaitingFirstFrame => Ok(self.handle_first_frame(id, decoded)),
            State::Authed { username } => Ok(self.handle_authed_frame(username, id, decoded)),
            other @ (State::AwaitingAuthResult { .. }
            | State::AwaitingRequestResult { .. }
            | State::Closed) => {
                let label = other.label();
                self.state = other;
                Err(SessionError::InvalidState {
                    state: label.to_string(),
                    operation: "handle_frame".to_string(),
                })
            },
        }
    }

    fn handle_first_frame(
        &mut self,
        id: u64,
        decoded: Result<Packet, parlor_proto::ProtocolError>,
    ) -> Vec<ServerAction> {
        if let Ok(Packet::ClientAuthenticate { token }) = decoded {
            self.state = State::AwaitingAuthResult { request_id: id };
            return vec![ServerAction::Dispatch {
                id,
                request: DispatchRequest::Authenticate { token },
            }];
        }
        self.state = State::Closed;
        vec![
            ServerAction::Send {
                id,
                packet: Packet::InvalidPacketType {
                    accepted: PacketType::ACCEPTED_BEFORE_AUTH.to_vec(),
                },
            },
            ServerAction::Close { send_quit: false },
        ]
    }

    fn handle_authed_frame(
        &mut self,
        username: String,
        id: u64,
        decoded: Result<Packet, parlor_proto::ProtocolError>,
    ) -> Vec<ServerAction> {
        let request = match decoded {
            Ok(Packet::Quit) => {
                self.state = State::Closed;
                return vec![ServerAction::Close { send_quit: false }];
            },
            Ok(Packet::ClientGetRelations) => DispatchRequest::GetRelations,
            Ok(Packet::ClientGetMessages { peer, after }) => {
                DispatchRequest::GetMessages { peer, after }
            },
            Ok(Packet::ClientAddFriend { username: target }) => {
                DispatchRequest::AddFriend { username: target }
            },
            Ok(Packet::ClientRemoveFriend { username: target }) => {
                DispatchRequest::RemoveFriend { username: target }
            },
            Ok(Packet::ClientSendMessage { receiver, content }) => {
                DispatchRequest::SendMessage { receiver, content }
            },
            Ok(_) | Err(_) => {
                self.state = State::Authed { username };
                return vec![ServerAction::Send {
                    id,
                    packet: Packet::InvalidPacketType {
                        accepted: PacketType::ACCEPTED_AFTER_AUTH.to_vec(),
                    },
                }];
            },
        };
        self.state = State::AwaitingRequestResult { username, request_id: id };
        vec![ServerAction::Dispatch { id, request }]
    }

    /// Feed the outcome of a previously issued [`DispatchRequest`] back into
    /// the session.
    pub fn complete_dispatch(
        &mut self,
        request_id: u64,
        result: DispatchResult,
    ) -> Result<Vec<ServerAction>, SessionError> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::AwaitingAuthResult { request_id: expected } if expected == request_id => {
                Ok(self.complete_auth(request_id, result))
            },
            State::AwaitingRequestResult { username, request_id: expected }
                if expected == request_id =>
            {
                self.state = State::Authed { username };
                Ok(vec![ServerAction::Send { id: request_id, packet: response_packet(result) }])
            },
            other => {
                let label = other.label();
                self.state = other;
                Err(SessionError::InvalidState {
                    state: label.to_string(),
                    operation: "complete_dispatch".to_string(),
                })
            },
        }
    }

    fn complete_auth(&mut self, id: u64, result: DispatchResult) -> Vec<ServerAction> {
        match result {
            DispatchResult::Authenticated { username } => {
                self.state = State::Authed { username: username.clone() };
                vec![ServerAction::Send {
                    id,
                    packet: Packet::ServerAuthenticate { success: true, username },
                }]
            },
            _ => {
                self.state = State::Closed;
                vec![
                    ServerAction::Send {
                        id,
                        packet: Packet::ServerAuthenticate {
                            success: false,
                            username: String::new(),
                        },
                    },
                    ServerAction::Close { send_quit: false },
                ]
            },
        }
    }
}

fn response_packet(result: DispatchResult) -> Packet {
    match result {
        DispatchResult::Relations(relations) => Packet::ServerGetRelations { relations },
        DispatchResult::Messages(messages) => Packet::ServerGetMessages { messages },
        DispatchResult::FriendAdded { success } => Packet::ServerAddFriend { success },
        DispatchResult::FriendRemoved => Packet::ServerRemoveFriend,
        DispatchResult::MessageSent => Packet::ServerSendMessage,
        DispatchResult::Authenticated { .. } | DispatchResult::AuthenticationFailed => {
            unreachable!("authentication results are handled by complete_auth")
        },
    }
}

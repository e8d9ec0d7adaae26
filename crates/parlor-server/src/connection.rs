//! The per-connection driver: reads frames off a socket, feeds them to
//! [`ServerSession`], executes the actions it returns against a
//! [`Store`], and writes the responses back (§4.3).
//!
//! [`ServerSession`] itself never touches I/O; this is the thin imperative
//! shell around it, driving a blocking non-blocking-socket-with-backoff
//! loop per §5.

use std::{
    net::TcpStream,
    time::{Duration, Instant},
};

use parlor_core::{
    DispatchRequest, DispatchResult, ServerAction, ServerSession, ServerSessionConfig,
};
use parlor_proto::{HeaderWidths, Packet, ProtocolError, RawFrame};
use parlor_store::Store;

/// Tunables a connection driver needs beyond what [`ServerSessionConfig`]
/// already carries.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// Shared frame header widths.
    pub widths: HeaderWidths,
    /// Authentication timeout and any other session-level timing.
    pub session: ServerSessionConfig,
    /// Backoff between would-block retries.
    pub backoff: Duration,
}

/// Run one accepted connection to completion: authenticate, serve requests,
/// and return once the session closes (peer `Quit`, protocol violation, or
/// authentication timeout, per §4.3's state machine).
pub fn serve<S: Store>(mut stream: TcpStream, store: S, config: ConnectionConfig) {
    if let Err(e) = stream.set_nonblocking(true) {
        tracing::warn!(error = %e, "failed to set socket non-blocking");
        return;
    }

    let mut session = ServerSession::new(config.session, Instant::now());

    loop {
        if session.is_closed() {
            return;
        }

        let actions = session.tick(Instant::now());
        if !run_actions(actions, &mut session, &store, &mut stream, &config) {
            return;
        }
        if session.is_closed() {
            return;
        }

        match RawFrame::decode(&mut stream, &config.widths, config.backoff) {
            Ok(frame) => {
                let decoded = decode_frame_body(&frame, &config.widths);
                let actions = match session.handle_frame(frame.header.id, decoded, Instant::now()) {
                    Ok(actions) => actions,
                    Err(e) => {
                        tracing::warn!(error = %e, "handle_frame called in an unexpected session state");
                        return;
                    },
                };
                if !run_actions(actions, &mut session, &store, &mut stream, &config) {
                    return;
                }
            },
            Err(ProtocolError::WouldBlock) => {
                std::thread::sleep(config.backoff);
            },
            Err(e) => {
                tracing::debug!(error = %e, "connection terminated");
                return;
            },
        }
    }
}

/// Resolve a frame's type tag and decode its body, collapsing both an
/// unrecognized tag and a malformed body into the single `Result` shape
/// [`ServerSession::handle_frame`] expects (§7: the session cannot and need
/// not distinguish the two once decoding has already failed).
fn decode_frame_body(frame: &RawFrame, widths: &HeaderWidths) -> Result<Packet, ProtocolError> {
    let packet_type = parlor_proto::PacketType::from_tag(frame.header.type_tag)?;
    Packet::decode_body(packet_type, &frame.body, widths)
}


/// Execute a batch of [`ServerAction`]s, feeding any `Dispatch` results back
/// into the session (which may itself produce more actions, e.g. a `Send`).
/// Returns `false` if the connection should be torn down immediately.
fn run_actions<S: Store>(
    actions: Vec<ServerAction>,
    session: &mut ServerSession<Instant>,
    store: &S,
    stream: &mut TcpStream,
    config: &ConnectionConfig,
) -> bool {
    for action in actions {
        match action {
            ServerAction::Send { id, packet } => {
                let frame = RawFrame::new(id, packet.packet_type().tag(), packet.encode_body(&config.widths));
                if let Err(e) = frame.encode(stream, &config.widths) {
                    tracing::debug!(error = %e, "failed to send response");
                    return false;
                }
            },
            ServerAction::Dispatch { id, request } => {
                let result = execute(store, session.authenticated_username().map(str::to_string), request);
                let follow_up = match session.complete_dispatch(id, result) {
                    Ok(actions) => actions,
                    Err(e) => {
                        tracing::warn!(error = %e, "dispatch completed in an unexpected session state");
                        return false;
                    },
                };
                if !run_actions(follow_up, session, store, stream, config) {
                    return false;
                }
            },
            ServerAction::Close { send_quit } => {
                if send_quit {
                    let frame = RawFrame::new(0, Packet::Quit.packet_type().tag(), Vec::new());
                    let _ = frame.encode(stream, &config.widths);
                }
                return false;
            },
        }
    }
    true
}

/// Call the store for `request`, mapping its outcome to a [`DispatchResult`].
/// `username` is `None` only while authenticating (the request itself
/// carries the token to resolve); [`ServerSession`] only ever constructs the
/// other [`DispatchRequest`] variants from its `Authed` state, so `user` is
/// always populated in practice, but this stays a runtime check rather than
/// an `expect`, since nothing here enforces that invariant at the type
/// level.
fn execute<S: Store>(store: &S, username: Option<String>, request: DispatchRequest) -> DispatchResult {
    let DispatchRequest::Authenticate { token } = request else {
        let Some(user) = username else {
            tracing::warn!("dispatched an authenticated request with no session username");
            return DispatchResult::AuthenticationFailed;
        };
        return execute_authed(store, &user, request);
    };
    match store.check_token(&token) {
        Ok(Some(username)) => DispatchResult::Authenticated { username },
        Ok(None) => DispatchResult::AuthenticationFailed,
        Err(e) => {
            tracing::warn!(error = %e, "check_token failed");
            DispatchResult::AuthenticationFailed
        },
    }
}

/// The subset of [`DispatchRequest`] variants that require an authenticated
/// `user`.
fn execute_authed<S: Store>(store: &S, user: &str, request: DispatchRequest) -> DispatchResult {
    match request {
        DispatchRequest::Authenticate { .. } => {
            unreachable!("callers route Authenticate through execute(), not execute_authed()")
        },
        DispatchRequest::GetRelations => {
            let relations = store.get_all_relations(user).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "get_all_relations failed");
                Vec::new()
            });
            DispatchResult::Relations(relations.into_iter().map(Into::into).collect())
        },
        DispatchRequest::GetMessages { peer, after } => {
            // §9: after == 0 means "unbounded past" at the session boundary;
            // the store's own filter only ever sees a literal lookback window.
            let lookback = if after == 0 { u64::MAX } else { after };
            let messages = store.get_messages(user, &peer, lookback).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "get_messages failed");
                Vec::new()
            });
            DispatchResult::Messages(messages.into_iter().map(Into::into).collect())
        },
        DispatchRequest::AddFriend { username: target } => {
            let success = store.add_friend(user, &target).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "add_friend failed");
                false
            });
            DispatchResult::FriendAdded { success }
        },
        DispatchRequest::RemoveFriend { username: target } => {
            if let Err(e) = store.remove_friend(user, &target) {
                tracing::warn!(error = %e, "remove_friend failed");
            }
            DispatchResult::FriendRemoved
        },
        DispatchRequest::SendMessage { receiver, content } => {
            if let Err(e) = store.add_message(user, &receiver, &content) {
                tracing::warn!(error = %e, "add_message failed");
            }
            DispatchResult::MessageSent
        },
    }
}

//! Error types for the session state machines.
//!
//! Mirrors the protocol crate's split: [`SessionError`] covers state-machine
//! misuse, wrapping [`parlor_proto::ProtocolError`] for framing failures
//! that bubble up through a session. The authentication timeout itself is
//! not an error: [`crate::server_session::ServerSession::tick`] reports it
//! directly as a [`crate::server_session::ServerAction::Close`].

use thiserror::Error;

/// Errors raised by [`crate::server_session::ServerSession`] and the client
/// session driven from `parlor-client`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A method was called that does not apply to the session's current
    /// state (e.g. a second frame arrived while a store dispatch was still
    /// pending, or a dispatch result arrived for an id the session was not
    /// waiting on).
    #[error("invalid state transition: cannot {operation} while {state}")]
    InvalidState {
        /// Human-readable description of the current state.
        state: String,
        /// The operation that was attempted.
        operation: String,
    },

    /// A frame failed to decode or violated the wire contract.
    #[error("protocol error: {0}")]
    Protocol(#[from] parlor_proto::ProtocolError),
}

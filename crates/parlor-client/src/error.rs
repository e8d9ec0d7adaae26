//! Top-level errors a `parlor-client` caller maps to a process exit code.

use thiserror::Error;

/// Errors raised by [`crate::session::ClientSession`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server rejected the presented token.
    #[error("authentication failed: server reported an invalid token")]
    AuthenticationFailed,

    /// No response arrived before the configured authentication timeout
    /// elapsed.
    #[error("authentication timed out")]
    AuthenticationTimeout,

    /// The server replied with a variant that does not belong to the
    /// request/response pairing the client just issued.
    #[error("unexpected response variant for this request")]
    UnexpectedResponse,

    /// A frame failed to encode, decode, or otherwise violated the wire
    /// contract.
    #[error("protocol error: {0}")]
    Protocol(#[from] parlor_proto::ProtocolError),

    /// Underlying transport I/O failure outside the framed read/write path
    /// (e.g. connect failure).
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

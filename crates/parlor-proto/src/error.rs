//! Error types for the wire protocol layer.
//!
//! Strongly-typed errors for frame parsing and packet decoding. We avoid
//! `std::io::Error` for protocol-level failures so callers can distinguish a
//! malformed peer from a transient transport condition without string
//! matching.

use thiserror::Error;

use crate::packet_type::PacketType;

/// Errors produced while decoding a frame or packet body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The peer closed the connection (a zero-length read was returned for a
    /// nonzero request). Distinct from [`ProtocolError::WouldBlock`]: this is
    /// terminal, that is a retry signal.
    #[error("connection reset by peer")]
    ConnectionReset,

    /// A non-blocking socket has no data available right now. Callers MUST
    /// retry; this is never a terminal condition on its own.
    #[error("operation would block")]
    WouldBlock,

    /// A frame header or body claimed more bytes than were ever delivered
    /// before the stream ended.
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    FrameTruncated {
        /// Bytes the header/body declared.
        expected: usize,
        /// Bytes actually available before the stream ended.
        actual: usize,
    },

    /// The numeric `type` tag in a frame header has no registered packet
    /// variant.
    #[error("unknown packet type tag: {0}")]
    UnknownPacketType(u64),

    /// A boolean-coded byte was neither `0x00` nor `0xFF`.
    #[error("invalid boolean byte: {0:#04x}")]
    InvalidBoolean(u8),

    /// A body field declared as UTF-8 text was not valid UTF-8.
    #[error("invalid utf-8 in packet body")]
    Utf8,

    /// A decoder was handed a body of the wrong shape for its variant (e.g.
    /// a length prefix pointing past the end of `data_length` bytes).
    #[error("malformed packet body for {packet_type:?}: {reason}")]
    MalformedBody {
        /// The variant whose decoder rejected the body.
        packet_type: PacketType,
        /// Human-readable reason, not matched on by callers.
        reason: String,
    },

    /// Underlying I/O failure that is not a would-block or reset condition
    /// (e.g. a failed write).
    #[error("transport error: {0}")]
    Transport(String),
}

impl ProtocolError {
    /// Returns true if the session should be torn down without sending a
    /// `Quit` frame. Transport and framing failures are always fatal; only
    /// [`ProtocolError::WouldBlock`] is a retry signal.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::WouldBlock)
    }
}

impl From<std::string::FromUtf8Error> for ProtocolError {
    fn from(_: std::string::FromUtf8Error) -> Self {
        Self::Utf8
    }
}

/// Convenience alias used throughout the protocol crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn only_would_block_is_non_fatal() {
        assert!(!ProtocolError::WouldBlock.is_fatal());
        assert!(ProtocolError::ConnectionReset.is_fatal());
        assert!(ProtocolError::FrameTruncated { expected: 4, actual: 1 }.is_fatal());
    }
}

//! The request/response multiplexer (§4.5).
//!
//! Replaces the source's linear scan over a pending list with a map keyed by
//! packet id, per §9's design note. v1 issues at most one in-flight request
//! per session, so the map is normally empty between calls; it still has to
//! exist to tolerate an unsolicited frame arriving out of turn.

use std::{
    io::{Read, Write},
    time::{Duration, Instant},
};

use parlor_proto::{HeaderWidths, Packet, PacketType, ProtocolError, RawFrame};

/// Frames that arrived while the caller was waiting on a different id.
#[derive(Debug, Default)]
pub struct PendingResponses {
    by_id: std::collections::HashMap<u64, RawFrame>,
}

impl PendingResponses {
    /// An empty pending buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Send `packet` tagged with `id` over `stream` exactly once, then block
/// (with backoff) until a frame carrying that same `id` arrives, returning
/// its decoded packet. Frames for other ids are kept in `pending` for their
/// eventual owner.
///
/// The receive loop retries on [`ProtocolError::WouldBlock`] rather than
/// surfacing it (§4.5 step 2: "receive the next frame... retry on
/// would-block"); the request is sent only the one time above, never
/// resent on a retry. `deadline`, when given, bounds how long the loop
/// retries before giving up with `WouldBlock` itself (used for the
/// authentication step only; ordinary requests pass `None` per §9's
/// "no per-request timeout in v1" decision).
///
/// # Errors
///
/// Returns a [`ProtocolError`] if the send fails, the connection resets, a
/// received frame fails to decode, or `deadline` passes before a matching
/// frame arrives.
pub fn send_and_wait_for_response<S: Read + Write>(
    stream: &mut S,
    widths: &HeaderWidths,
    backoff: Duration,
    deadline: Option<Instant>,
    pending: &mut PendingResponses,
    id: u64,
    request: &Packet,
) -> Result<Packet, ProtocolError> {
    let body = request.encode_body(widths);
    let frame = RawFrame::new(id, request.packet_type().tag(), body);
    frame.encode(stream, widths)?;

    if let Some(frame) = pending.by_id.remove(&id) {
        return Packet::decode_body(PacketType::from_tag(frame.header.type_tag)?, &frame.body, widths);
    }

    loop {
        match RawFrame::decode(stream, widths, backoff) {
            Ok(frame) if frame.header.id == id => {
                return Packet::decode_body(
                    PacketType::from_tag(frame.header.type_tag)?,
                    &frame.body,
                    widths,
                );
            },
            Ok(frame) => {
                pending.by_id.insert(frame.header.id, frame);
            },
            Err(ProtocolError::WouldBlock) if deadline.is_none_or(|d| Instant::now() < d) => {
                std::thread::sleep(backoff);
            },
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::io::Cursor;

    use parlor_proto::Packet;

    use super::*;

    struct DuplexBuffer {
        to_peer: Vec<u8>,
        from_peer: Cursor<Vec<u8>>,
    }

    impl Read for DuplexBuffer {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.from_peer.read(buf)
        }
    }

    impl Write for DuplexBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.to_peer.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn widths() -> HeaderWidths {
        HeaderWidths { id_bytes: 4, type_bytes: 2, data_length_bytes: 4 }
    }

    #[test]
    fn matching_response_is_returned_directly() {
        let widths = widths();
        let response = RawFrame::new(7, Packet::ServerRemoveFriend.packet_type().tag(), vec![]);
        let mut encoded = Vec::new();
        response.encode(&mut encoded, &widths).unwrap();

        let mut stream = DuplexBuffer { to_peer: Vec::new(), from_peer: Cursor::new(encoded) };
        let mut pending = PendingResponses::new();

        let reply = send_and_wait_for_response(
            &mut stream,
            &widths,
            Duration::from_millis(1),
            None,
            &mut pending,
            7,
            &Packet::ClientRemoveFriend { username: "bob".into() },
        )
        .unwrap();

        assert_eq!(reply, Packet::ServerRemoveFriend);
        assert!(pending.by_id.is_empty());
    }

    #[test]
    fn unrelated_frame_is_buffered_until_its_owner_asks() {
        let widths = widths();
        let unrelated = RawFrame::new(99, Packet::ServerSendMessage.packet_type().tag(), vec![]);
        let matching = RawFrame::new(1, Packet::ServerRemoveFriend.packet_type().tag(), vec![]);

        let mut encoded = Vec::new();
        unrelated.encode(&mut encoded, &widths).unwrap();
        matching.encode(&mut encoded, &widths).unwrap();

        let mut stream = DuplexBuffer { to_peer: Vec::new(), from_peer: Cursor::new(encoded) };
        let mut pending = PendingResponses::new();

        let reply = send_and_wait_for_response(
            &mut stream,
            &widths,
            Duration::from_millis(1),
            None,
            &mut pending,
            1,
            &Packet::ClientRemoveFriend { username: "bob".into() },
        )
        .unwrap();

        assert_eq!(reply, Packet::ServerRemoveFriend);
        assert_eq!(pending.by_id.len(), 1);
        assert!(pending.by_id.contains_key(&99));
    }
}

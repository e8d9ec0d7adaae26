//! Frame codec: fixed-width header plus opaque body over a byte stream.
//!
//! Unlike a fixed-size packed header, the three header field widths
//! (`id`, `type`, `data_length`) are drawn from shared configuration and
//! MUST be identical on both peers for the lifetime of a process (§3). The
//! header here is therefore a plain value type carrying logical `u64`
//! quantities, with [`HeaderWidths`] supplying the number of wire bytes each
//! field occupies.

use std::{
    io::{Read, Write},
    thread,
    time::Duration,
};

use crate::error::{ProtocolError, Result};

/// The configured byte width of each header field. Both peers MUST agree on
/// these values; they are loaded once from `shared_config.yml` and never
/// change within a process lifetime (§3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderWidths {
    /// Width in bytes of the correlation `id` field.
    pub id_bytes: usize,
    /// Width in bytes of the `type` field.
    pub type_bytes: usize,
    /// Width in bytes of the `data_length` field.
    pub data_length_bytes: usize,
}

impl HeaderWidths {
    /// Maximum width accepted for any single field. Wide enough for any
    /// realistic configuration while keeping every field representable as a
    /// `u64` without truncation.
    pub const MAX_FIELD_BYTES: usize = 8;

    /// Total header length in bytes for this configuration.
    #[must_use]
    pub fn header_len(&self) -> usize {
        self.id_bytes + self.type_bytes + self.data_length_bytes
    }

    /// Validate that every field width is nonzero and fits in a `u64`.
    pub fn validate(&self) -> Result<()> {
        for width in [self.id_bytes, self.type_bytes, self.data_length_bytes] {
            if width == 0 || width > Self::MAX_FIELD_BYTES {
                return Err(ProtocolError::Transport(format!(
                    "header field width {width} out of range 1..={}",
                    Self::MAX_FIELD_BYTES
                )));
            }
        }
        Ok(())
    }
}

/// Encode `value` as `width` big-endian bytes, truncating any high-order
/// bytes that do not fit. Callers are expected to have validated widths
/// against the values they carry (packet ids and type tags are small; body
/// lengths are bounded by the configured width at the codec boundary).
pub(crate) fn encode_be(value: u64, width: usize) -> Vec<u8> {
    let full = value.to_be_bytes();
    full[full.len() - width..].to_vec()
}

/// Decode `width` big-endian bytes into a `u64`.
pub(crate) fn decode_be(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}

/// The three fixed-width header fields that precede every packet body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Correlation id, echoed verbatim by the matching response.
    pub id: u64,
    /// Numeric packet type tag (see [`crate::PacketType`]).
    pub type_tag: u64,
    /// Byte length of the body that follows.
    pub data_length: u64,
}

impl FrameHeader {
    /// Serialize the header using the given field widths.
    #[must_use]
    pub fn encode(&self, widths: &HeaderWidths) -> Vec<u8> {
        let mut out = Vec::with_capacity(widths.header_len());
        out.extend(encode_be(self.id, widths.id_bytes));
        out.extend(encode_be(self.type_tag, widths.type_bytes));
        out.extend(encode_be(self.data_length, widths.data_length_bytes));
        out
    }

    /// Parse a header from exactly `widths.header_len()` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `bytes.len() != widths.header_len()`; callers always read
    /// exactly that many bytes before calling this, so a mismatch indicates
    /// a bug in the caller, not malformed input.
    #[must_use]
    pub fn decode(bytes: &[u8], widths: &HeaderWidths) -> Self {
        assert_eq!(bytes.len(), widths.header_len(), "header slice length mismatch");
        let (id_bytes, rest) = bytes.split_at(widths.id_bytes);
        let (type_bytes, data_length_bytes) = rest.split_at(widths.type_bytes);
        Self {
            id: decode_be(id_bytes),
            type_tag: decode_be(type_bytes),
            data_length: decode_be(data_length_bytes),
        }
    }
}

/// A frame as it travels on the wire: header plus opaque body bytes. Body
/// interpretation (which [`crate::Packet`] variant it decodes to) is the
/// packet registry's job, not the frame codec's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// The parsed header.
    pub header: FrameHeader,
    /// The exact-length body the header declared.
    pub body: Vec<u8>,
}

impl RawFrame {
    /// Build a frame from an id, type tag, and body, computing `data_length`
    /// automatically so the two can never disagree.
    #[must_use]
    pub fn new(id: u64, type_tag: u64, body: Vec<u8>) -> Self {
        let data_length = body.len() as u64;
        Self { header: FrameHeader { id, type_tag, data_length }, body }
    }

    /// Write `id ‖ type ‖ data_length ‖ body` to `writer`, using a
    /// `write_all`-equivalent so a short write can never leave the frame
    /// half-sent (§5: sends are synchronous and MUST complete fully).
    pub fn encode<W: Write>(&self, writer: &mut W, widths: &HeaderWidths) -> Result<()> {
        let header_bytes = self.header.encode(widths);
        writer.write_all(&header_bytes).map_err(|e| ProtocolError::Transport(e.to_string()))?;
        writer.write_all(&self.body).map_err(|e| ProtocolError::Transport(e.to_string()))
    }

    /// Read one frame from `reader`.
    ///
    /// Header and body reads are exact-length: partial reads are
    /// accumulated until satisfied. A zero-byte read on a nonzero request
    /// is surfaced as [`ProtocolError::ConnectionReset`].
    ///
    /// Before any header byte has arrived, a non-blocking reader reporting
    /// [`std::io::ErrorKind::WouldBlock`] is surfaced as
    /// [`ProtocolError::WouldBlock`] so the caller can retry later without
    /// blocking. Once at least one header byte has been consumed, the
    /// decoder commits to finishing the frame: further would-block
    /// conditions are retried internally after `backoff`, never handed back
    /// to the caller (§4.1: "a half-read frame is not resumable").
    pub fn decode<R: Read>(
        reader: &mut R,
        widths: &HeaderWidths,
        backoff: Duration,
    ) -> Result<Self> {
        let mut header_buf = vec![0u8; widths.header_len()];
        read_exact_with_backoff(reader, &mut header_buf, backoff, true)?;
        let header = FrameHeader::decode(&header_buf, widths);

        let mut body = vec![0u8; header.data_length as usize];
        read_exact_with_backoff(reader, &mut body, backoff, false)?;

        Ok(Self { header, body })
    }
}

/// Fill `buf` completely, retrying on partial reads.
///
/// `allow_would_block_at_start` controls whether a would-block error with
/// zero bytes filled so far is surfaced to the caller (the "frame not
/// started yet" case) or retried internally after sleeping `backoff` (the
/// "frame already committed" case).
fn read_exact_with_backoff<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    backoff: Duration,
    allow_would_block_at_start: bool,
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(ProtocolError::ConnectionReset),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if filled == 0 && allow_would_block_at_start {
                    return Err(ProtocolError::WouldBlock);
                }
                thread::sleep(backoff);
            },
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {},
            Err(e) => return Err(ProtocolError::Transport(e.to_string())),
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::io::Cursor;

    use proptest::prelude::*;

    use super::*;

    const WIDTHS: HeaderWidths = HeaderWidths { id_bytes: 4, type_bytes: 2, data_length_bytes: 4 };

    #[test]
    fn header_round_trip() {
        let header = FrameHeader { id: 42, type_tag: 100, data_length: 7 };
        let bytes = header.encode(&WIDTHS);
        assert_eq!(bytes.len(), WIDTHS.header_len());
        assert_eq!(FrameHeader::decode(&bytes, &WIDTHS), header);
    }

    #[test]
    fn frame_round_trip_over_a_stream() {
        let frame = RawFrame::new(7, 105, b"hello".to_vec());
        let mut wire = Vec::new();
        frame.encode(&mut wire, &WIDTHS).unwrap();

        let mut cursor = Cursor::new(wire);
        let parsed = RawFrame::decode(&mut cursor, &WIDTHS, Duration::from_millis(1)).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn truncated_stream_is_connection_reset() {
        let frame = RawFrame::new(1, 200, Vec::new());
        let mut wire = Vec::new();
        frame.encode(&mut wire, &WIDTHS).unwrap();
        wire.truncate(wire.len() - 1);

        let mut cursor = Cursor::new(wire);
        let result = RawFrame::decode(&mut cursor, &WIDTHS, Duration::from_millis(1));
        assert!(matches!(result, Err(ProtocolError::ConnectionReset)));
    }

    proptest! {
        #[test]
        fn arbitrary_frames_round_trip(
            id in any::<u32>(),
            type_tag in 0u16..1000,
            body in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let frame = RawFrame::new(u64::from(id), u64::from(type_tag), body);
            let mut wire = Vec::new();
            frame.encode(&mut wire, &WIDTHS).unwrap();

            let mut cursor = Cursor::new(wire);
            let parsed = RawFrame::decode(&mut cursor, &WIDTHS, Duration::from_millis(1)).unwrap();
            prop_assert_eq!(parsed, frame);
        }
    }
}

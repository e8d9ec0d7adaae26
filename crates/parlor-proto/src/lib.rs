//! Wire protocol for the parlor chat system.
//!
//! This crate owns exactly the bytes-on-the-wire contract: the frame header,
//! the closed [`PacketType`] enumeration, and the packet catalog's body
//! codecs. It knows nothing about sockets, sessions, or storage; those
//! live in `parlor-core`, `parlor-client`, and `parlor-store`.

mod error;
mod frame;
mod packet;
mod packet_type;

pub use error::{ProtocolError, Result};
pub use frame::{FrameHeader, HeaderWidths, RawFrame};
pub use packet::{Packet, WireMessage, WireRelation};
pub use packet_type::PacketType;

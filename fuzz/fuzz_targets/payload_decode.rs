//! Fuzz target for `Packet::decode_body`.
//!
//! This fuzzer tests packet body deserialization with:
//! - Malformed or truncated bodies
//! - Type confusion across packet types (every type tag tried against the
//!   same arbitrary bytes)
//! - Invalid boolean bytes and oversized length prefixes
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parlor_proto::{HeaderWidths, Packet, PacketType};

const WIDTHS: HeaderWidths = HeaderWidths { id_bytes: 4, type_bytes: 2, data_length_bytes: 4 };

fuzz_target!(|data: &[u8]| {
    for packet_type in PacketType::ALL {
        let _ = Packet::decode_body(packet_type, data, &WIDTHS);
    }
});

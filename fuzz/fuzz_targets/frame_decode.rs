//! Fuzz target for `RawFrame::decode`.
//!
//! This fuzzer tests frame decoding with arbitrary byte sequences to find:
//! - Parser crashes or panics
//! - Integer overflows in size calculations
//! - Buffer over-reads on truncated headers/bodies
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use std::{io::Cursor, time::Duration};

use libfuzzer_sys::fuzz_target;
use parlor_proto::{HeaderWidths, RawFrame};

const WIDTHS: HeaderWidths = HeaderWidths { id_bytes: 4, type_bytes: 2, data_length_bytes: 4 };

fuzz_target!(|data: &[u8]| {
    let mut reader = Cursor::new(data);
    let _ = RawFrame::decode(&mut reader, &WIDTHS, Duration::ZERO);
});

//! Fuzz target for Frame::decode
//!
//! This fuzzer tests PDU decoding with arbitrary byte sequences to find:
//! - Parser crashes or panics
//! - Integer overflows in segment size calculations
//! - Buffer over-reads
//! - Malformed headers that bypass the length bounds
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use kinetic_proto::Frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Attempt to decode arbitrary bytes as a frame
    // This should never panic, only return Err for invalid data
    let _ = Frame::decode(data);
});

//! Fuzz target for the authentication envelope decoder.
//!
//! Arbitrary bytes must never panic the CBOR path, and a decoded envelope
//! must survive HMAC validation against an arbitrary key without panicking.

#![no_main]

use kinetic_proto::Message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = Message::decode(data) {
        let _ = message.hmac_valid(b"fuzz-key");
        let _ = message.identity();
    }
});

//! Fuzz target for the inner command decoder.
//!
//! Covers the field accessors as well: a structurally valid command with
//! absent sections must not panic any of them.

#![no_main]

use kinetic_proto::Command;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(command) = Command::decode(data) {
        let _ = command.status_code();
        let _ = command.key_value();
        let _ = command.range();
        let _ = command.get_log();
    }
});

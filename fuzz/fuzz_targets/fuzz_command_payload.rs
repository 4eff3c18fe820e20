//! Fuzz target: inbound command payloads.
//!
//! Feeds arbitrary bytes through the same path an MQTT delivery takes:
//! bounded copy, JSON decode, command lookup. Must never panic, and a
//! payload that fits the buffer must decode exactly as the raw bytes do.
//!
//! cargo fuzz run fuzz_command_payload

#![no_main]

use libfuzzer_sys::fuzz_target;
use parkgate::app::commands::{BarrierCommand, Sound};
use parkgate::comms::buffer::{RECEIVE_BUFFER_LEN, TerminatedBuffer};
use parkgate::comms::dispatcher::decode;

fuzz_target!(|data: &[u8]| {
    let mut buf = TerminatedBuffer::<RECEIVE_BUFFER_LEN>::new();
    let kept = buf.fill(data).len();
    assert!(kept < RECEIVE_BUFFER_LEN, "terminator slot must stay free");
    assert_eq!(buf.as_bytes_with_nul()[kept], 0);

    let barrier = decode::<BarrierCommand>(buf.as_bytes());
    let sound = decode::<Sound>(buf.as_bytes());
    if !buf.was_truncated() {
        assert_eq!(barrier, decode::<BarrierCommand>(data));
        assert_eq!(sound, decode::<Sound>(data));
    }
});

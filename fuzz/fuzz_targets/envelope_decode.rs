//! Fuzz target for Envelope::decode
//!
//! Feeds arbitrary text to the frame decoder and, for frames that decode,
//! to the typed payload view. Looks for:
//! - Panics on malformed JSON or unexpected field types
//! - Ids that fail to normalize (numbers, negative numbers, huge numbers)
//! - Oversized frames that are not rejected
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use chatlink_proto::Envelope;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let Ok(envelope) = Envelope::decode(text) else {
        return;
    };

    assert!(text.len() <= Envelope::MAX_FRAME_SIZE, "oversized frame accepted");

    // Decoded frames must re-encode
    let encoded = envelope.encode().unwrap();
    let again = Envelope::decode(&encoded).unwrap();
    assert_eq!(again.kind, envelope.kind);

    let _ = envelope.payload();
});

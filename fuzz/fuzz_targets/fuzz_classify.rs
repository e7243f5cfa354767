#![no_main]

use libfuzzer_sys::fuzz_target;
use quizwire_client::protocol::{QuestionPayload, ResponseEnvelope, ResultPayload};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    // Classification must never panic, whatever the server sends.
    if let Ok(push) = quizwire_client::classify(raw) {
        assert_eq!(push.kind(), quizwire_client::classify_kind(raw));
    }

    let _ = ResponseEnvelope::parse(raw);
    let _ = quizwire_client::decode_content::<QuestionPayload>(raw);
    let _ = quizwire_client::decode_content::<ResultPayload>(raw);
});

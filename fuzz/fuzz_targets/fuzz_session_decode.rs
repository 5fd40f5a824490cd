#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let codec = resume_session::SessionCodec::default();
    if let Ok(state) = codec.decode(data) {
        // Anything accepted must re-encode to the same bytes.
        let encoded = codec.encode(&state).unwrap();
        assert_eq!(encoded.as_slice(), data);
    }
});

#![no_main]
use libfuzzer_sys::fuzz_target;
use stitchopt::dst::{self, DstHeader};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes: header parsing must reject, never panic.
    let _ = dst::decode(data);

    // Behind a valid header the bytes exercise the record decoder.
    let mut file = DstHeader::default().to_bytes().to_vec();
    file.extend_from_slice(data);
    if let Ok(d) = dst::decode_with_report(&file) {
        assert!(d.pattern.validate().is_ok());
        assert!(d.pattern.offsets_in_range());
    }
});

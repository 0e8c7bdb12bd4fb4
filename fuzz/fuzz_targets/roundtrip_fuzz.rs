#![no_main]
use libfuzzer_sys::fuzz_target;
use stitchopt::dst::{self, DstHeader};

fuzz_target!(|data: &[u8]| {
    let mut file = DstHeader::default().to_bytes().to_vec();
    file.extend_from_slice(data);
    let Ok(first) = dst::decode(&file) else {
        return;
    };

    // A decoded pattern always re-encodes, and decoding that gives it back.
    let bytes = dst::encode(&first).unwrap();
    let second = dst::decode(&bytes).unwrap();
    assert_eq!(second.stitches, first.stitches);
    assert_eq!(second.colors, first.colors);
});

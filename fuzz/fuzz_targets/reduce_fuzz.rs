#![no_main]
use libfuzzer_sys::fuzz_target;
use stitchopt::dst::{self, DstHeader};
use stitchopt::pattern::StitchKind;
use stitchopt::reduce::{self, config_for_level};

fuzz_target!(|data: &[u8]| {
    let Some((&level, body)) = data.split_first() else {
        return;
    };
    let mut file = DstHeader::default().to_bytes().to_vec();
    file.extend_from_slice(body);
    let Ok(pattern) = dst::decode(&file) else {
        return;
    };

    let config = config_for_level(u32::from(level % 4));
    let (reduced, stats) = reduce::reduce(&pattern, &config);

    assert!(stats.new_count <= stats.original_count);
    assert_eq!(stats.new_count, reduced.len());
    assert_eq!(reduced.color_changes(), pattern.color_changes());
    assert_eq!(
        reduced.count_of(StitchKind::Trim),
        pattern.count_of(StitchKind::Trim)
    );
    assert_eq!(reduced.end_position(), pattern.end_position());
    assert!(reduced.validate().is_ok());
    assert!(reduced.offsets_in_range());
    assert!(dst::encode(&reduced).is_ok());
});

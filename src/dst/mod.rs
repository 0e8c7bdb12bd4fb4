// Tajima DST stitch format.
//
// # Modules
//
// - `record`: 3-byte balanced-ternary stitch records and control bits
// - `header`: 512-byte ASCII header
// - `decoder`: bytes -> Pattern
// - `encoder`: Pattern -> bytes, with jump splitting for long moves

pub mod decoder;
pub mod encoder;
pub mod header;
pub mod record;

use std::path::Path;

pub use decoder::{DecodeError, DecodeWarning, Decoded, decode, decode_with_report};
pub use encoder::{EncodeError, encode};
pub use header::{DstHeader, HEADER_SIZE};
pub use record::{RECORD_SIZE, Record, RecordKind};

/// Number of jump records that make up a trim.
pub const TRIM_SIGNATURE_LEN: usize = 3;

/// Jump offsets written for a trim. Net movement is zero.
pub const TRIM_SIGNATURE: [(i32, i32); TRIM_SIGNATURE_LEN] = [(2, 2), (-4, -4), (2, 2)];

/// File extension of the supported format.
pub const EXTENSION: &str = "dst";

/// Does `path` carry the `.dst` extension (any case)?
pub fn is_dst_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_ignores_case() {
        assert!(is_dst_path(Path::new("a/b/rose.DST")));
        assert!(is_dst_path(Path::new("rose.dst")));
        assert!(!is_dst_path(Path::new("rose.pes")));
        assert!(!is_dst_path(Path::new("rose")));
    }

    #[test]
    fn trim_signature_has_no_net_movement() {
        let (x, y) = TRIM_SIGNATURE
            .iter()
            .fold((0, 0), |(x, y), (dx, dy)| (x + dx, y + dy));
        assert_eq!((x, y), (0, 0));
    }
}

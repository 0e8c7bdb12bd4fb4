// DST decoder: header + record stream -> Pattern.
//
// The record stream is authoritative. Decoding stops at the first end
// record; header counts that disagree with what was read are reported as
// warnings, never as failures.

use thiserror::Error;

use super::header::{DstHeader, HEADER_SIZE};
use super::record::{self, RECORD_SIZE, Record, RecordKind};
use super::{TRIM_SIGNATURE, TRIM_SIGNATURE_LEN};
use crate::pattern::{Pattern, Stitch, StitchKind, ThreadColor};

// ---------------------------------------------------------------------------
// Errors and warnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer ended before an end-of-sequence record.
    #[error("stitch data truncated at byte {offset}: no end-of-sequence record")]
    Truncated { offset: usize },
    /// Mandatory header fields are missing or unparseable.
    #[error("bad header: {0}")]
    BadHeader(String),
}

/// Non-fatal inconsistencies found while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    StitchCountMismatch { declared: u32, actual: usize },
    ColorCountMismatch { declared: u32, actual: usize },
}

impl std::fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StitchCountMismatch { declared, actual } => write!(
                f,
                "header declares {declared} records, stream holds {actual}"
            ),
            Self::ColorCountMismatch { declared, actual } => write!(
                f,
                "header declares {declared} color changes, stream holds {actual}"
            ),
        }
    }
}

/// Result of `decode_with_report`.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub pattern: Pattern,
    pub header: DstHeader,
    /// Records read before the end record.
    pub records: usize,
    pub warnings: Vec<DecodeWarning>,
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decode a DST buffer.
pub fn decode(data: &[u8]) -> Result<Pattern, DecodeError> {
    decode_with_report(data).map(|d| d.pattern)
}

/// Decode a DST buffer, keeping the parsed header and any warnings.
pub fn decode_with_report(data: &[u8]) -> Result<Decoded, DecodeError> {
    let header = DstHeader::parse(data)?;
    let records = read_records(&data[HEADER_SIZE..])?;

    let mut pattern = Pattern::new(header.label.clone());
    pattern.stitches = records_to_stitches(&records);
    let color_changes = pattern.color_changes();
    pattern.colors = (0..=color_changes).map(ThreadColor::unnamed).collect();

    let mut warnings = Vec::new();
    if header.stitch_count as usize != records.len() {
        warnings.push(DecodeWarning::StitchCountMismatch {
            declared: header.stitch_count,
            actual: records.len(),
        });
    }
    if header.color_changes as usize != color_changes {
        warnings.push(DecodeWarning::ColorCountMismatch {
            declared: header.color_changes,
            actual: color_changes,
        });
    }
    for w in &warnings {
        log::warn!("dst: {w}");
    }
    log::debug!(
        "dst: decoded {} records into {} stitches, {} colors",
        records.len(),
        pattern.len(),
        pattern.colors.len()
    );

    Ok(Decoded {
        pattern,
        header,
        records: records.len(),
        warnings,
    })
}

/// Read records up to (not including) the end record.
fn read_records(body: &[u8]) -> Result<Vec<Record>, DecodeError> {
    let mut records = Vec::with_capacity(body.len() / RECORD_SIZE);
    for chunk in body.chunks(RECORD_SIZE) {
        let Ok(bytes) = <&[u8; RECORD_SIZE]>::try_from(chunk) else {
            break;
        };
        let rec = record::decode_record(bytes);
        if rec.kind == RecordKind::End {
            return Ok(records);
        }
        records.push(rec);
    }
    Err(DecodeError::Truncated {
        offset: HEADER_SIZE + records.len() * RECORD_SIZE,
    })
}

/// Sequin records carry no stitch of their own and are read as jumps.
fn is_move(kind: RecordKind) -> bool {
    matches!(kind, RecordKind::Jump | RecordKind::Sequin)
}

fn is_trim_at(records: &[Record], i: usize) -> bool {
    records.get(i..i + TRIM_SIGNATURE_LEN).is_some_and(|window| {
        window
            .iter()
            .zip(TRIM_SIGNATURE.iter())
            .all(|(r, &(dx, dy))| is_move(r.kind) && r.dx == dx && r.dy == dy)
    })
}

fn records_to_stitches(records: &[Record]) -> Vec<Stitch> {
    let mut stitches = Vec::with_capacity(records.len() + 1);
    let (mut x, mut y) = (0i32, 0i32);
    let mut i = 0usize;
    while i < records.len() {
        if is_trim_at(records, i) {
            stitches.push(Stitch::new(x, y, StitchKind::Trim));
            i += TRIM_SIGNATURE_LEN;
            continue;
        }
        let rec = records[i];
        x += rec.dx;
        y += rec.dy;
        let kind = match rec.kind {
            RecordKind::Stitch => StitchKind::Normal,
            RecordKind::Jump | RecordKind::Sequin => StitchKind::Jump,
            RecordKind::ColorChange => StitchKind::ColorChange,
            RecordKind::End => unreachable!("end records are not collected"),
        };
        stitches.push(Stitch::new(x, y, kind));
        i += 1;
    }
    stitches.push(Stitch::new(x, y, StitchKind::End));
    stitches
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::record::{END_RECORD, encode_record};

    fn file(label: &str, st: u32, co: u32, body: &[[u8; 3]]) -> Vec<u8> {
        let hdr = DstHeader {
            label: label.into(),
            stitch_count: st,
            color_changes: co,
            ..Default::default()
        };
        let mut out = hdr.to_bytes().to_vec();
        for r in body {
            out.extend_from_slice(r);
        }
        out
    }

    fn rec(dx: i32, dy: i32, kind: RecordKind) -> [u8; 3] {
        encode_record(Record::new(dx, dy, kind)).unwrap()
    }

    #[test]
    fn header_only_with_end_is_empty_pattern() {
        let data = file("empty", 0, 0, &[END_RECORD]);
        let d = decode_with_report(&data).unwrap();
        assert!(d.pattern.is_empty());
        assert_eq!(d.pattern.colors.len(), 1);
        assert!(d.warnings.is_empty());
        assert_eq!(d.pattern.label, "empty");
    }

    #[test]
    fn positions_accumulate() {
        let data = file(
            "acc",
            3,
            0,
            &[
                rec(10, 0, RecordKind::Stitch),
                rec(10, 5, RecordKind::Stitch),
                rec(-100, 0, RecordKind::Jump),
                END_RECORD,
            ],
        );
        let p = decode(&data).unwrap();
        let got: Vec<_> = p.stitches.iter().map(|s| (s.x, s.y, s.kind)).collect();
        assert_eq!(
            got,
            vec![
                (10, 0, StitchKind::Normal),
                (20, 5, StitchKind::Normal),
                (-80, 5, StitchKind::Jump),
                (-80, 5, StitchKind::End),
            ]
        );
    }

    #[test]
    fn declared_count_mismatch_is_a_warning() {
        let data = file(
            "bad-st",
            99,
            4,
            &[rec(1, 1, RecordKind::Stitch), END_RECORD],
        );
        let d = decode_with_report(&data).unwrap();
        assert_eq!(d.records, 1);
        assert_eq!(
            d.warnings,
            vec![
                DecodeWarning::StitchCountMismatch {
                    declared: 99,
                    actual: 1
                },
                DecodeWarning::ColorCountMismatch {
                    declared: 4,
                    actual: 0
                },
            ]
        );
    }

    #[test]
    fn missing_end_is_truncated() {
        let data = file("t", 2, 0, &[rec(1, 0, RecordKind::Stitch), rec(1, 0, RecordKind::Stitch)]);
        assert_eq!(
            decode(&data),
            Err(DecodeError::Truncated {
                offset: HEADER_SIZE + 6
            })
        );
    }

    #[test]
    fn record_cut_mid_way_is_truncated() {
        let mut data = file("t", 2, 0, &[rec(1, 0, RecordKind::Stitch)]);
        data.extend_from_slice(&[0x01, 0x00]);
        assert!(matches!(decode(&data), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn header_without_records_is_truncated() {
        let data = file("t", 0, 0, &[]);
        assert_eq!(
            decode(&data),
            Err(DecodeError::Truncated {
                offset: HEADER_SIZE
            })
        );
    }

    #[test]
    fn trailing_bytes_after_end_are_ignored() {
        let mut data = file("t", 1, 0, &[rec(3, 3, RecordKind::Stitch), END_RECORD]);
        data.extend_from_slice(&[0x1A, 0x00]);
        assert_eq!(decode(&data).unwrap().len(), 2);
    }

    #[test]
    fn trim_signature_becomes_trim() {
        let data = file(
            "trim",
            5,
            0,
            &[
                rec(5, 5, RecordKind::Stitch),
                rec(2, 2, RecordKind::Jump),
                rec(-4, -4, RecordKind::Jump),
                rec(2, 2, RecordKind::Jump),
                rec(7, 0, RecordKind::Stitch),
                END_RECORD,
            ],
        );
        let p = decode(&data).unwrap();
        let kinds: Vec<_> = p.stitches.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StitchKind::Normal,
                StitchKind::Trim,
                StitchKind::Normal,
                StitchKind::End
            ]
        );
        assert_eq!(p.stitches[1].position(), (5, 5));
        assert_eq!(p.stitches[2].position(), (12, 5));
    }

    #[test]
    fn color_changes_grow_color_table() {
        let data = file(
            "cc",
            3,
            1,
            &[
                rec(1, 0, RecordKind::Stitch),
                rec(0, 0, RecordKind::ColorChange),
                rec(1, 0, RecordKind::Stitch),
                END_RECORD,
            ],
        );
        let p = decode(&data).unwrap();
        assert_eq!(p.colors.len(), 2);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn sequin_is_read_as_jump() {
        let data = file("s", 1, 0, &[[0x01, 0x00, 0x43], END_RECORD]);
        let p = decode(&data).unwrap();
        assert_eq!(p.stitches[0].kind, StitchKind::Jump);
        assert_eq!(p.stitches[0].position(), (1, 0));
    }
}

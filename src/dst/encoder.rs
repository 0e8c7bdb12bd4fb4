// DST encoder: Pattern -> header + record stream.
//
// Header summary fields are always recomputed from the pattern. A stitch
// whose offset exceeds one record is preceded by jump records carrying the
// excess, so the last record written for it keeps the stitch's own command.
// Pattern jumps that would read back as part of a trim signature are merged.

use thiserror::Error;

use super::TRIM_SIGNATURE;
use super::header::{DstHeader, HEADER_SIZE};
use super::record::{self, END_RECORD, RECORD_SIZE, Record, RecordKind};
use crate::pattern::{MAX_RECORD_OFFSET, Pattern, PatternError, StitchKind, offset_in_range};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// A single record was asked to carry more than it can. Jump splitting
    /// makes this unreachable from `encode`.
    #[error("offset ({dx}, {dy}) does not fit in one record")]
    OffsetOutOfRange { dx: i32, dy: i32 },
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] PatternError),
}

// ---------------------------------------------------------------------------
// Record writer
// ---------------------------------------------------------------------------

struct RecordWriter {
    body: Vec<u8>,
    records: usize,
    /// Offsets of the two latest records, `Some` only for jumps that belong
    /// to the pattern (not to a trim signature). Oldest first.
    recent_jumps: [Option<(i32, i32)>; 2],
}

impl RecordWriter {
    fn with_capacity(stitches: usize) -> Self {
        Self {
            body: Vec::with_capacity((stitches + 1) * RECORD_SIZE),
            records: 0,
            recent_jumps: [None, None],
        }
    }

    fn push(&mut self, dx: i32, dy: i32, kind: RecordKind) -> Result<(), EncodeError> {
        let bytes = record::encode_record(Record::new(dx, dy, kind))?;
        self.body.extend_from_slice(&bytes);
        self.records += 1;
        self.recent_jumps = [
            self.recent_jumps[1],
            (kind == RecordKind::Jump).then_some((dx, dy)),
        ];
        Ok(())
    }

    fn push_jump(&mut self, dx: i32, dy: i32) -> Result<(), EncodeError> {
        self.break_signature(dx, dy)?;
        self.push(dx, dy, RecordKind::Jump)
    }

    /// The decoder reads the first two signature jumps followed by a third
    /// `(2, 2)` jump as a trim. Before writing such a jump, fold the two
    /// pattern jumps that would start the signature into one.
    fn break_signature(&mut self, dx: i32, dy: i32) -> Result<(), EncodeError> {
        if (dx, dy) != TRIM_SIGNATURE[0] {
            return Ok(());
        }
        let [Some(a), Some(b)] = self.recent_jumps else {
            return Ok(());
        };
        if a != TRIM_SIGNATURE[0] || b != TRIM_SIGNATURE[1] {
            return Ok(());
        }
        let merged = (a.0 + b.0, a.1 + b.1);
        let bytes = record::encode_record(Record::new(merged.0, merged.1, RecordKind::Jump))?;
        let start = self.body.len() - 2 * RECORD_SIZE;
        self.body.truncate(start);
        self.body.extend_from_slice(&bytes);
        self.records -= 1;
        self.recent_jumps = [None, Some(merged)];
        log::debug!("dst: merged jumps that would read back as a trim");
        Ok(())
    }

    /// Emit jumps until the remaining offset fits one record; return it.
    fn carry(&mut self, mut dx: i32, mut dy: i32) -> Result<(i32, i32), EncodeError> {
        while !offset_in_range(dx, dy) {
            let sx = dx.clamp(-MAX_RECORD_OFFSET, MAX_RECORD_OFFSET);
            let sy = dy.clamp(-MAX_RECORD_OFFSET, MAX_RECORD_OFFSET);
            self.push_jump(sx, sy)?;
            dx -= sx;
            dy -= sy;
        }
        Ok((dx, dy))
    }

    /// Move by `(dx, dy)` and finish with a `kind` record.
    fn travel(&mut self, dx: i32, dy: i32, kind: RecordKind) -> Result<(), EncodeError> {
        let (dx, dy) = self.carry(dx, dy)?;
        match kind {
            RecordKind::Jump => self.push_jump(dx, dy),
            _ => self.push(dx, dy, kind),
        }
    }

    fn trim(&mut self) -> Result<(), EncodeError> {
        self.break_signature(TRIM_SIGNATURE[0].0, TRIM_SIGNATURE[0].1)?;
        for &(tx, ty) in &TRIM_SIGNATURE {
            self.push(tx, ty, RecordKind::Jump)?;
        }
        self.recent_jumps = [None, None];
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encode a pattern as a complete DST file.
pub fn encode(pattern: &Pattern) -> Result<Vec<u8>, EncodeError> {
    pattern.validate()?;

    let mut w = RecordWriter::with_capacity(pattern.len());
    for (dx, dy, kind) in pattern.offsets() {
        match kind {
            StitchKind::Normal => w.travel(dx, dy, RecordKind::Stitch)?,
            StitchKind::Jump => w.travel(dx, dy, RecordKind::Jump)?,
            StitchKind::ColorChange => w.travel(dx, dy, RecordKind::ColorChange)?,
            // Validation keeps trims and the end stitch in place.
            StitchKind::Trim => w.trim()?,
            StitchKind::End => {}
        }
    }

    let header = DstHeader::for_pattern(pattern, w.records);
    let mut out = Vec::with_capacity(HEADER_SIZE + w.body.len() + RECORD_SIZE);
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&w.body);
    out.extend_from_slice(&END_RECORD);

    log::debug!(
        "dst: encoded {} stitches into {} records ({} bytes)",
        pattern.len(),
        w.records,
        out.len()
    );
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

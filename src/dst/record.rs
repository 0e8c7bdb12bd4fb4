// DST 3-byte stitch records.
//
// Each axis is a balanced-ternary sum of ±1, ±3, ±9, ±27 and ±81 spread over
// the three bytes. The third byte also carries the command bits. DST's y
// axis points up; records are converted to the model's y-down orientation
// here so nothing above this layer sees the flip.

use bitflags::bitflags;

use super::encoder::EncodeError;

/// Bytes per record.
pub const RECORD_SIZE: usize = 3;

/// The end-of-sequence record.
pub const END_RECORD: [u8; RECORD_SIZE] = [0x00, 0x00, 0xF3];

bitflags! {
    /// Bits of the third record byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Control: u8 {
        /// Always set in well-formed records.
        const SET = 0b0000_0011;
        const X_PLUS_81 = 1 << 2;
        const X_MINUS_81 = 1 << 3;
        const Y_MINUS_81 = 1 << 4;
        const Y_PLUS_81 = 1 << 5;
        /// Color change when combined with `JUMP`, sequin otherwise.
        const COLOR = 1 << 6;
        const JUMP = 1 << 7;

        const COLOR_CHANGE = Self::SET.bits() | Self::JUMP.bits() | Self::COLOR.bits();
        const SEQUIN = Self::SET.bits() | Self::COLOR.bits();
        const END = Self::COLOR_CHANGE.bits() | Self::Y_MINUS_81.bits() | Self::Y_PLUS_81.bits();
    }
}

/// Command carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Stitch,
    Jump,
    ColorChange,
    /// Sequin eject; movement is kept, the command is treated as a jump.
    Sequin,
    End,
}

/// A decoded record, offsets in model orientation (y down).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub dx: i32,
    pub dy: i32,
    pub kind: RecordKind,
}

impl Record {
    pub const fn new(dx: i32, dy: i32, kind: RecordKind) -> Self {
        Self { dx, dy, kind }
    }
}

// ---------------------------------------------------------------------------
// Bit layout
// ---------------------------------------------------------------------------

/// (weight, byte, positive bit, negative bit), heaviest first.
type Digit = (i32, usize, u8, u8);

const X_DIGITS: [Digit; 5] = [
    (81, 2, 2, 3),
    (27, 1, 2, 3),
    (9, 0, 2, 3),
    (3, 1, 0, 1),
    (1, 0, 0, 1),
];

const Y_DIGITS: [Digit; 5] = [
    (81, 2, 5, 4),
    (27, 1, 5, 4),
    (9, 0, 5, 4),
    (3, 1, 7, 6),
    (1, 0, 7, 6),
];

#[inline]
fn bit(b: u8, n: u8) -> i32 {
    ((b >> n) & 1) as i32
}

fn read_axis(bytes: &[u8; RECORD_SIZE], digits: &[Digit; 5]) -> i32 {
    digits
        .iter()
        .map(|&(w, byte, plus, minus)| w * (bit(bytes[byte], plus) - bit(bytes[byte], minus)))
        .sum()
}

fn write_axis(mut v: i32, bytes: &mut [u8; RECORD_SIZE], digits: &[Digit; 5]) -> i32 {
    for &(w, byte, plus, minus) in digits {
        if v > w / 2 {
            bytes[byte] |= 1 << plus;
            v -= w;
        } else if v < -(w / 2) {
            bytes[byte] |= 1 << minus;
            v += w;
        }
    }
    v
}

// ---------------------------------------------------------------------------
// Decode / encode
// ---------------------------------------------------------------------------

/// Classify the command bits of the third byte.
pub fn classify(control: u8) -> RecordKind {
    let c = Control::from_bits_retain(control);
    if c.contains(Control::END) {
        RecordKind::End
    } else if c.contains(Control::COLOR_CHANGE) {
        RecordKind::ColorChange
    } else if c.contains(Control::SEQUIN) {
        RecordKind::Sequin
    } else if c.contains(Control::SET | Control::JUMP) {
        RecordKind::Jump
    } else {
        RecordKind::Stitch
    }
}

/// Decode one record.
pub fn decode_record(bytes: &[u8; RECORD_SIZE]) -> Record {
    let kind = classify(bytes[2]);
    if kind == RecordKind::End {
        return Record::new(0, 0, kind);
    }
    let dx = read_axis(bytes, &X_DIGITS);
    let dy = -read_axis(bytes, &Y_DIGITS);
    Record::new(dx, dy, kind)
}

/// Encode one record. Fails when the offset does not fit in one record.
pub fn encode_record(record: Record) -> Result<[u8; RECORD_SIZE], EncodeError> {
    let control = match record.kind {
        RecordKind::End => return Ok(END_RECORD),
        RecordKind::Stitch => Control::SET,
        RecordKind::Jump => Control::SET | Control::JUMP,
        RecordKind::ColorChange => Control::COLOR_CHANGE,
        RecordKind::Sequin => Control::SEQUIN,
    };
    let mut bytes = [0u8, 0, control.bits()];
    let rx = write_axis(record.dx, &mut bytes, &X_DIGITS);
    let ry = write_axis(-record.dy, &mut bytes, &Y_DIGITS);
    if rx != 0 || ry != 0 {
        return Err(EncodeError::OffsetOutOfRange {
            dx: record.dx,
            dy: record.dy,
        });
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

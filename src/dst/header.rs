// DST 512-byte ASCII header.
//
// Fields are `TAG:value` separated by carriage returns and terminated by
// 0x1A, then padded with spaces. Only `LA:`, `ST:` and `CO:` are mandatory;
// extents and the rest are informational and recomputed on write.

use super::decoder::DecodeError;
use crate::pattern::Pattern;

/// Size of the header block.
pub const HEADER_SIZE: usize = 512;

/// Longest label the `LA:` field holds.
pub const LABEL_LEN: usize = 16;

const FIELD_SEP: u8 = b'\r';
const HEADER_END: u8 = 0x1A;
const PAD: u8 = b' ';

/// Parsed DST header.
///
/// Extents use DST orientation (y up) and are stored as the header writes
/// them: `minus_x`/`minus_y` are magnitudes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DstHeader {
    pub label: String,
    /// Declared record count, end record excluded.
    pub stitch_count: u32,
    /// Declared number of color changes.
    pub color_changes: u32,
    pub plus_x: Option<i32>,
    pub minus_x: Option<i32>,
    pub plus_y: Option<i32>,
    pub minus_y: Option<i32>,
    /// Final position relative to the start.
    pub ax: Option<i32>,
    pub ay: Option<i32>,
    pub mx: Option<i32>,
    pub my: Option<i32>,
    pub pd: Option<String>,
}

impl DstHeader {
    /// Header fields describing `pattern` with `records` body records.
    pub fn for_pattern(pattern: &Pattern, records: usize) -> Self {
        let e = pattern.extents();
        let (end_x, end_y) = pattern.end_position();
        Self {
            label: sanitize_label(&pattern.label),
            stitch_count: u32::try_from(records).unwrap_or(u32::MAX),
            color_changes: u32::try_from(pattern.color_changes()).unwrap_or(u32::MAX),
            plus_x: Some(e.max_x),
            minus_x: Some(-e.min_x),
            // Model y grows down, DST y grows up.
            plus_y: Some(-e.min_y),
            minus_y: Some(e.max_y),
            ax: Some(end_x),
            ay: Some(-end_y),
            mx: Some(0),
            my: Some(0),
            pd: Some("******".to_string()),
        }
    }

    /// Parse the header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < HEADER_SIZE {
            return Err(DecodeError::BadHeader(format!(
                "file is {} bytes, header alone needs {HEADER_SIZE}",
                data.len()
            )));
        }
        let raw = &data[..HEADER_SIZE];
        if !raw.starts_with(b"LA:") {
            return Err(DecodeError::BadHeader(
                "missing LA: label field at offset 0".into(),
            ));
        }
        let raw = match raw.iter().position(|&b| b == HEADER_END) {
            Some(end) => &raw[..end],
            None => raw,
        };

        let mut hdr = Self::default();
        let mut stitch_count = None;
        let mut color_changes = None;

        for field in raw.split(|&b| b == FIELD_SEP) {
            if field.len() < 3 {
                continue;
            }
            let (tag, value) = field.split_at(3);
            let value = String::from_utf8_lossy(value);
            match tag {
                b"LA:" => hdr.label = value.trim_end().to_string(),
                b"ST:" => stitch_count = Some(parse_unsigned("ST", &value)?),
                b"CO:" => color_changes = Some(parse_unsigned("CO", &value)?),
                b"+X:" => hdr.plus_x = parse_signed(&value),
                b"-X:" => hdr.minus_x = parse_signed(&value),
                b"+Y:" => hdr.plus_y = parse_signed(&value),
                b"-Y:" => hdr.minus_y = parse_signed(&value),
                b"AX:" => hdr.ax = parse_signed(&value),
                b"AY:" => hdr.ay = parse_signed(&value),
                b"MX:" => hdr.mx = parse_signed(&value),
                b"MY:" => hdr.my = parse_signed(&value),
                b"PD:" => hdr.pd = Some(value.trim().to_string()),
                _ => {}
            }
        }

        hdr.stitch_count = stitch_count
            .ok_or_else(|| DecodeError::BadHeader("missing ST: stitch count field".into()))?;
        hdr.color_changes = color_changes
            .ok_or_else(|| DecodeError::BadHeader("missing CO: color count field".into()))?;
        Ok(hdr)
    }

    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut text = String::with_capacity(160);
        let label = sanitize_label(&self.label);
        push_field(&mut text, format_args!("LA:{label:<16}"));
        push_field(&mut text, format_args!("ST:{:>7}", self.stitch_count));
        push_field(&mut text, format_args!("CO:{:>3}", self.color_changes));
        push_field(&mut text, format_args!("+X:{:>5}", self.plus_x.unwrap_or(0)));
        push_field(&mut text, format_args!("-X:{:>5}", self.minus_x.unwrap_or(0)));
        push_field(&mut text, format_args!("+Y:{:>5}", self.plus_y.unwrap_or(0)));
        push_field(&mut text, format_args!("-Y:{:>5}", self.minus_y.unwrap_or(0)));
        push_field(&mut text, format_args!("AX:{}", signed(self.ax.unwrap_or(0))));
        push_field(&mut text, format_args!("AY:{}", signed(self.ay.unwrap_or(0))));
        push_field(&mut text, format_args!("MX:{}", signed(self.mx.unwrap_or(0))));
        push_field(&mut text, format_args!("MY:{}", signed(self.my.unwrap_or(0))));
        push_field(
            &mut text,
            format_args!("PD:{}", self.pd.as_deref().unwrap_or("******")),
        );

        let mut out = [PAD; HEADER_SIZE];
        let n = text.len().min(HEADER_SIZE - 1);
        out[..n].copy_from_slice(&text.as_bytes()[..n]);
        out[n] = HEADER_END;
        out
    }
}

fn push_field(text: &mut String, args: std::fmt::Arguments<'_>) {
    use std::fmt::Write;
    let _ = text.write_fmt(args);
    text.push(FIELD_SEP as char);
}

fn signed(v: i32) -> String {
    let sign = if v < 0 { '-' } else { '+' };
    format!("{sign}{:>5}", v.unsigned_abs())
}

/// ASCII-only, no field separators, at most `LABEL_LEN` chars.
fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .take(LABEL_LEN)
        .collect::<String>()
        .trim_end()
        .to_string()
}

fn parse_unsigned(tag: &str, value: &str) -> Result<u32, DecodeError> {
    value
        .trim()
        .parse()
        .map_err(|_| DecodeError::BadHeader(format!("{tag}: field is not a number: {value:?}")))
}

/// Signed fields appear as `  123`, `+  123` or `-  123`.
fn parse_signed(value: &str) -> Option<i32> {
    let v = value.trim();
    let (neg, digits) = match v.as_bytes().first() {
        Some(b'-') => (true, &v[1..]),
        Some(b'+') => (false, &v[1..]),
        _ => (false, v),
    };
    let n: i32 = digits.trim().parse().ok()?;
    Some(if neg { -n } else { n })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
